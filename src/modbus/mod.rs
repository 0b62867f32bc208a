// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module holds everything that talks Modbus TCP to the GMOD gateway.
//!
//! ## Key Components
//!
//! - [`RegisterClient`]: the register requests the bridge needs, implemented
//!   over `tokio-modbus` by [`TcpRegisterClient`]
//! - [`ConnectionManager`]: connection state machine and bounded reconnection
//! - [`MockGatewayClient`]: in-memory gateway for tests
//! - [`GatewaySimulator`]: Modbus TCP server standing in for a real gateway
//!
//! ## Register Map
//!
//! ### Holding Registers written by the bridge
//!
//! - Registers 1999-2023: the 400 commanded signals, 16 per register
//!
//! ### Holding Registers read by the bridge
//!
//! - Registers 1099-1123: the 400 reported signals, 16 per register
//!
//! Signal `i` lives in register `base + i / 16`, bit `i % 16` (bit 0 is the
//! least significant). Both base addresses are configurable.

pub mod client;
pub mod connection;
pub mod mock;
pub mod simulator;

pub use client::{RegisterClient, TcpRegisterClient};
pub use connection::{ConnectionManager, ConnectionState, IoError};
pub use mock::{MockGatewayClient, MockGatewayHandle};
pub use simulator::GatewaySimulator;
