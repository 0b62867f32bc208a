// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust GMOD bridge library
//!
//! This library exchanges 400 binary process signals with a GMOD field gateway
//! over Modbus TCP, packed as 25 holding registers in each direction.

pub mod codec;
pub mod config;
pub mod daemon;
pub mod messages;
pub mod modbus;

pub use codec::{decode, encode, SignalVector, WordBlock};
