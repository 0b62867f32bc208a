// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! The daemon module runs the bridge in the background: the exchange loop with
//! the gateway, the command input and reading output streams, and a heartbeat.
//!
//! ## Components
//!
//! * **Exchange**: the fixed-rate write/read cycle with the gateway
//! * **Launch Daemon**: starting, monitoring, and gracefully shutting down the
//!   background tasks
//!
//! ## Usage
//!
//! ```no_run
//! use rust_gmod_bridge::{config::{Config, ExchangeConfig}, daemon::Daemon};
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::from_file("config.yaml")?;
//!     let exchange = ExchangeConfig::try_from(&config)?;
//!
//!     // Create and launch daemon
//!     let mut daemon = Daemon::new();
//!     daemon.launch(&exchange).await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Clean shutdown
//!     daemon.shutdown();
//!     daemon.join().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod exchange;
pub mod launch_daemon;

pub use exchange::{ExchangeLoop, ExchangeStats, TickOutcome};
pub use launch_daemon::Daemon;
