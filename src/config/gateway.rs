// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Gateway connection configuration
//!
//! This module defines the settings used to reach the GMOD gateway over
//! Modbus TCP and to pace the exchange loop.

use serde::{Deserialize, Serialize};

/// Configuration of the link to the GMOD gateway.
///
/// # Fields
///
/// * `address` - IPv4 or IPv6 literal of the gateway (default: 127.0.0.1)
/// * `port` - Modbus TCP port of the gateway (default: 502)
/// * `connection_timeout` - Seconds allowed for each connection attempt and request (default: 1.0)
/// * `refresh_rate` - Exchange ticks per second (default: 10)
/// * `unit_id` - Modbus unit identifier (default: 1)
///
/// # Example
///
/// ```
/// use rust_gmod_bridge::config::GatewayConfig;
///
/// let gateway = GatewayConfig {
///     address: "192.168.0.20".to_string(),
///     port: 502,
///     connection_timeout: 0.5,
///     refresh_rate: 20,
///     unit_id: 1,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// IP address of the gateway.
    ///
    /// Host names are not accepted, the gateway sits on a fixed address of the
    /// machine network.
    #[serde(default = "default_address")]
    pub address: String,

    /// The TCP port of the gateway.
    ///
    /// Valid range is 1-65535. Anything but 502 is accepted with a warning.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Timeout in seconds for each connection attempt and for each register request.
    ///
    /// This is not the retry window of a connection, which is fixed.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: f64,

    /// Number of exchange ticks per second.
    #[serde(default = "default_refresh_rate")]
    pub refresh_rate: u32,

    /// Modbus unit identifier addressed in every request.
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    502
}

fn default_connection_timeout() -> f64 {
    1.0
}

fn default_refresh_rate() -> u32 {
    10
}

fn default_unit_id() -> u8 {
    1
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            connection_timeout: default_connection_timeout(),
            refresh_rate: default_refresh_rate(),
            unit_id: default_unit_id(),
        }
    }
}
