// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::{Config, RegisterMap};
use crate::codec::WORD_COUNT;

/// Standard Modbus TCP port
pub const MODBUS_DEFAULT_PORT: u16 = 502;

/// Highest accepted refresh rate, one tick per millisecond
pub const MAX_REFRESH_RATE: u32 = 1000;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line. It outputs the full JSON schema for the configuration
/// to stdout, formatted for readability.
///
/// # Example
///
/// ```bash
/// ./gmod_bridge --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");

    let schema: serde_json::Value =
        serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Only IPv4 and IPv6 literals are accepted. Host names such as `localhost`
/// are rejected because the gateway is addressed directly.
pub fn is_valid_ip_address(addr: &str) -> bool {
    addr.parse::<std::net::IpAddr>().is_ok()
}

/// Whether a 25-register block starting at `address` fits in the register space
fn block_fits(address: u16) -> bool {
    usize::from(address) + WORD_COUNT <= usize::from(u16::MAX) + 1
}

fn blocks_overlap(registers: &RegisterMap) -> bool {
    let write = usize::from(registers.write_address);
    let read = usize::from(registers.read_address);
    write < read + WORD_COUNT && read < write + WORD_COUNT
}

/// Validates the configuration against rules the JSON schema does not cover.
///
/// # Validation Rules
///
/// - **Gateway address**: must be an IPv4 or IPv6 literal
/// - **Port**: must be in 1-65535, a warning is logged when it is not 502
/// - **Connection timeout**: must be a finite, strictly positive number of seconds
/// - **Refresh rate**: must be in 1-1000 ticks per second
/// - **Register blocks**: both 25-register blocks must fit below 65536,
///   overlapping blocks are accepted with a warning
///
/// # Returns
///
/// * `Ok(())` if all validations pass
/// * `Err(anyhow::Error)` with descriptive message if any validation fails
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");
    let gateway = &config.gateway;

    if !is_valid_ip_address(&gateway.address) {
        anyhow::bail!("Invalid gateway address: {}", gateway.address);
    }

    if gateway.port == 0 {
        anyhow::bail!("Invalid port number: {}", gateway.port);
    }
    if gateway.port != MODBUS_DEFAULT_PORT {
        warn!(
            "Using port {} which is not the default Modbus port {}, check it if the gateway does not answer",
            gateway.port, MODBUS_DEFAULT_PORT
        );
    }

    if !gateway.connection_timeout.is_finite() || gateway.connection_timeout <= 0.0 {
        anyhow::bail!(
            "Invalid connection timeout: {}",
            gateway.connection_timeout
        );
    }

    if gateway.refresh_rate == 0 || gateway.refresh_rate > MAX_REFRESH_RATE {
        anyhow::bail!(
            "Invalid refresh rate: {} (valid range is 1-{})",
            gateway.refresh_rate,
            MAX_REFRESH_RATE
        );
    }

    let registers = &config.registers;
    if !block_fits(registers.write_address) {
        anyhow::bail!(
            "Write block at {} does not fit in the register space",
            registers.write_address
        );
    }
    if !block_fits(registers.read_address) {
        anyhow::bail!(
            "Read block at {} does not fit in the register space",
            registers.read_address
        );
    }
    if blocks_overlap(registers) {
        warn!(
            "Write block at {} overlaps read block at {}",
            registers.write_address, registers.read_address
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_literals_only() {
        assert!(is_valid_ip_address("192.168.0.10"));
        assert!(is_valid_ip_address("fe80::1"));
        assert!(!is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("300.1.1.1"));
        assert!(!is_valid_ip_address(""));
    }

    #[test]
    fn test_block_limits() {
        assert!(block_fits(65511));
        assert!(!block_fits(65512));

        let mut config = Config::default();
        config.registers.read_address = 65535;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_overlap_is_only_a_warning() {
        let mut config = Config::default();
        config.registers = RegisterMap {
            write_address: 100,
            read_address: 110,
        };
        assert!(blocks_overlap(&config.registers));
        assert!(validate_specific_rules(&config).is_ok());
        assert!(!blocks_overlap(&RegisterMap::default()));
    }

    #[test]
    fn test_refresh_rate_bounds() {
        let mut config = Config::default();
        config.gateway.refresh_rate = MAX_REFRESH_RATE;
        assert!(validate_specific_rules(&config).is_ok());

        config.gateway.refresh_rate = MAX_REFRESH_RATE + 1;
        assert!(validate_specific_rules(&config).is_err());

        config.gateway.refresh_rate = 2_000_000_000;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_non_default_port_is_accepted() {
        let mut config = Config::default();
        config.gateway.port = 5020;
        assert!(validate_specific_rules(&config).is_ok());
    }
}
