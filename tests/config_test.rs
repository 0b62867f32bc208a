// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_gmod_bridge::config::{Config, ExchangeConfig, GatewayConfig, RegisterMap};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    // Create a temporary directory
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Create a custom config
    let config = Config {
        gateway: GatewayConfig {
            address: "192.168.1.1".to_string(),
            port: 502,
            connection_timeout: 0.5,
            refresh_rate: 20,
            unit_id: 3,
        },
        registers: RegisterMap {
            write_address: 3000,
            read_address: 4000,
        },
    };

    // Save config to file
    config.save_to_file(&config_path)?;

    // Load config from file
    let loaded_config = Config::from_file(&config_path)?;
    assert_eq!(loaded_config, config);

    // Test loading default config for non-existent file
    let non_existent_path = temp_dir.path().join("non_existent.yaml");
    let default_config = Config::from_file(&non_existent_path)?;

    // Verify default config was created
    assert!(non_existent_path.exists());
    assert_eq!(default_config.gateway.port, 502);
    assert_eq!(default_config.gateway.refresh_rate, 10);
    assert_eq!(default_config.registers.write_address, 1999);
    assert_eq!(default_config.registers.read_address, 1099);

    Ok(())
}

#[test]
fn test_partial_file_uses_defaults() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "gateway:\n  address: 10.0.0.7\n")?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.gateway.address, "10.0.0.7");
    assert_eq!(config.gateway.port, 502);
    assert_eq!(config.registers, RegisterMap::default());

    // An empty file is the default configuration
    fs::write(&config_path, "")?;
    assert_eq!(Config::from_file(&config_path)?, Config::default());

    Ok(())
}

#[test]
fn test_apply_args() {
    let mut config = Config::default();
    assert_eq!(config.gateway.address, "127.0.0.1");

    // Apply command-line arguments
    config.apply_args(Some("192.168.0.1".to_string()), None, Some(2.0), Some(5), None);

    // Verify only provided values were overridden
    assert_eq!(config.gateway.address, "192.168.0.1");
    assert_eq!(config.gateway.port, 502);
    assert_eq!(config.gateway.connection_timeout, 2.0);
    assert_eq!(config.gateway.refresh_rate, 5);
    assert_eq!(config.gateway.unit_id, 1);
}

#[test]
fn test_config_validation() -> Result<()> {
    // Valid config
    let valid_config = Config::default();
    assert!(valid_config.validate().is_ok());

    // Host names are not addresses
    let mut config = Config::default();
    config.gateway.address = "gateway.local".to_string();
    assert!(config.validate().is_err());

    // Port 0 cannot be reached
    let mut config = Config::default();
    config.gateway.port = 0;
    assert!(config.validate().is_err());

    // Timeout must be positive
    let mut config = Config::default();
    config.gateway.connection_timeout = 0.0;
    assert!(config.validate().is_err());
    config.gateway.connection_timeout = f64::NAN;
    assert!(config.validate().is_err());

    // Refresh rate must be positive
    let mut config = Config::default();
    config.gateway.refresh_rate = 0;
    assert!(config.validate().is_err());

    // Block must fit below 65536
    let mut config = Config::default();
    config.registers.write_address = 65520;
    assert!(config.validate().is_err());

    Ok(())
}

#[test]
fn test_exchange_config_from_overrides() -> Result<()> {
    let mut config = Config::default();
    config.apply_args(Some("::1".to_string()), Some(1502), Some(0.25), Some(4), Some(9));

    let exchange = ExchangeConfig::try_from(&config)?;
    assert_eq!(exchange.socket_addr().to_string(), "[::1]:1502");
    assert_eq!(exchange.connect_timeout, Duration::from_millis(250));
    assert_eq!(exchange.tick_period(), Duration::from_millis(250));
    assert_eq!(exchange.unit_id, 9);

    config.apply_args(Some("not an address".to_string()), None, None, None, None);
    assert!(ExchangeConfig::try_from(&config).is_err());

    Ok(())
}
