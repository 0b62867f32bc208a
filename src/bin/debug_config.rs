// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Load a configuration file and show the settings the bridge would run with
use anyhow::Result;
use rust_gmod_bridge::config::{Config, ExchangeConfig};
use std::path::PathBuf;

fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "debug"),
    );

    let path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.yaml"));

    println!("Testing file: {:?}", path);
    println!("File exists: {}", path.exists());

    let result = Config::from_file(&path).and_then(|config| ExchangeConfig::try_from(&config));

    match result {
        Ok(exchange) => {
            println!("Validation succeeded");
            println!("Gateway: {} (unit {})", exchange.socket_addr(), exchange.unit_id);
            println!("Connection timeout: {:?}", exchange.connect_timeout);
            println!(
                "Refresh rate: {} Hz, tick every {:?}",
                exchange.poll_interval,
                exchange.tick_period()
            );
            println!(
                "Write block: {}, read block: {}",
                exchange.registers.write_address, exchange.registers.read_address
            );
        }
        Err(e) => println!("Validation failed: {:#}", e),
    }

    Ok(())
}
