// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the GMOD Modbus TCP bridge
use anyhow::Result;
use clap::Parser;
use log::{error, info};

use std::path::PathBuf;
use tokio::signal;

use rust_gmod_bridge::config::{self, Config, ExchangeConfig};
use rust_gmod_bridge::daemon::Daemon;

/// Bridge between 400 process signals and a GMOD gateway over Modbus TCP.
///
/// Commands are read from stdin and readings written to stdout, one JSON
/// message per line.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Gateway IP address
    #[arg(short = 'a', long)]
    address: Option<String>,

    /// Gateway Modbus TCP port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Seconds allowed for each connection attempt and request
    #[arg(long)]
    connection_timeout: Option<f64>,

    /// Exchange ticks per second
    #[arg(short = 'r', long)]
    refresh_rate: Option<u32>,

    /// Modbus unit identifier of the gateway
    #[arg(long)]
    unit_id: Option<u8>,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger with appropriate level based on verbose and quiet flags
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Readings own stdout, logs go to stderr
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .target(env_logger::Target::Stderr)
        .init();

    // Check if --show-config-schema flag is set
    if args.show_config_schema {
        return config::output_config_schema();
    }

    // Validate configuration file if --validate-config is set
    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }

        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        eprintln!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    // Load configuration
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from("config.yaml"));
    let mut config = Config::from_file(&config_path)?;

    // Apply command line overrides
    config.apply_args(
        args.address.clone(),
        args.port,
        args.connection_timeout,
        args.refresh_rate,
        args.unit_id,
    );

    let exchange = match ExchangeConfig::try_from(&config) {
        Ok(exchange) => exchange,
        Err(err) => {
            error!("Invalid bridge configuration: {:#}", err);
            return Err(err);
        }
    };

    info!("Starting in daemon mode");
    let mut daemon = Daemon::new();
    daemon.launch(&exchange).await?;

    // Wait for termination signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal, terminating daemon");
        }
        Err(err) => {
            error!("Error waiting for shutdown signal: {}", err);
        }
    }
    daemon.shutdown();
    daemon.join().await?;

    Ok(())
}
