// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;

use rust_gmod_bridge::config::RegisterMap;
use rust_gmod_bridge::modbus::GatewaySimulator;

/// Modbus TCP server standing in for a GMOD gateway
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Listening address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Listening port
    #[clap(long, default_value = "5020")]
    port: u16,

    /// Base of the block written by the bridge
    #[clap(long, default_value_t = RegisterMap::default().write_address)]
    write_address: u16,

    /// Base of the block read by the bridge
    #[clap(long, default_value_t = RegisterMap::default().read_address)]
    read_address: u16,

    /// Mirror the written block into the read block
    #[clap(long)]
    loopback: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port)
        .parse()
        .with_context(|| format!("Invalid listening address {}:{}", args.address, args.port))?;
    let listener = TcpListener::bind(socket_addr)
        .await
        .with_context(|| format!("Failed to bind {}", socket_addr))?;

    let registers = RegisterMap {
        write_address: args.write_address,
        read_address: args.read_address,
    };
    let simulator = GatewaySimulator::new(registers, args.loopback);
    info!(
        "Gateway simulator on {} (write block {}, read block {}, loopback {})",
        socket_addr, registers.write_address, registers.read_address, args.loopback
    );

    tokio::select! {
        result = simulator.serve(listener) => {
            result.context("Gateway simulator stopped")?;
        }
        result = signal::ctrl_c() => {
            result.context("Failed to wait for shutdown signal")?;
            info!("Received shutdown signal, stopping simulator");
        }
    }
    Ok(())
}
