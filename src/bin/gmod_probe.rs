// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tokio::time::Duration;
use tokio_modbus::prelude::*;

use rust_gmod_bridge::codec::{self, WordBlock, BITS_PER_SET, WORD_COUNT};
use rust_gmod_bridge::config::RegisterMap;

/// Modbus client reading the signal blocks of a GMOD gateway once
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Gateway address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Gateway port
    #[clap(long, default_value = "502")]
    port: u16,

    /// Modbus unit identifier
    #[clap(long, default_value = "1")]
    unit_id: u8,

    /// Base of the block reported by the gateway
    #[clap(long, default_value_t = RegisterMap::default().read_address)]
    read_address: u16,

    /// Also dump the block last written by the bridge
    #[clap(long)]
    write_address: Option<u16>,
}

fn print_block(title: &str, address: u16, response: &[u16]) -> Result<()> {
    let block = WordBlock::from_slice(response)
        .with_context(|| format!("Gateway answered {} registers", response.len()))?;
    println!("{} at {}:", title, address);
    println!("Raw register values: {:?}", block);

    let signals = codec::decode(&block);
    for (group, bits) in signals.bit_sets().iter().enumerate() {
        if bits.iter().any(|bit| *bit) {
            let active: Vec<usize> = (0..BITS_PER_SET).filter(|bit| bits[*bit]).collect();
            println!("  Bit-set {:2}: bits {:?}", group, active);
        }
    }
    println!("  {} signal(s) set", signals.count_ones());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    // Parse command line arguments
    let args = Args::parse();

    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port)
        .parse()
        .with_context(|| format!("Invalid gateway address {}:{}", args.address, args.port))?;
    println!("Connecting to gateway at {}", socket_addr);

    let mut ctx = tokio::time::timeout(
        Duration::from_secs(1),
        tcp::connect_slave(socket_addr, Slave(args.unit_id)),
    )
    .await
    .context("Timed out connecting to gateway")??;

    let response = ctx
        .read_holding_registers(args.read_address, WORD_COUNT as u16)
        .await??;
    print_block("Reported signals", args.read_address, &response)?;

    if let Some(write_address) = args.write_address {
        let response = ctx
            .read_holding_registers(write_address, WORD_COUNT as u16)
            .await??;
        print_block("Commanded signals", write_address, &response)?;
    }

    ctx.disconnect().await?;
    Ok(())
}
