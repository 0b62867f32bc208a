// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the GatewaySimulator implementation
//!
//! These tests validate the simulator by starting a server instance and
//! connecting to it via a Modbus client. Reads and writes of both signal
//! blocks are tested, along with loopback and error conditions.

use std::str::FromStr;
use std::time::Duration;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::prelude::*;

use rust_gmod_bridge::codec::{encode, SignalVector, WordBlock, WORD_COUNT};
use rust_gmod_bridge::config::RegisterMap;
use rust_gmod_bridge::modbus::GatewaySimulator;

/// Test utility function to start a gateway simulator in the background
async fn start_test_server(
    loopback: bool,
) -> Result<(SocketAddr, GatewaySimulator, tokio::task::JoinHandle<()>), Box<dyn std::error::Error>>
{
    // Use port 0 to let the OS assign an available port
    let socket_addr = SocketAddr::from_str("127.0.0.1:0").unwrap();
    let listener = TcpListener::bind(socket_addr).await?;

    // Get the assigned port
    let socket_addr = listener.local_addr()?;
    println!("Test server started on: {}", socket_addr);

    let simulator = GatewaySimulator::new(RegisterMap::default(), loopback);
    let server = simulator.clone();

    // Start the server in a background task
    let handle = tokio::spawn(async move {
        if let Err(e) = server.serve(listener).await {
            eprintln!("Server error: {}", e);
        }
    });

    // Give the server a moment to start
    time::sleep(Duration::from_millis(100)).await;

    Ok((socket_addr, simulator, handle))
}

#[tokio::test]
async fn test_read_blocks_start_cleared() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _simulator, _server_handle) = start_test_server(false).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let data = ctx.read_holding_registers(1099, WORD_COUNT as u16).await??;
    assert_eq!(data, vec![0; WORD_COUNT]);
    let data = ctx.read_holding_registers(1999, WORD_COUNT as u16).await??;
    assert_eq!(data, vec![0; WORD_COUNT]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_write_multiple_registers() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, simulator, _server_handle) = start_test_server(false).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let mut signals = SignalVector::new();
    signals.set(0, true)?;
    signals.set(399, true)?;
    let block = encode(&signals);
    ctx.write_multiple_registers(1999, block.as_slice()).await??;

    let data = ctx.read_holding_registers(1999, WORD_COUNT as u16).await??;
    assert_eq!(data, block.to_vec());
    assert_eq!(simulator.written_block(), Some(block));

    // Without loopback the read block is untouched
    assert_eq!(simulator.read_block(), Some(WordBlock::default()));

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_loopback_mirrors_written_block() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _simulator, _server_handle) = start_test_server(true).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    let values: Vec<u16> = (0..WORD_COUNT as u16).map(|i| i * 257).collect();
    ctx.write_multiple_registers(1999, &values).await??;

    let data = ctx.read_holding_registers(1099, WORD_COUNT as u16).await??;
    assert_eq!(data, values);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_write_single_register() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _simulator, _server_handle) = start_test_server(false).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    ctx.write_single_register(1100, 999).await??;

    let data = ctx.read_holding_registers(1100, 1).await??;
    assert_eq!(data, vec![999]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_controller_side_block_is_read() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, simulator, _server_handle) = start_test_server(false).await?;
    let mut words = [0u16; WORD_COUNT];
    words[3] = 0x8001;
    simulator.set_read_block(&WordBlock::new(words));

    let mut ctx = tcp::connect(socket_addr).await?;
    let data = ctx.read_holding_registers(1099, WORD_COUNT as u16).await??;
    assert_eq!(data[3], 0x8001);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_register_address() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _simulator, _server_handle) = start_test_server(false).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    // The read block ends at 1123
    let result = ctx.read_holding_registers(1110, WORD_COUNT as u16).await?;
    assert!(result.is_err());
    if let Err(error) = result {
        assert_eq!(error.to_string(), "Illegal data address");
    }

    // A partially invalid write changes nothing
    let result = ctx.write_multiple_registers(2020, &[1, 2, 3, 4, 5]).await?;
    assert!(result.is_err());
    let data = ctx.read_holding_registers(2020, 4).await??;
    assert_eq!(data, vec![0; 4]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_unsupported_function() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _simulator, _server_handle) = start_test_server(false).await?;
    let mut ctx = tcp::connect(socket_addr).await?;

    // Coils are not part of the gateway interface
    let result = ctx.read_coils(0, 1).await?;
    assert!(result.is_err());
    if let Err(error) = result {
        assert_eq!(error.to_string(), "Illegal function");
    }

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_multiple_clients() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _simulator, _server_handle) = start_test_server(false).await?;

    let mut client1 = tcp::connect(socket_addr).await?;
    let mut client2 = tcp::connect(socket_addr).await?;

    client1.write_single_register(2000, 888).await??;
    time::sleep(Duration::from_millis(100)).await;

    // Client 2 sees the update from client 1
    let data = client2.read_holding_registers(2000, 1).await??;
    assert_eq!(data, vec![888]);

    client1.disconnect().await?;
    client2.disconnect().await?;
    Ok(())
}
