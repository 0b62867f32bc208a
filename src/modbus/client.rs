// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP client used to reach the gateway
//!
//! [`RegisterClient`] is the seam between the connection state machine and the
//! underlying client library. [`TcpRegisterClient`] implements it on top of
//! `tokio-modbus`, the same way the analyzer talked to its own Modbus server.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use tokio::time;
use tokio_modbus::client::Context as ModbusContext;
use tokio_modbus::prelude::*;

/// Register-level operations the connection manager relies on.
///
/// Every call may block up to the client's own timeout and may fail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RegisterClient: Send {
    /// Try to open the TCP session
    async fn open(&mut self) -> Result<()>;

    /// Close the TCP session if one is open
    async fn close(&mut self);

    /// Whether a TCP session is currently open
    fn is_open(&self) -> bool;

    /// Write consecutive holding registers starting at `address`
    async fn write_multiple_registers(&mut self, address: u16, words: &[u16]) -> Result<()>;

    /// Read `count` consecutive holding registers starting at `address`
    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;
}

/// [`RegisterClient`] speaking Modbus TCP through `tokio-modbus`.
///
/// Requests open the session on demand when it is closed, so a closed probe
/// session does not prevent the next exchange.
pub struct TcpRegisterClient {
    socket_addr: SocketAddr,
    unit_id: u8,
    timeout: Duration,
    context: Option<ModbusContext>,
}

impl TcpRegisterClient {
    /// Create a client for the gateway at `socket_addr`.
    ///
    /// `timeout` bounds both the TCP connection and every request.
    pub fn new(socket_addr: SocketAddr, unit_id: u8, timeout: Duration) -> Self {
        Self {
            socket_addr,
            unit_id,
            timeout,
            context: None,
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.socket_addr
    }

    async fn ensure_open(&mut self) -> Result<&mut ModbusContext> {
        if self.context.is_none() {
            self.open().await?;
        }
        self.context
            .as_mut()
            .ok_or_else(|| anyhow!("No Modbus session to {}", self.socket_addr))
    }
}

#[async_trait]
impl RegisterClient for TcpRegisterClient {
    async fn open(&mut self) -> Result<()> {
        if self.context.is_some() {
            return Ok(());
        }
        debug!("Opening Modbus session to {}", self.socket_addr);
        let ctx = time::timeout(
            self.timeout,
            tcp::connect_slave(self.socket_addr, Slave(self.unit_id)),
        )
        .await
        .with_context(|| format!("Timed out connecting to {}", self.socket_addr))?
        .with_context(|| format!("Failed to connect to {}", self.socket_addr))?;
        self.context = Some(ctx);
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut ctx) = self.context.take() {
            debug!("Closing Modbus session to {}", self.socket_addr);
            if let Err(e) = ctx.disconnect().await {
                warn!("Error while closing session to {}: {}", self.socket_addr, e);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.context.is_some()
    }

    async fn write_multiple_registers(&mut self, address: u16, words: &[u16]) -> Result<()> {
        let timeout = self.timeout;
        let ctx = self.ensure_open().await?;
        let result = time::timeout(timeout, ctx.write_multiple_registers(address, words)).await;
        let outcome = match result {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(exception))) => Err(anyhow!("Gateway rejected write: {}", exception)),
            Ok(Err(e)) => Err(anyhow!(e).context("Transport error during write")),
            Err(_) => Err(anyhow!("Write timed out after {:?}", timeout)),
        };
        if outcome.is_err() {
            // The session state is unknown after a failed request
            self.context = None;
        }
        outcome
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let timeout = self.timeout;
        let ctx = self.ensure_open().await?;
        let result = time::timeout(timeout, ctx.read_holding_registers(address, count)).await;
        let outcome = match result {
            Ok(Ok(Ok(words))) => Ok(words),
            Ok(Ok(Err(exception))) => Err(anyhow!("Gateway rejected read: {}", exception)),
            Ok(Err(e)) => Err(anyhow!(e).context("Transport error during read")),
            Err(_) => Err(anyhow!("Read timed out after {:?}", timeout)),
        };
        if outcome.is_err() {
            self.context = None;
        }
        outcome
    }
}
