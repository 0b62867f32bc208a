// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! In-memory gateway client for tests and dry runs
//!
//! [`MockGatewayClient`] implements [`RegisterClient`] against a register map
//! held in memory. A cloneable [`MockGatewayHandle`] shares the same state so a
//! test can take the gateway offline, inject request failures, preload the
//! read block, and inspect every call the client received.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use tokio::time;

use crate::config::RegisterMap;
use crate::modbus::client::RegisterClient;

/// One call received by the mock client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    Open,
    Close,
    Write { address: u16, words: Vec<u16> },
    Read { address: u16, count: u16 },
}

#[derive(Debug)]
struct MockGatewayState {
    reachable: bool,
    open_delay: Duration,
    failing_writes: u32,
    failing_reads: u32,
    short_reads: bool,
    loopback: Option<RegisterMap>,
    registers: HashMap<u16, u16>,
    calls: Vec<ClientCall>,
}

/// Shared view of the mock gateway
#[derive(Debug, Clone)]
pub struct MockGatewayHandle {
    state: Arc<Mutex<MockGatewayState>>,
}

/// [`RegisterClient`] backed by an in-memory gateway
pub struct MockGatewayClient {
    state: Arc<Mutex<MockGatewayState>>,
    open: bool,
}

fn lock(state: &Mutex<MockGatewayState>) -> MutexGuard<'_, MockGatewayState> {
    // A panicking test thread must not hide the gateway from the others
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockGatewayClient {
    /// Create a reachable gateway with every register cleared
    pub fn new() -> (Self, MockGatewayHandle) {
        let state = Arc::new(Mutex::new(MockGatewayState {
            reachable: true,
            open_delay: Duration::ZERO,
            failing_writes: 0,
            failing_reads: 0,
            short_reads: false,
            loopback: None,
            registers: HashMap::new(),
            calls: Vec::new(),
        }));
        (
            Self {
                state: state.clone(),
                open: false,
            },
            MockGatewayHandle { state },
        )
    }
}

impl MockGatewayHandle {
    /// Make the gateway accept or refuse connections
    pub fn set_reachable(&self, reachable: bool) {
        lock(&self.state).reachable = reachable;
    }

    /// Delay every connection attempt, as a stalled TCP handshake would
    pub fn set_open_delay(&self, delay: Duration) {
        lock(&self.state).open_delay = delay;
    }

    /// Fail the next `count` writes
    pub fn fail_next_writes(&self, count: u32) {
        lock(&self.state).failing_writes = count;
    }

    /// Fail the next `count` reads
    pub fn fail_next_reads(&self, count: u32) {
        lock(&self.state).failing_reads = count;
    }

    /// Answer reads with fewer registers than requested
    pub fn set_short_reads(&self, short: bool) {
        lock(&self.state).short_reads = short;
    }

    /// Mirror every write to the write block into the read block
    pub fn set_loopback(&self, registers: Option<RegisterMap>) {
        lock(&self.state).loopback = registers;
    }

    /// Preload registers starting at `address`
    pub fn load_registers(&self, address: u16, words: &[u16]) {
        let mut state = lock(&self.state);
        for (offset, word) in words.iter().enumerate() {
            state.registers.insert(address + offset as u16, *word);
        }
    }

    /// Current register values starting at `address`, zero when never written
    pub fn registers(&self, address: u16, count: u16) -> Vec<u16> {
        let state = lock(&self.state);
        (0..count)
            .map(|offset| {
                state
                    .registers
                    .get(&(address + offset))
                    .copied()
                    .unwrap_or(0)
            })
            .collect()
    }

    /// Every call received so far
    pub fn calls(&self) -> Vec<ClientCall> {
        lock(&self.state).calls.clone()
    }

    /// Every block written so far, oldest first
    pub fn writes(&self) -> Vec<Vec<u16>> {
        lock(&self.state)
            .calls
            .iter()
            .filter_map(|call| match call {
                ClientCall::Write { words, .. } => Some(words.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of reads received so far
    pub fn read_count(&self) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|call| matches!(call, ClientCall::Read { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.state).calls.clear();
    }
}

#[async_trait]
impl RegisterClient for MockGatewayClient {
    async fn open(&mut self) -> Result<()> {
        let (reachable, delay) = {
            let mut state = lock(&self.state);
            state.calls.push(ClientCall::Open);
            (state.reachable, state.open_delay)
        };
        if !delay.is_zero() {
            time::sleep(delay).await;
        }
        if !reachable {
            return Err(anyhow!("Connection refused"));
        }
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) {
        lock(&self.state).calls.push(ClientCall::Close);
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn write_multiple_registers(&mut self, address: u16, words: &[u16]) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push(ClientCall::Write {
            address,
            words: words.to_vec(),
        });
        if !state.reachable {
            self.open = false;
            return Err(anyhow!("Gateway unreachable"));
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            self.open = false;
            return Err(anyhow!("Injected write failure"));
        }
        for (offset, word) in words.iter().enumerate() {
            state.registers.insert(address + offset as u16, *word);
        }
        if let Some(map) = state.loopback {
            if map.write_address == address {
                debug!("Mock gateway mirroring write into read block");
                for (offset, word) in words.iter().enumerate() {
                    state.registers.insert(map.read_address + offset as u16, *word);
                }
            }
        }
        self.open = true;
        Ok(())
    }

    async fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let mut state = lock(&self.state);
        state.calls.push(ClientCall::Read { address, count });
        if !state.reachable {
            self.open = false;
            return Err(anyhow!("Gateway unreachable"));
        }
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            self.open = false;
            return Err(anyhow!("Injected read failure"));
        }
        let count = if state.short_reads { count / 2 } else { count };
        let words = (0..count)
            .map(|offset| {
                state
                    .registers
                    .get(&(address + offset))
                    .copied()
                    .unwrap_or(0)
            })
            .collect();
        self.open = true;
        Ok(words)
    }
}
