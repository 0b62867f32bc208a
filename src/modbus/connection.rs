// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Connection state machine for the gateway link
//!
//! [`ConnectionManager`] owns the [`RegisterClient`] and tracks whether the
//! gateway is reachable. Connecting probes the endpoint repeatedly inside a
//! fixed retry window; register writes and reads demote the state to
//! [`ConnectionState::Disconnected`] as soon as they fail, so the exchange loop
//! knows to reconnect on its next tick.
//!
//! ```text
//!                 connect()                 probe ok
//! Disconnected ─────────────▶ Connecting ─────────────▶ Connected
//!      ▲                          │                        │
//!      │                          │ window elapsed         │ write/read failed
//!      │                          ▼                        │
//!      │                        Failed                     │
//!      └───────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::time::Duration;

use log::{debug, error, info};
use thiserror::Error;
use tokio::time::{self, Instant};

use crate::codec::{WordBlock, WORD_COUNT};
use crate::config::RegisterMap;
use crate::modbus::client::RegisterClient;

/// Time allowed for a single [`ConnectionManager::connect`] call to succeed
pub const CONNECT_RETRY_WINDOW: Duration = Duration::from_secs(10);
/// Pause between two connection probes
pub const CONNECT_PROBE_INTERVAL: Duration = Duration::from_millis(100);

/// State of the link to the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// The last connection attempt ran out of its retry window
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Recoverable I/O failures on the gateway link
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IoError {
    #[error("Gateway {endpoint} not reachable after {attempts} attempts in {elapsed:?}")]
    Connect {
        endpoint: String,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("Failed to write {count} registers at address {address}: {reason}")]
    Write {
        address: u16,
        count: usize,
        reason: String,
    },

    #[error("Failed to read registers at address {address}: {reason}")]
    Read { address: u16, reason: String },

    #[error("Short read at address {address}: expected {expected} registers, got {actual}")]
    ShortRead {
        address: u16,
        expected: usize,
        actual: usize,
    },
}

/// Owner of the gateway client and of the connection state.
pub struct ConnectionManager {
    client: Box<dyn RegisterClient>,
    endpoint: String,
    registers: RegisterMap,
    state: ConnectionState,
    retry_window: Duration,
    probe_interval: Duration,
}

impl ConnectionManager {
    /// Create a manager in the [`ConnectionState::Disconnected`] state.
    ///
    /// `endpoint` is only used in log and error messages.
    pub fn new(
        client: Box<dyn RegisterClient>,
        endpoint: impl Into<String>,
        registers: RegisterMap,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            registers,
            state: ConnectionState::Disconnected,
            retry_window: CONNECT_RETRY_WINDOW,
            probe_interval: CONNECT_PROBE_INTERVAL,
        }
    }

    /// Override the retry window and the pause between probes
    pub fn with_retry_window(mut self, retry_window: Duration, probe_interval: Duration) -> Self {
        self.retry_window = retry_window;
        self.probe_interval = probe_interval;
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn registers(&self) -> RegisterMap {
        self.registers
    }

    /// Probe the gateway until it answers or the retry window elapses.
    ///
    /// Any open session is closed first. The probe session is closed again once
    /// the gateway has been reached; later requests reopen it on demand.
    pub async fn connect(&mut self) -> Result<(), IoError> {
        if self.client.is_open() {
            self.client.close().await;
        }
        self.state = ConnectionState::Connecting;
        debug!("Connecting to gateway at {}", self.endpoint);

        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let remaining = self.retry_window.saturating_sub(started.elapsed());
            match time::timeout(remaining, self.client.open()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("Connection attempt {} failed: {:#}", attempts, e),
                Err(_) => debug!("Connection attempt {} cut by the retry window", attempts),
            }

            let open = self.client.is_open();
            if open {
                self.client.close().await;
                self.state = ConnectionState::Connected;
                info!("====================================");
                info!("         GATEWAY CONNECTED");
                info!("====================================");
                info!(
                    "Gateway {} reached after {} attempt(s)",
                    self.endpoint, attempts
                );
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= self.retry_window {
                self.state = ConnectionState::Failed;
                error!("====================================");
                error!("       GATEWAY NOT CONNECTED");
                error!("====================================");
                return Err(IoError::Connect {
                    endpoint: self.endpoint.clone(),
                    attempts,
                    elapsed,
                });
            }

            let pause = self.probe_interval.min(self.retry_window - elapsed);
            time::sleep(pause).await;
        }
    }

    /// Write a register block at the configured write address
    pub async fn write(&mut self, words: &WordBlock) -> Result<(), IoError> {
        let address = self.registers.write_address;
        match self
            .client
            .write_multiple_registers(address, words.as_slice())
            .await
        {
            Ok(()) => Ok(()),
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                Err(IoError::Write {
                    address,
                    count: WORD_COUNT,
                    reason: format!("{:#}", e),
                })
            }
        }
    }

    /// Read a register block from the configured read address
    pub async fn read(&mut self) -> Result<WordBlock, IoError> {
        let address = self.registers.read_address;
        let words = match self
            .client
            .read_holding_registers(address, WORD_COUNT as u16)
            .await
        {
            Ok(words) => words,
            Err(e) => {
                self.state = ConnectionState::Disconnected;
                return Err(IoError::Read {
                    address,
                    reason: format!("{:#}", e),
                });
            }
        };

        WordBlock::from_slice(&words).map_err(|_| {
            self.state = ConnectionState::Disconnected;
            IoError::ShortRead {
                address,
                expected: WORD_COUNT,
                actual: words.len(),
            }
        })
    }

    /// Close the session, if any, and forget the connection
    pub async fn disconnect(&mut self) {
        if self.client.is_open() {
            self.client.close().await;
        }
        self.state = ConnectionState::Disconnected;
    }
}
