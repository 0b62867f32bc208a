// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fixed-rate exchange loop with the gateway
//!
//! Each tick:
//! 1. reconnects when the link is not up, and gives up the tick if that fails
//! 2. encodes the latest commanded signals and writes them
//! 3. reads the reported block
//! 4. decodes it and publishes the signals
//!
//! A failed step ends the tick early; nothing is published for it and the next
//! tick starts over from the connection. The loop only ends when the shared
//! running flag is cleared, which is checked once per tick.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};

use crate::codec::{self, SignalVector};
use crate::modbus::connection::{ConnectionManager, ConnectionState};

/// How a tick ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Signals were exchanged and the reading handed to the read channel
    Published,
    /// Signals were exchanged but the read channel was full or closed, the
    /// reading was discarded
    Dropped,
    /// The gateway could not be reached, nothing was exchanged
    ConnectFailed,
    /// Writing the commanded signals failed, nothing was read
    WriteFailed,
    /// Reading the reported signals failed, nothing was published
    ReadFailed,
}

/// Counters of the exchange, shared with the heartbeat
#[derive(Debug, Default)]
pub struct ExchangeStats {
    pub ticks: AtomicU64,
    pub published: AtomicU64,
    pub dropped: AtomicU64,
    pub connect_failures: AtomicU64,
    pub write_failures: AtomicU64,
    pub read_failures: AtomicU64,
}

impl ExchangeStats {
    fn record(&self, outcome: TickOutcome) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            TickOutcome::Published => &self.published,
            TickOutcome::Dropped => &self.dropped,
            TickOutcome::ConnectFailed => &self.connect_failures,
            TickOutcome::WriteFailed => &self.write_failures,
            TickOutcome::ReadFailed => &self.read_failures,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "ticks={} published={} dropped={} connect_failures={} write_failures={} read_failures={}",
            self.ticks.load(Ordering::Relaxed),
            self.published.load(Ordering::Relaxed),
            self.dropped.load(Ordering::Relaxed),
            self.connect_failures.load(Ordering::Relaxed),
            self.write_failures.load(Ordering::Relaxed),
            self.read_failures.load(Ordering::Relaxed),
        )
    }
}

/// Drives the exchange with the gateway at a fixed rate
pub struct ExchangeLoop {
    connection: ConnectionManager,
    commands: watch::Receiver<SignalVector>,
    readings: mpsc::Sender<SignalVector>,
    tick_period: Duration,
    running: Arc<AtomicBool>,
    stats: Arc<ExchangeStats>,
}

impl ExchangeLoop {
    /// Create a loop exchanging the latest value of `commands` and sending
    /// every reading to `readings`, one tick every `tick_period`.
    pub fn new(
        connection: ConnectionManager,
        commands: watch::Receiver<SignalVector>,
        readings: mpsc::Sender<SignalVector>,
        tick_period: Duration,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            connection,
            commands,
            readings,
            tick_period,
            running,
            stats: Arc::new(ExchangeStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<ExchangeStats> {
        self.stats.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Run a single tick without waiting for the next boundary
    pub async fn tick(&mut self) -> TickOutcome {
        let outcome = self.exchange().await;
        self.stats.record(outcome);
        outcome
    }

    async fn exchange(&mut self) -> TickOutcome {
        if !self.connection.is_connected() {
            if let Err(e) = self.connection.connect().await {
                error!("Connection to gateway failed: {}", e);
                return TickOutcome::ConnectFailed;
            }
        }

        // Only the latest command counts, older ones were overwritten in the slot
        let commanded = *self.commands.borrow_and_update();
        let words = codec::encode(&commanded);
        if let Err(e) = self.connection.write(&words).await {
            error!("Problem with connection while sending data, reconnecting: {}", e);
            return TickOutcome::WriteFailed;
        }

        let block = match self.connection.read().await {
            Ok(block) => block,
            Err(e) => {
                error!("Problem with connection while reading data, reconnecting: {}", e);
                return TickOutcome::ReadFailed;
            }
        };
        let reading = codec::decode(&block);
        debug!("Exchanged {:?} for {:?}", words, block);

        match self.readings.try_send(reading) {
            Ok(()) => TickOutcome::Published,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Reading consumer is lagging, reading dropped");
                TickOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Reading channel closed, reading dropped");
                TickOutcome::Dropped
            }
        }
    }

    /// Tick at the configured rate until the running flag is cleared.
    ///
    /// No failure ends the loop. The link is closed on the way out.
    pub async fn run(mut self) -> Result<Arc<ExchangeStats>> {
        info!(
            "Exchange loop started with gateway {} every {:?}",
            self.connection.endpoint(),
            self.tick_period
        );
        let mut interval = time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            self.tick().await;
        }

        self.connection.disconnect().await;
        info!("Exchange loop stopped: {}", self.stats.summary());
        Ok(self.stats)
    }
}
