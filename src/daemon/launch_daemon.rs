// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;

use crate::codec::SignalVector;
use crate::config::ExchangeConfig;
use crate::daemon::exchange::{ExchangeLoop, ExchangeStats};
use crate::messages::stdio::{forward_commands, publish_readings};
use crate::modbus::client::{RegisterClient, TcpRegisterClient};
use crate::modbus::connection::{ConnectionManager, CONNECT_RETRY_WINDOW};

/// Readings waiting for the output writer before new ones are dropped
pub const READING_QUEUE_DEPTH: usize = 64;

/// Time between two heartbeat log lines
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);

/// Grace given to each task on [`Daemon::join`]. A tick may be in the middle
/// of a connection attempt when shutdown is requested.
const JOIN_TIMEOUT: Duration = Duration::from_secs(CONNECT_RETRY_WINDOW.as_secs() + 5);

/// Background tasks of the bridge
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    command_input: Option<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    stats: Option<Arc<ExchangeStats>>,
}

impl Default for Daemon {
    fn default() -> Self {
        Self::new()
    }
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new() -> Self {
        Daemon {
            tasks: Vec::new(),
            command_input: None,
            running: Arc::new(AtomicBool::new(true)),
            stats: None,
        }
    }

    /// Launch the bridge against the configured gateway, commands from stdin
    /// and readings to stdout
    pub async fn launch(&mut self, config: &ExchangeConfig) -> Result<()> {
        info!(
            "Starting bridge with gateway {} (unit {}) at {} Hz",
            config.socket_addr(),
            config.unit_id,
            config.poll_interval
        );
        let client = TcpRegisterClient::new(
            config.socket_addr(),
            config.unit_id,
            config.connect_timeout,
        );
        self.launch_with(
            config,
            Box::new(client),
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }

    /// Launch the bridge over any register client and message streams
    pub fn launch_with<R, W>(
        &mut self,
        config: &ExchangeConfig,
        client: Box<dyn RegisterClient>,
        input: R,
        output: W,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (commands_tx, commands_rx) = watch::channel(SignalVector::new());
        let (readings_tx, readings_rx) = mpsc::channel(READING_QUEUE_DEPTH);

        self.start_exchange(config, client, commands_rx, readings_tx)?;
        self.start_command_input(input, commands_tx)?;
        self.start_reading_output(readings_rx, output)?;
        self.start_heartbeat()?;
        Ok(())
    }

    fn start_exchange(
        &mut self,
        config: &ExchangeConfig,
        client: Box<dyn RegisterClient>,
        commands: watch::Receiver<SignalVector>,
        readings: mpsc::Sender<SignalVector>,
    ) -> Result<()> {
        let connection = ConnectionManager::new(
            client,
            config.socket_addr().to_string(),
            config.registers,
        );
        let exchange = ExchangeLoop::new(
            connection,
            commands,
            readings,
            config.tick_period(),
            self.running.clone(),
        );
        self.stats = Some(exchange.stats());

        let task = tokio::spawn(async move {
            exchange.run().await?;
            Ok(())
        });
        self.tasks.push(task);
        Ok(())
    }

    /// Feed commands to the exchange loop until input closes
    fn start_command_input<R>(
        &mut self,
        input: R,
        commands: watch::Sender<SignalVector>,
    ) -> Result<()>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        debug!("Starting command input");
        let task = tokio::spawn(async move {
            // Outbound signals stay frozen on the last command from here on
            if let Err(e) = forward_commands(input, commands).await {
                error!("Command input stopped, outbound signals are frozen: {:#}", e);
                return Err(e);
            }
            Ok(())
        });
        self.command_input = Some(task);
        Ok(())
    }

    /// Write readings until the exchange loop stops
    fn start_reading_output<W>(
        &mut self,
        readings: mpsc::Receiver<SignalVector>,
        output: W,
    ) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        debug!("Starting reading output");
        let task = tokio::spawn(async move {
            publish_readings(readings, output).await?;
            Ok(())
        });
        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs the exchange counters periodically
    fn start_heartbeat(&mut self) -> Result<()> {
        debug!("Starting heartbeat monitor");

        let running = self.running.clone();
        let stats = self.stats.clone();
        let task = tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(1));
            let mut elapsed = Duration::ZERO;
            while running.load(Ordering::SeqCst) {
                interval.tick().await;
                elapsed += Duration::from_secs(1);
                if elapsed >= HEARTBEAT_PERIOD {
                    elapsed = Duration::ZERO;
                    match &stats {
                        Some(stats) => info!("Bridge heartbeat: {}", stats.summary()),
                        None => debug!("Bridge heartbeat: running"),
                    }
                }
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Counters of the exchange loop, once launched
    pub fn stats(&self) -> Option<Arc<ExchangeStats>> {
        self.stats.clone()
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        // Reading stdin cannot observe the flag
        if let Some(input) = &self.command_input {
            input.abort();
        }
    }

    /// Wait for all tasks to complete
    ///
    /// Call [`Daemon::shutdown`] first. Task failures and panics are logged,
    /// they do not fail the join.
    pub async fn join(self) -> Result<()> {
        if let Some(input) = self.command_input {
            // Failures were logged when they happened
            if let Err(e) = input.await {
                if e.is_panic() {
                    error!("Task panicked: {}", e);
                }
            }
        }
        for task in self.tasks {
            match time::timeout(JOIN_TIMEOUT, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("Task failed: {:#}", e),
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Err(_) => {
                    warn!("Task did not complete within timeout period, may be hung");
                }
            }
        }
        Ok(())
    }
}
