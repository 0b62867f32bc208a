// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JSON-lines transport for signal messages
//!
//! Commands arrive one [`SignalMessage`] per line and replace the outbound
//! signals; readings leave one line per successful exchange tick. Both ends are
//! generic over tokio readers and writers so the daemon can plug stdin and
//! stdout while tests use in-memory pipes.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

use super::SignalMessage;
use crate::codec::SignalVector;

/// Parse one command line into signals
pub fn parse_command(line: &str) -> Result<SignalVector> {
    let message: SignalMessage =
        serde_json::from_str(line).context("Malformed signal message")?;
    let signals = SignalVector::try_from(&message).context("Invalid signal message")?;
    Ok(signals)
}

/// Read commands until end of input and hand each one to the exchange loop.
///
/// Only the latest command matters to the loop, so each accepted line simply
/// replaces the value in the `commands` slot. Malformed lines, including lines
/// that are not UTF-8, are logged and skipped. Returns the number of accepted
/// commands.
pub async fn forward_commands<R>(
    mut reader: R,
    commands: watch::Sender<SignalVector>,
) -> Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut accepted = 0u64;
    let mut line_number = 0u64;

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read command input")?;
        if read == 0 {
            break;
        }
        line_number += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!("Ignoring command line {}: not UTF-8 ({})", line_number, e);
                continue;
            }
        };
        if line.is_empty() {
            continue;
        }
        match parse_command(line) {
            Ok(signals) => {
                debug!(
                    "Command {} received, {} signals set",
                    line_number,
                    signals.count_ones()
                );
                commands.send_replace(signals);
                accepted += 1;
            }
            Err(e) => warn!("Ignoring command line {}: {:#}", line_number, e),
        }
    }

    info!("Command input closed after {} commands", accepted);
    Ok(accepted)
}

/// Write every reading produced by the exchange loop as one JSON line.
///
/// Returns the number of readings written once the loop drops its sender.
pub async fn publish_readings<W>(
    mut readings: mpsc::Receiver<SignalVector>,
    mut writer: W,
) -> Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut published = 0u64;
    while let Some(signals) = readings.recv().await {
        let mut line = serde_json::to_string(&SignalMessage::reading(&signals))
            .context("Failed to serialize reading")?;
        line.push('\n');
        writer
            .write_all(line.as_bytes())
            .await
            .context("Failed to write reading")?;
        writer.flush().await.context("Failed to flush reading")?;
        published += 1;
    }
    debug!("Reading channel closed after {} readings", published);
    Ok(published)
}
