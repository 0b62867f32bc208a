// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Messages exchanged with the rest of the process control system
//!
//! Commands and readings travel as [`SignalMessage`] frames of 50 bit-sets of
//! 8 signals. [`stdio`] carries them as JSON lines.
//!
//! ```json
//! {"bit_sets": [[true, false, false, false, false, false, false, false], ...]}
//! ```

pub mod stdio;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::codec::{CodecError, SignalVector, BITS_PER_SET, BIT_SET_COUNT};

/// One frame of the 400 process signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalMessage {
    /// Time the signals were read from the gateway, absent on commands
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    /// The 50 bit-sets, in order
    pub bit_sets: Vec<[bool; BITS_PER_SET]>,
}

impl SignalMessage {
    /// Frame a command, without timestamp
    pub fn command(signals: &SignalVector) -> Self {
        Self {
            timestamp: None,
            bit_sets: signals.bit_sets().to_vec(),
        }
    }

    /// Frame a reading taken now
    pub fn reading(signals: &SignalVector) -> Self {
        Self {
            timestamp: Some(Utc::now()),
            bit_sets: signals.bit_sets().to_vec(),
        }
    }
}

impl From<&SignalVector> for SignalMessage {
    fn from(signals: &SignalVector) -> Self {
        Self::command(signals)
    }
}

impl TryFrom<&SignalMessage> for SignalVector {
    type Error = CodecError;

    fn try_from(message: &SignalMessage) -> Result<Self, Self::Error> {
        let bit_sets: &[[bool; BITS_PER_SET]; BIT_SET_COUNT] = message
            .bit_sets
            .as_slice()
            .try_into()
            .map_err(|_| CodecError::InvalidLength {
                expected: BIT_SET_COUNT,
                actual: message.bit_sets.len(),
            })?;
        Ok(SignalVector::from_bit_sets(bit_sets))
    }
}
