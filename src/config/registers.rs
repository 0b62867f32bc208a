// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register block addresses on the gateway

use serde::{Deserialize, Serialize};

/// Base addresses of the two 25-register blocks.
///
/// The gateway exposes the block it receives from the bridge at
/// `write_address` and the block it reports at `read_address`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMap {
    /// First holding register written by the bridge (default: 1999)
    #[serde(default = "default_write_address")]
    pub write_address: u16,

    /// First holding register read by the bridge (default: 1099)
    #[serde(default = "default_read_address")]
    pub read_address: u16,
}

fn default_write_address() -> u16 {
    1999
}

fn default_read_address() -> u16 {
    1099
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self {
            write_address: default_write_address(),
            read_address: default_read_address(),
        }
    }
}
