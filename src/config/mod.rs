// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the GMOD bridge
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings for the bridge. The configuration is backed by a YAML
//! file and validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! The configuration is organized as a nested structure with sections:
//! - `gateway`: Address, port, timeout and pace of the exchange with the gateway
//! - `registers`: Base addresses of the written and read register blocks
//!
//! ```yaml
//! gateway:
//!   address: 192.168.0.10
//!   port: 502
//!   connection_timeout: 1.0
//!   refresh_rate: 10
//!   unit_id: 1
//! registers:
//!   write_address: 1999
//!   read_address: 1099
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use rust_gmod_bridge::config::{Config, ExchangeConfig};
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("192.168.0.10".to_string()), // Gateway address
//!     Some(502),                        // Gateway port
//!     Some(0.5),                        // Connection timeout
//!     Some(20),                         // Refresh rate
//!     None,                             // Unit id
//! );
//!
//! // Freeze the validated settings for the exchange core
//! let exchange = ExchangeConfig::try_from(&config).unwrap();
//! println!("Gateway: {}", exchange.socket_addr());
//! ```

pub mod exchange;
pub mod gateway;
pub mod registers;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

// Re-export all types for public API
pub use exchange::ExchangeConfig;
pub use gateway::GatewayConfig;
pub use registers::RegisterMap;
pub use utils::{
    is_valid_ip_address, output_config_schema, validate_specific_rules, MAX_REFRESH_RATE,
};

/// Root configuration structure for the bridge.
///
/// The configuration is designed to be deserialized from and serialized to YAML
/// using the serde framework. The structure is validated against a JSON schema
/// to ensure all fields have valid types and ranges, then against
/// [`validate_specific_rules`].
///
/// Each section uses default values when not explicitly specified in the
/// configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Settings of the link to the gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Base addresses of the register blocks exchanged with the gateway.
    #[serde(default)]
    pub registers: RegisterMap,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. A file failing the schema,
    /// the deserialization or the specific rules leaves a `.sample.yaml` file
    /// with default values next to it and returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // An empty file is a configuration with every default
        let yaml_value = if yaml_value.is_null() {
            serde_yml::Value::Mapping(serde_yml::Mapping::new())
        } else {
            yaml_value
        };

        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_value(yaml_value) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = config.validate() {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Run the rules the JSON schema cannot express
    pub fn validate(&self) -> Result<()> {
        validate_specific_rules(self)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values explicitly provided override the existing configuration.
    /// The result is not validated here; build an [`ExchangeConfig`] to do so.
    ///
    /// # Parameters
    ///
    /// * `address` - Gateway IP address
    /// * `port` - Gateway Modbus TCP port
    /// * `connection_timeout` - Seconds allowed per connection attempt and request
    /// * `refresh_rate` - Exchange ticks per second
    /// * `unit_id` - Modbus unit identifier
    pub fn apply_args(
        &mut self,
        address: Option<String>,
        port: Option<u16>,
        connection_timeout: Option<f64>,
        refresh_rate: Option<u32>,
        unit_id: Option<u8>,
    ) {
        if let Some(address) = address {
            debug!("Overriding gateway address from command line: {}", address);
            self.gateway.address = address;
        }
        if let Some(port) = port {
            debug!("Overriding gateway port from command line: {}", port);
            self.gateway.port = port;
        }
        if let Some(timeout) = connection_timeout {
            debug!("Overriding connection timeout from command line: {}", timeout);
            self.gateway.connection_timeout = timeout;
        }
        if let Some(rate) = refresh_rate {
            debug!("Overriding refresh rate from command line: {}", rate);
            self.gateway.refresh_rate = rate;
        }
        if let Some(unit_id) = unit_id {
            debug!("Overriding unit id from command line: {}", unit_id);
            self.gateway.unit_id = unit_id;
        }
    }
}
