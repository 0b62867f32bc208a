// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-gmod-bridge project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Validated settings handed to the exchange core
//!
//! [`ExchangeConfig`] is built once from a loaded [`Config`] and never changes
//! afterwards. Building it runs every validation rule, so holding one means
//! the settings are usable.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};

use super::utils::validate_specific_rules;
use super::{Config, RegisterMap};

/// Immutable settings of the exchange with the gateway
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeConfig {
    /// Gateway address
    pub address: IpAddr,
    /// Gateway Modbus TCP port
    pub port: u16,
    /// Bound of each connection attempt and each register request
    pub connect_timeout: Duration,
    /// Exchange ticks per second
    pub poll_interval: u32,
    /// Modbus unit identifier
    pub unit_id: u8,
    /// Base addresses of the register blocks
    pub registers: RegisterMap,
}

impl ExchangeConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Time between the start of two ticks, never zero
    pub fn tick_period(&self) -> Duration {
        let nanos = 1_000_000_000 / u64::from(self.poll_interval.max(1));
        Duration::from_nanos(nanos.max(1))
    }
}

impl TryFrom<&Config> for ExchangeConfig {
    type Error = anyhow::Error;

    fn try_from(config: &Config) -> Result<Self> {
        validate_specific_rules(config)?;

        let gateway = &config.gateway;
        let address = gateway
            .address
            .parse::<IpAddr>()
            .with_context(|| format!("Invalid gateway address: {}", gateway.address))?;
        let connect_timeout = Duration::try_from_secs_f64(gateway.connection_timeout)
            .with_context(|| {
                format!(
                    "Invalid connection timeout: {}",
                    gateway.connection_timeout
                )
            })?;

        Ok(Self {
            address,
            port: gateway.port,
            connect_timeout,
            poll_interval: gateway.refresh_rate,
            unit_id: gateway.unit_id,
            registers: config.registers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_converts() {
        let exchange = ExchangeConfig::try_from(&Config::default()).unwrap();
        assert_eq!(exchange.socket_addr(), "127.0.0.1:502".parse().unwrap());
        assert_eq!(exchange.connect_timeout, Duration::from_secs(1));
        assert_eq!(exchange.tick_period(), Duration::from_millis(100));
        assert_eq!(exchange.registers, RegisterMap::default());
    }

    #[test]
    fn test_ipv6_address() {
        let mut config = Config::default();
        config.gateway.address = "::1".to_string();
        let exchange = ExchangeConfig::try_from(&config).unwrap();
        assert_eq!(exchange.socket_addr().to_string(), "[::1]:502");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.gateway.address = "gateway.local".to_string();
        assert!(ExchangeConfig::try_from(&config).is_err());

        let mut config = Config::default();
        config.gateway.port = 0;
        assert!(ExchangeConfig::try_from(&config).is_err());

        let mut config = Config::default();
        config.gateway.connection_timeout = 0.0;
        assert!(ExchangeConfig::try_from(&config).is_err());

        let mut config = Config::default();
        config.gateway.connection_timeout = f64::NAN;
        assert!(ExchangeConfig::try_from(&config).is_err());

        let mut config = Config::default();
        config.gateway.refresh_rate = 0;
        assert!(ExchangeConfig::try_from(&config).is_err());
    }

    #[test]
    fn test_refresh_rate_above_limit_is_rejected() {
        let mut config = Config::default();
        config.gateway.refresh_rate = 1000;
        let exchange = ExchangeConfig::try_from(&config).unwrap();
        assert_eq!(exchange.tick_period(), Duration::from_millis(1));

        config.gateway.refresh_rate = 2_000_000_000;
        assert!(ExchangeConfig::try_from(&config).is_err());
    }

    #[test]
    fn test_tick_period_is_never_zero() {
        let exchange = ExchangeConfig {
            poll_interval: u32::MAX,
            ..ExchangeConfig::try_from(&Config::default()).unwrap()
        };
        assert_eq!(exchange.tick_period(), Duration::from_nanos(1));
    }
}
