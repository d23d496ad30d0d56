use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use ethers::types::U256;
use ethers::utils::parse_ether;

use super::ConfigError;

/// Relay server settings, read from the environment.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub network: String,
    pub network_file: PathBuf,
    /// Node account slice used as oracles, `start..end`.
    pub oracle_accounts: (usize, usize),
    pub oracle_stake: U256,
    pub gas_limit: u64,
    /// Longest wait for a sent transaction's receipt.
    pub receipt_timeout: Duration,
    pub poll_interval: Duration,
    pub replay_from: Option<u64>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let stake_ether = lookup("ORACLE_STAKE_ETHER").unwrap_or_else(|| "2".to_string());
        let oracle_stake = parse_ether(&stake_ether).map_err(|_| ConfigError::InvalidVar {
            name: "ORACLE_STAKE_ETHER",
            value: stake_ether.clone(),
        })?;

        let start = parse_or(&lookup, "ORACLE_ACCOUNT_START", 10usize)?;
        let end = parse_or(&lookup, "ORACLE_ACCOUNT_END", 50usize)?;
        if end < start {
            return Err(ConfigError::InvalidVar {
                name: "ORACLE_ACCOUNT_END",
                value: end.to_string(),
            });
        }

        let replay_from = match lookup("REPLAY_FROM_BLOCK") {
            Some(value) => Some(parse("REPLAY_FROM_BLOCK", value)?),
            None => None,
        };

        Ok(Self {
            bind_addr: parse_or(&lookup, "BIND_ADDR", IpAddr::V4(Ipv4Addr::LOCALHOST))?,
            port: parse_or(&lookup, "PORT", 3000u16)?,
            network: lookup("NETWORK").unwrap_or_else(|| "localhost".to_string()),
            network_file: lookup("FLIGHTSURETY_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.json")),
            oracle_accounts: (start, end),
            oracle_stake,
            gas_limit: parse_or(&lookup, "CHAIN_GAS_LIMIT", 3_000_000u64)?,
            receipt_timeout: Duration::from_millis(parse_or(
                &lookup,
                "CHAIN_RECEIPT_TIMEOUT_MS",
                120_000u64,
            )?),
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "EVENT_POLL_INTERVAL_MS",
                1_000u64,
            )?),
            replay_from,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => parse(name, value),
        None => Ok(default),
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidVar { name, value })
}
