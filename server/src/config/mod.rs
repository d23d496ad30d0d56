//! Configuration for the relay server and the dapp CLI

mod network;
mod relay;

use thiserror::Error;

pub use network::NetworkConfig;
pub use relay::RelayConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid network config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("network {0:?} is not defined in the network config")]
    UnknownNetwork(String),

    #[error("invalid value for {name}: {value:?}")]
    InvalidVar { name: &'static str, value: String },
}
