use std::collections::HashMap;
use std::path::Path;

use ethers::types::Address;
use serde::Deserialize;

use super::ConfigError;

/// One entry of the network mapping file: node endpoint and deployed
/// contract addresses.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub url: String,
    pub app_address: Address,
    pub data_address: Address,
}

impl NetworkConfig {
    /// Reads `network` from a JSON file shaped like
    /// `{"localhost": {"url": ..., "appAddress": ..., "dataAddress": ...}}`.
    pub fn load(path: impl AsRef<Path>, network: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::from_json(&content, network).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(content: &str, network: &str) -> Result<Self, ConfigError> {
        let mut networks: HashMap<String, NetworkConfig> =
            serde_json::from_str(content).map_err(|source| ConfigError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;

        networks
            .remove(network)
            .ok_or_else(|| ConfigError::UnknownNetwork(network.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "localhost": {
            "url": "http://localhost:8545",
            "dataAddress": "0xf2e246bb76df876cef8b38ae84130f4f55de395b",
            "appAddress": "0x2612Af3A521c2df9EAF28422Ca335b04AdF3ac66"
        }
    }"#;

    #[test]
    fn selects_network_by_name() {
        let config = NetworkConfig::from_json(CONFIG, "localhost").unwrap();
        assert_eq!(config.url, "http://localhost:8545");
        assert_eq!(
            format!("{:?}", config.app_address),
            "0x2612af3a521c2df9eaf28422ca335b04adf3ac66"
        );
    }

    #[test]
    fn unknown_network_is_an_error() {
        let result = NetworkConfig::from_json(CONFIG, "rinkeby");
        assert!(matches!(result, Err(ConfigError::UnknownNetwork(name)) if name == "rinkeby"));
    }

    #[test]
    fn missing_file_is_reported_with_its_path() {
        let result = NetworkConfig::load("/nonexistent/flightsurety.json", "localhost");
        match result {
            Err(ConfigError::Read { path, .. }) => assert!(path.contains("flightsurety.json")),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
