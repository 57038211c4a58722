//! Configuration management for substrate-txgen
//!
//! Loads network definitions from TOML files with environment variable
//! substitution, falling back to built-in presets.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "TXGEN_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub client: ClientConfig,
    pub networks: HashMap<String, NetworkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    pub default_network: String,
    /// Overall deadline for submit and watch commands
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Addresses are always rendered in the generic SS58 format (prefix 42)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub ws_url: String,
    pub token_symbol: String,
}

impl Settings {
    /// Load settings from `$TXGEN_CONFIG`, else `config/default.toml`, else
    /// the built-in presets.
    pub fn load() -> Result<Self> {
        match env::var(CONFIG_ENV) {
            Ok(path) => Self::load_from(PathBuf::from(path)),
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    tracing::debug!("No config file at {:?}, using built-in networks", path);
                    Ok(Self::builtin())
                }
            }
        }
    }

    /// Load settings from an explicit file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        // Substitute environment variables
        let config_str = substitute_env_vars(&config_str);

        let settings: Settings =
            toml::from_str(&config_str).with_context(|| "Failed to parse configuration")?;

        settings.validate()?;

        Ok(settings)
    }

    /// Westend testnet and a local development node
    pub fn builtin() -> Self {
        let networks = [
            NetworkConfig {
                name: "Westend".to_string(),
                ws_url: "wss://westend-rpc.polkadot.io".to_string(),
                token_symbol: "WND".to_string(),
            },
            NetworkConfig {
                name: "Local".to_string(),
                ws_url: "ws://127.0.0.1:9944".to_string(),
                token_symbol: "UNIT".to_string(),
            },
        ];

        Self {
            client: ClientConfig {
                default_network: "westend".to_string(),
                timeout_secs: None,
            },
            networks: ["westend", "local"]
                .into_iter()
                .map(str::to_string)
                .zip(networks)
                .collect(),
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            anyhow::bail!("At least one network must be configured");
        }

        if !self.networks.contains_key(&self.client.default_network) {
            anyhow::bail!(
                "Default network {} is not configured",
                self.client.default_network
            );
        }

        for (key, network) in &self.networks {
            if !(network.ws_url.starts_with("ws://") || network.ws_url.starts_with("wss://")) {
                anyhow::bail!(
                    "Network {} has a non-websocket URL: {}",
                    key,
                    network.ws_url
                );
            }
        }

        Ok(())
    }

    /// Network config by key, or the default network when `key` is `None`
    pub fn network(&self, key: Option<&str>) -> Result<&NetworkConfig> {
        let key = key.unwrap_or(&self.client.default_network);
        self.networks
            .get(key)
            .with_context(|| format!("Unknown network: {}", key))
    }

    /// Network keys in a stable order, for menus
    pub fn network_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.networks.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
    re.replace_all(input, |cap: &regex::Captures| {
        env::var(&cap[1]).unwrap_or_default()
    })
    .into_owned()
}
