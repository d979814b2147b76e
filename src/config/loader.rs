//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::DeployConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Explorer API key.
pub const EXPLORER_KEY_ENV_VAR: &str = "ETHERSCAN_KEY";
/// Network name, selects the explorer and, for public networks, the chain id.
pub const NETWORK_ENV_VAR: &str = "DEPLOY_NETWORK";
/// RPC endpoint override.
pub const RPC_URL_ENV_VAR: &str = "DEPLOY_RPC_URL";
/// Upstream endpoint for the local fork.
pub const FORK_URL_ENV_VAR: &str = "FORK_RPC_URL";
/// Explicit chain id, for networks missing from the known list.
pub const CHAIN_ID_ENV_VAR: &str = "DEPLOY_CHAIN_ID";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<DeployConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: DeployConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Build the run configuration: optional file, then process environment, then validation.
///
/// This is the only place the environment is read. Components receive the
/// resulting struct and never consult the environment themselves.
pub fn resolve_config(path: Option<&Path>) -> Result<DeployConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(ConfigError::Parse)?
        }
        None => DeployConfig::default(),
    };

    config.apply_env(|key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

impl DeployConfig {
    /// Overlay values from an environment lookup. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(EXPLORER_KEY_ENV_VAR) {
            self.explorer.api_key = Some(key);
        }
        if let Some(name) = get(NETWORK_ENV_VAR) {
            self.network.name = name;
            if let Some(chain_id) = self.network.known_chain_id() {
                self.network.chain_id = chain_id;
            }
        }
        match get(CHAIN_ID_ENV_VAR).map(|v| v.trim().parse::<u64>()) {
            Some(Ok(chain_id)) => self.network.chain_id = chain_id,
            Some(Err(e)) => tracing::warn!(error = %e, "Ignoring invalid {}", CHAIN_ID_ENV_VAR),
            None => {}
        }
        if let Some(url) = get(RPC_URL_ENV_VAR) {
            self.network.rpc_url = url;
        }
        if let Some(url) = get(FORK_URL_ENV_VAR) {
            self.network.fork_url = Some(url);
        }
    }
}
