//! Snorkle CLI Configuration
//!
//! Settings are layered with figment, lowest priority first:
//! - built-in defaults
//! - `snorkle.toml` in the working directory
//! - `~/.snorkle/config.toml`
//! - `SNORKLE_*` environment variables (`__` separates nested keys)
//!
//! The network and endpoint are not part of this file; they are user state
//! kept in the data directory (see `state::NetworkSettings`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use snorkle_core::{
    BridgeConfig, ChainEndpoint, ChannelConfig, ExecutorConfig, NetworkConfig, SnorkleConfig,
};

use crate::error::{CliError, Result};

const CONFIG_DIR_NAME: &str = ".snorkle";

// ----------------------------------------------------------------------------
// Application Configuration
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub bridge: BridgeSettings,
    pub sdk: SdkConfig,
    pub storage: StorageConfig,
}

/// Bridge tuning, in plain numbers so the TOML stays readable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeSettings {
    /// Seconds to wait for the SDK to initialize
    pub ready_timeout_secs: u64,
    /// Per-call timeout in seconds; unset waits for the operation indefinitely
    pub call_timeout_secs: Option<u64>,
    /// Timeout for one chain REST request
    pub request_timeout_secs: u64,
    pub pre_ready_buffer: usize,
    pub max_in_flight: usize,
    /// Requests allowed to wait for a handler slot before new ones are rejected
    pub max_queued: usize,
}

/// How to launch the SDK sidecar process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Defaults to `~/.snorkle`
    pub data_dir: Option<PathBuf>,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        let bridge = BridgeConfig::default();
        let executor = ExecutorConfig::default();
        Self {
            ready_timeout_secs: bridge.ready_timeout.as_secs(),
            call_timeout_secs: None,
            request_timeout_secs: NetworkConfig::default().request_timeout.as_secs(),
            pre_ready_buffer: executor.pre_ready_buffer,
            max_in_flight: executor.max_in_flight,
            max_queued: executor.max_queued,
        }
    }
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            command: "snorkle-sdk-host".to_string(),
            args: Vec::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// Loading
// ----------------------------------------------------------------------------

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file("snorkle.toml"));

        if let Some(path) = Self::default_config_path() {
            figment = figment.merge(Toml::file(path));
        }

        let config: AppConfig = figment
            .merge(Env::prefixed("SNORKLE_").split("__"))
            .extract()
            .map_err(|e| CliError::Config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: AppConfig = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .extract()
            .map_err(|e| {
                CliError::Config(format!(
                    "Failed to load from {}: {}",
                    path.as_ref().display(),
                    e
                ))
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path.as_ref(), contents)?;
        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.sdk.command.trim().is_empty() {
            return Err(CliError::Config("SDK command cannot be empty".into()));
        }
        if self.bridge.call_timeout_secs == Some(0) {
            return Err(CliError::Config("Call timeout must be greater than 0".into()));
        }

        self.to_snorkle_config(ChainEndpoint::default())
            .validate()
            .map_err(CliError::Config)
    }

    /// Directory holding the key vault, history and network settings
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.storage.data_dir {
            return Ok(dir.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(CONFIG_DIR_NAME))
            .ok_or_else(|| CliError::Config("Could not determine the home directory".into()))
    }

    /// Bridge configuration targeting `endpoint`
    pub fn to_snorkle_config(&self, endpoint: ChainEndpoint) -> SnorkleConfig {
        SnorkleConfig {
            channels: ChannelConfig::default(),
            executor: ExecutorConfig {
                pre_ready_buffer: self.bridge.pre_ready_buffer,
                max_in_flight: self.bridge.max_in_flight,
                max_queued: self.bridge.max_queued,
            },
            bridge: BridgeConfig {
                default_timeout: self.bridge.call_timeout_secs.map(Duration::from_secs),
                ready_timeout: Duration::from_secs(self.bridge.ready_timeout_secs),
            },
            network: NetworkConfig {
                endpoint,
                request_timeout: Duration::from_secs(self.bridge.request_timeout_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snorkle_core::Network;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sdk.command, "snorkle-sdk-host");
        assert_eq!(config.bridge.call_timeout_secs, None);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.bridge.max_in_flight = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.bridge.call_timeout_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.sdk.command = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("snorkle.toml");
        std::fs::write(
            &path,
            "[bridge]\ncall_timeout_secs = 90\n\n[sdk]\ncommand = \"node\"\nargs = [\"host.js\"]\n",
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.bridge.call_timeout_secs, Some(90));
        assert_eq!(config.sdk.args, vec!["host.js".to_string()]);
        assert_eq!(
            config.bridge.max_in_flight,
            BridgeSettings::default().max_in_flight
        );
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = AppConfig::default();
        config.storage.data_dir = Some(dir.path().join("data"));
        config.bridge.pre_ready_buffer = 3;
        config.save_to_file(&path).unwrap();

        let reloaded = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(reloaded.bridge.pre_ready_buffer, 3);
        assert_eq!(reloaded.data_dir().unwrap(), dir.path().join("data"));
    }

    #[test]
    fn test_snorkle_config_conversion() {
        let mut config = AppConfig::default();
        config.bridge.call_timeout_secs = Some(45);
        config.bridge.request_timeout_secs = 7;
        config.bridge.max_queued = 3;

        let endpoint = ChainEndpoint::devnet(Network::Mainnet);
        let snorkle = config.to_snorkle_config(endpoint.clone());
        assert_eq!(snorkle.bridge.default_timeout, Some(Duration::from_secs(45)));
        assert_eq!(snorkle.network.request_timeout, Duration::from_secs(7));
        assert_eq!(snorkle.executor.max_queued, 3);
        assert_eq!(snorkle.network.endpoint, endpoint);
        assert!(snorkle.validate().is_ok());
    }
}
