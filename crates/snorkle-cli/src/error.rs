//! Error handling for the Snorkle CLI

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Snorkle(#[from] snorkle_core::SnorkleError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("State persistence error: {0}")]
    StatePersistence(String),

    #[error("No key named '{0}' in the vault")]
    KeyNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        CliError::Config(err.to_string())
    }
}
