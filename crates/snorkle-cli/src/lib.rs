//! Snorkle CLI library
//!
//! Components behind the `snorkle` binary: argument parsing, layered
//! configuration, the on-disk key vault and transaction history, and the
//! command handlers that drive the operation bridge.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod state;

pub use app::SnorkleApp;
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{CliError, Result};
