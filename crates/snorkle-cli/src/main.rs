//! Snorkle CLI entry point

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use snorkle_cli::{cli::Cli, commands::CommandDispatcher, config::AppConfig, SnorkleApp};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let mut config = load_configuration(&cli)?;
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = Some(data_dir.into());
    }

    let app = SnorkleApp::new(config).context("Failed to open the Snorkle data directory")?;
    CommandDispatcher::execute(cli.command, app).await?;

    debug!("Snorkle CLI exited successfully");
    Ok(())
}

/// RUST_LOG wins; otherwise `--verbose` selects debug output
fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_configuration(cli: &Cli) -> anyhow::Result<AppConfig> {
    match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            AppConfig::load_from_file(path)
                .with_context(|| format!("Failed to load configuration from {}", path))
        }
        None => AppConfig::load().context("Failed to load configuration"),
    }
}
