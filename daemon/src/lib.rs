//! Harvest daemon
//!
//! The `harvest` binary: command-line parsing, logging setup and the
//! long-running supervisor. Crawl logic lives in the `crates/` directory.

pub mod cli;
pub mod commands;

use clap::Parser;
use tracing::info;

/// Initialize tracing subscriber for logging
fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,harvest_crawler=debug,harvest_scheduler=debug")
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Parse arguments and dispatch. Errors propagate to a non-zero exit.
pub async fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();
    init_tracing();

    info!("Starting harvest v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.load_config()?;
    commands::dispatch(cli.command.unwrap_or_default(), &config).await
}
