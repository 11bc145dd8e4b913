//! Command-line interface.

use anyhow::Context;
use clap::{Parser, Subcommand};
use harvest_core::AppConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(about = "Directory crawler feeding the listing staging table")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to the XDG config location)
    #[arg(short, long, global = true, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        AppConfig::load_with_env(self.config.as_deref()).context("failed to load configuration")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand, Default)]
pub enum Command {
    /// Run the crawl supervisor until interrupted (default)
    #[default]
    Run,

    /// Request a crawl run, as the operator dashboard does
    Trigger {
        /// Category path, label or id to crawl instead of all categories
        #[arg(long)]
        category: Option<String>,
        /// Deep sync: tolerate sparse pages before stopping
        #[arg(long)]
        deep: bool,
    },

    /// Show the crawl status record and staging counts
    Status {
        /// Print the status record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply database migrations and exit
    Migrate,
}
