//! Subcommand implementations.

pub mod migrate;
pub mod run;
pub mod status;
pub mod trigger;

use crate::cli::Command;
use anyhow::Context;
use harvest_core::AppConfig;
use harvest_db::Database;

pub async fn dispatch(command: Command, config: &AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Run => run::execute(config).await,
        Command::Trigger { category, deep } => {
            let record = trigger::execute(config, category.as_deref(), deep).await?;
            println!(
                "Run requested for {} (target: {}, deep: {})",
                record.source, record.target_category, record.is_deep_sync
            );
            Ok(())
        }
        Command::Status { json } => {
            print!("{}", status::execute(config, json).await?);
            Ok(())
        }
        Command::Migrate => {
            let version = migrate::execute(config).await?;
            println!("Database schema at version {version}");
            Ok(())
        }
    }
}

/// Open and migrate the staging database. A missing URL is fatal.
pub async fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    let url = config
        .database
        .url
        .as_deref()
        .filter(|u| !u.trim().is_empty())
        .context("database.url is not set (config file or HARVEST_DATABASE_URL)")?;

    let db = Database::connect(url, config.database.max_connections)
        .await
        .with_context(|| format!("failed to open database {url}"))?;
    db.run_migrations()
        .await
        .context("failed to apply database migrations")?;
    Ok(db)
}
