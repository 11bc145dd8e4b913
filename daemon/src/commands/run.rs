use super::open_database;
use harvest_browser::BrowserEngine;
use harvest_core::AppConfig;
use harvest_scheduler::Supervisor;
use tracing::{info, warn};

/// Run the supervisor until Ctrl-C.
pub async fn execute(config: &AppConfig) -> anyhow::Result<()> {
    let db = open_database(config).await?;

    if config.source.categories.is_empty() {
        warn!(
            "No categories configured for {}; runs will fail until [[source.categories]] is set",
            config.source.name
        );
    }

    let engine = BrowserEngine::new(config.browser.clone());
    let supervisor = Supervisor::new(db.clone(), engine, config);

    tokio::select! {
        () = supervisor.run_forever() => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown requested");
        }
    }

    db.close().await;
    Ok(())
}
