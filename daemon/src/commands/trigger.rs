use super::open_database;
use harvest_core::{AppConfig, TargetCategory};
use harvest_db::{crawl_status, CrawlStatus};

/// Write the trigger fields for the configured source.
///
/// A named category must match a configured mapping; the supervisor would
/// otherwise fail the run.
pub async fn execute(
    config: &AppConfig,
    category: Option<&str>,
    deep: bool,
) -> anyhow::Result<CrawlStatus> {
    let target = category.map_or(TargetCategory::All, TargetCategory::parse);
    if let TargetCategory::Specific(selector) = &target {
        if !config.source.categories.iter().any(|m| m.matches(selector)) {
            anyhow::bail!("no configured category matches '{selector}'");
        }
    }

    let db = open_database(config).await?;
    let record = crawl_status::request_run(db.pool(), &config.source.name, &target, deep).await?;
    db.close().await;
    Ok(record)
}
