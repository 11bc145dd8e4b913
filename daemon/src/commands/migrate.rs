use super::open_database;
use harvest_core::AppConfig;

/// Apply migrations and return the resulting schema version.
pub async fn execute(config: &AppConfig) -> anyhow::Result<i64> {
    let db = open_database(config).await?;
    let version = db.get_schema_version().await?;
    db.close().await;
    Ok(version)
}
