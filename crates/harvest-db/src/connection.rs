//! Connection pool construction.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Open a `SQLite` pool for `url`.
///
/// Accepts `sqlite://path`, `sqlite:path`, a bare file path, or `:memory:`.
/// File databases are created if missing and run in WAL mode so the
/// operator UI can read while the crawler writes.
pub async fn open_pool(url: &str, max_connections: u32) -> Result<Pool<Sqlite>> {
    let mut options = SqliteConnectOptions::from_str(url)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .create_if_missing(true)
        .foreign_keys(true);

    if !is_memory_url(url) {
        options = options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to connect to {url}: {e}")))?;

    tracing::info!("Database pool opened ({} max connections)", max_connections.max(1));
    Ok(pool)
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
