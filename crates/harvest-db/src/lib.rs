//! Harvest Database Layer
//!
//! `SQLite` persistence for the crawler via `SQLx`, with embedded migrations.
//!
//! # Tables
//!
//! - `import_records` - staging rows, unique per listing detail URL ([`import_records`])
//! - `crawl_status` - the control record polled by the supervisor ([`crawl_status`])
//! - `cities`, `city_aliases` - read-only reference data ([`cities`])
//!
//! # Example
//!
//! ```ignore
//! use harvest_db::Database;
//!
//! let db = Database::connect("sqlite://harvest.db", 5).await?;
//! db.run_migrations().await?;
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cities;
pub mod connection;
pub mod crawl_status;
pub mod error;
pub mod import_records;
pub mod migrations;

pub use cities::{City, CityAlias};
pub use crawl_status::CrawlStatus;
pub use error::{DatabaseError, Result};
pub use import_records::{ImportRecord, NewImportRecord};

use sqlx::{Pool, Sqlite};

/// Connection pool plus migration helpers.
///
/// Cloning is cheap; clones share the underlying pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open a pool for `url` without running migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = connection::open_pool(url, max_connections).await?;
        Ok(Self { pool })
    }

    /// Fresh in-memory database with all migrations applied.
    pub async fn open_in_memory() -> Result<Self> {
        let db = Self::connect(":memory:", 1).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    #[must_use]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory_is_migrated() {
        let db = Database::open_in_memory().await.expect("open database");
        assert_eq!(db.get_schema_version().await.expect("version"), 3);
    }

    #[tokio::test]
    async fn test_connect_without_migrations() {
        let db = Database::connect(":memory:", 2).await.expect("connect");
        assert_eq!(db.get_schema_version().await.expect("version"), 0);
        db.close().await;
    }

    #[tokio::test]
    async fn test_file_database_persists_across_connections() {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = format!("sqlite://{}", dir.path().join("harvest.db").display());

        let db = Database::connect(&url, 2).await.expect("connect");
        db.run_migrations().await.expect("migrate");
        crawl_status::get_or_create(db.pool(), "directory")
            .await
            .expect("create status");
        db.close().await;

        let db = Database::connect(&url, 2).await.expect("reconnect");
        let status = crawl_status::get(db.pool(), "directory")
            .await
            .expect("get")
            .expect("status persisted");
        assert_eq!(status.source, "directory");
    }
}
