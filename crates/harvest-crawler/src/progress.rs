use async_trait::async_trait;
use harvest_db::crawl_status;
use sqlx::{Pool, Sqlite};

/// Receives human-readable progress lines. Must never fail the crawl.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, line: &str);
}

/// Appends progress lines to the crawl status record's log.
pub struct StatusLogReporter {
    pool: Pool<Sqlite>,
    source: String,
}

impl StatusLogReporter {
    pub fn new(pool: Pool<Sqlite>, source: impl Into<String>) -> Self {
        Self {
            pool,
            source: source.into(),
        }
    }
}

#[async_trait]
impl ProgressReporter for StatusLogReporter {
    async fn report(&self, line: &str) {
        tracing::info!("{}", line);
        if let Err(e) = crawl_status::append_log(&self.pool, &self.source, line).await {
            tracing::warn!("Could not write progress to status record: {}", e);
        }
    }
}
