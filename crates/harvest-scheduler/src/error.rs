use harvest_browser::BrowserError;
use harvest_crawler::CrawlError;
use harvest_db::DatabaseError;
use thiserror::Error;

/// Failures that end a supervisor cycle. Recorded into the status record.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("browser session failed: {0}")]
    Browser(#[from] BrowserError),

    #[error("crawl setup failed: {0}")]
    Crawl(#[from] CrawlError),

    #[error("unknown target category '{0}'")]
    UnknownCategory(String),

    #[error("no categories configured for source '{0}'")]
    NoCategories(String),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
