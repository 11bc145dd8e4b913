use harvest_browser::BrowserError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl CrawlError {
    /// Network, timeout and non-404 HTTP failures; the next run retries them.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Browser(_) | Self::HttpStatus { .. })
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
