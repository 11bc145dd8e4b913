use crate::error::{BrowserError, Result};
use async_trait::async_trait;

/// Outcome of a single navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLoad {
    /// URL that was requested
    pub requested_url: String,
    /// URL the page settled on after redirects
    pub final_url: String,
    /// HTTP status of the main document, 0 when the browser did not report one
    pub status: u16,
}

impl PageLoad {
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// A missing status counts as success; Chromium omits it for some cached loads.
    pub fn is_success(&self) -> bool {
        self.status == 0 || (200..400).contains(&self.status)
    }
}

/// Result of trying to get a consent banner out of the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsentOutcome {
    /// A strategy found and clicked an accept control
    Dismissed(&'static str),
    /// Nothing matched, a blind click was issued at the banner position
    Attempted,
    /// No banner was found and no click was issued
    NotFound,
}

impl ConsentOutcome {
    /// Whether consent handling should be considered done for this session.
    pub fn is_handled(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// One live browser tab the crawler drives page by page.
#[async_trait]
pub trait BrowserActions: Send {
    /// Navigate to `url`, sending `referer` when given.
    async fn navigate(&mut self, url: &str, referer: Option<&str>) -> Result<PageLoad>;

    /// Try to dismiss a cookie-consent overlay. Never fails the caller.
    async fn dismiss_consent(&mut self) -> ConsentOutcome;

    /// Fully rendered HTML of the current document.
    async fn content(&mut self) -> Result<String>;

    /// Release the session.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Creates browser sessions for a crawl run.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: BrowserActions + 'static;

    async fn launch(&self) -> Result<Self::Session>;
}

/// Reject anything that is not an absolute http(s) URL before handing it to Chromium.
pub fn validate_url(url: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("invalid URL {url}: {e}")))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(BrowserError::NavigationError(format!(
            "unsupported scheme '{other}' in {url}"
        ))),
    }
}
