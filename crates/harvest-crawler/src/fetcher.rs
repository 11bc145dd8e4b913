use crate::error::{CrawlError, Result};
use crate::url_builder::PageUrls;
use harvest_browser::{BrowserActions, PageLoad};
use harvest_core::CategoryMapping;

/// A rendered listing page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub page: u32,
    /// URL the browser settled on
    pub url: String,
    pub html: String,
}

#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Loaded(FetchedPage),
    /// Not found under either pagination scheme: the category has no such page
    NotFound,
}

/// Loads category pages through one browser session.
///
/// Keeps the previous page's URL as the next request's `Referer` and
/// dismisses the consent overlay once per session.
pub struct PageFetcher<B> {
    browser: B,
    urls: PageUrls,
    referer: Option<String>,
    consent_handled: bool,
}

impl<B: BrowserActions> PageFetcher<B> {
    pub fn new(browser: B, urls: PageUrls) -> Self {
        Self {
            browser,
            urls,
            referer: None,
            consent_handled: false,
        }
    }

    /// Start a new category from the directory root as referer.
    pub fn begin_category(&mut self) {
        self.referer = Some(self.urls.directory_url().into());
    }

    pub fn browser_mut(&mut self) -> &mut B {
        &mut self.browser
    }

    pub fn into_inner(self) -> B {
        self.browser
    }

    /// Load page `page` (1-based) of `mapping`.
    pub async fn fetch(&mut self, mapping: &CategoryMapping, page: u32) -> Result<FetchOutcome> {
        let primary = self.urls.page_url(mapping, page);
        let mut load = self.load(&primary).await?;

        if load.is_not_found() {
            if page <= 1 {
                return Ok(FetchOutcome::NotFound);
            }
            let alternate = self.urls.path_segment_page_url(mapping, page);
            tracing::debug!("{} not found, retrying as {}", primary, alternate);
            load = self.load(&alternate).await?;
            if load.is_not_found() {
                return Ok(FetchOutcome::NotFound);
            }
        }

        if !load.is_success() {
            return Err(CrawlError::HttpStatus {
                url: load.requested_url,
                status: load.status,
            });
        }

        if !self.consent_handled {
            self.consent_handled = self.browser.dismiss_consent().await.is_handled();
        }

        let html = self.browser.content().await?;
        self.referer = Some(load.final_url.clone());

        Ok(FetchOutcome::Loaded(FetchedPage {
            page,
            url: load.final_url,
            html,
        }))
    }

    async fn load(&mut self, url: &str) -> Result<PageLoad> {
        let load = self.browser.navigate(url, self.referer.as_deref()).await?;
        tracing::debug!("GET {} -> {}", url, load.status);
        Ok(load)
    }
}
