use crate::actions::{validate_url, BrowserActions, ConsentOutcome, PageLoad, SessionLauncher};
use crate::consent::{ConsentHandler, PageScripting};
use crate::error::{BrowserError, Result};
use crate::fingerprint::Identity;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::layout::Point;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use harvest_core::BrowserConfig;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Status of the main document as recorded by the Navigation Timing API.
const NAVIGATION_STATUS_SCRIPT: &str =
    "(() => { const e = performance.getEntriesByType('navigation')[0]; return e && e.responseStatus ? e.responseStatus : 0; })()";

const VIEWPORT_SCRIPT: &str = "[window.innerWidth, window.innerHeight]";

fn chromium(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::ChromiumError(e.to_string())
}

/// Launches Chromium sessions with a fixed desktop identity.
pub struct BrowserEngine {
    config: BrowserConfig,
    identity: Identity,
}

impl BrowserEngine {
    pub fn new(config: BrowserConfig) -> Self {
        let identity = Identity::from_config(&config);
        Self { config, identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    fn chrome_config(&self) -> Result<ChromeConfig> {
        let mut builder = ChromeConfig::builder()
            .no_sandbox()
            .window_size(self.identity.viewport_width, self.identity.viewport_height)
            .viewport(Viewport {
                width: self.identity.viewport_width,
                height: self.identity.viewport_height,
                ..Default::default()
            })
            .request_timeout(self.config.navigation_timeout())
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-gpu")
            // keep cross-origin iframes in-process so their frames get execution contexts
            .arg("--disable-features=IsolateOrigins,site-per-process")
            .arg(format!("--lang={}", primary_language(&self.identity.accept_language)));

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref path) = self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(BrowserError::ChromiumError)
    }
}

/// First tag of an Accept-Language header, e.g. `de-DE` from `de-DE,de;q=0.9`.
fn primary_language(accept_language: &str) -> &str {
    accept_language
        .split([',', ';'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("en-US")
}

#[async_trait]
impl SessionLauncher for BrowserEngine {
    type Session = BrowserSession;

    async fn launch(&self) -> Result<BrowserSession> {
        tracing::info!(
            "Launching browser (headless: {}, {}x{})",
            self.config.headless,
            self.identity.viewport_width,
            self.identity.viewport_height
        );

        let (browser, mut handler) = Browser::launch(self.chrome_config()?)
            .await
            .map_err(chromium)?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler_task.abort();
                return Err(chromium(e));
            }
        };

        let ua_override = SetUserAgentOverrideParams::builder()
            .user_agent(self.identity.user_agent.clone())
            .accept_language(self.identity.accept_language.clone())
            .build()
            .map_err(BrowserError::ChromiumError)?;
        page.execute(ua_override).await.map_err(chromium)?;

        Ok(BrowserSession {
            browser: Some(browser),
            page,
            handler_task,
            identity: self.identity.clone(),
            consent: ConsentHandler::from_config(&self.config),
            navigation_timeout: self.config.navigation_timeout(),
        })
    }
}

/// One Chromium process with a single reused tab.
pub struct BrowserSession {
    browser: Option<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    identity: Identity,
    consent: ConsentHandler,
    navigation_timeout: Duration,
}

impl BrowserSession {
    fn ensure_open(&self) -> Result<()> {
        if self.browser.is_none() {
            return Err(BrowserError::SessionClosed);
        }
        Ok(())
    }

    async fn response_status(&self) -> u16 {
        match self.page.evaluate(NAVIGATION_STATUS_SCRIPT.to_string()).await {
            Ok(result) => result.into_value::<u16>().unwrap_or(0),
            Err(e) => {
                tracing::debug!("Could not read navigation status: {}", e);
                0
            }
        }
    }
}

#[async_trait]
impl PageScripting for BrowserSession {
    async fn eval_bool(&self, script: &str) -> Result<bool> {
        self.page
            .evaluate(script.to_string())
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?
            .into_value::<bool>()
            .map_err(|e| BrowserError::Script(e.to_string()))
    }

    async fn eval_bool_in_frames(&self, script: &str) -> Result<bool> {
        let frames = self.page.frames().await.map_err(chromium)?;
        let mut evaluated = 0usize;

        for frame in frames {
            let context = match self.page.frame_execution_context(frame.clone()).await {
                Ok(Some(context)) => context,
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!("No execution context for frame {:?}: {}", frame, e);
                    continue;
                }
            };
            let params = EvaluateParams::builder()
                .expression(script)
                .context_id(context)
                .return_by_value(true)
                .build()
                .map_err(BrowserError::Script)?;

            evaluated += 1;
            match self.page.evaluate_expression(params).await {
                Ok(result) => {
                    if result.into_value::<bool>().unwrap_or(false) {
                        return Ok(true);
                    }
                }
                Err(e) => tracing::debug!("Script failed in frame {:?}: {}", frame, e),
            }
        }

        if evaluated == 0 {
            return self.eval_bool(script).await;
        }
        Ok(false)
    }

    async fn click_at(&self, x: f64, y: f64) -> Result<()> {
        self.page.click(Point::new(x, y)).await.map_err(chromium)?;
        Ok(())
    }

    async fn viewport(&self) -> Result<(f64, f64)> {
        let size: Vec<f64> = self
            .page
            .evaluate(VIEWPORT_SCRIPT.to_string())
            .await
            .map_err(|e| BrowserError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::Script(e.to_string()))?;

        match size.as_slice() {
            [w, h] if *w > 0.0 && *h > 0.0 => Ok((*w, *h)),
            _ => Ok((
                f64::from(self.identity.viewport_width),
                f64::from(self.identity.viewport_height),
            )),
        }
    }
}

#[async_trait]
impl BrowserActions for BrowserSession {
    async fn navigate(&mut self, url: &str, referer: Option<&str>) -> Result<PageLoad> {
        self.ensure_open()?;
        validate_url(url)?;

        let headers = Headers::new(self.identity.request_headers(referer));
        self.page
            .execute(SetExtraHttpHeadersParams::new(headers))
            .await
            .map_err(chromium)?;

        tracing::debug!("Navigating to {}", url);
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(BrowserError::NavigationError(format!("{url}: {e}"))),
            Err(_) => {
                return Err(BrowserError::Timeout(format!(
                    "navigation to {url} exceeded {}s",
                    self.navigation_timeout.as_secs()
                )))
            }
        }

        let status = self.response_status().await;
        let final_url = self
            .page
            .url()
            .await
            .map_err(chromium)?
            .unwrap_or_else(|| url.to_string());

        Ok(PageLoad {
            requested_url: url.to_string(),
            final_url,
            status,
        })
    }

    async fn dismiss_consent(&mut self) -> ConsentOutcome {
        if self.browser.is_none() {
            return ConsentOutcome::NotFound;
        }
        self.consent.dismiss(&*self).await
    }

    async fn content(&mut self) -> Result<String> {
        self.ensure_open()?;
        self.page.content().await.map_err(chromium)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };

        if let Err(e) = self.page.clone().close().await {
            tracing::debug!("Page close failed: {}", e);
        }
        let result = browser.close().await.map(|_| ()).map_err(chromium);
        if let Err(e) = browser.wait().await {
            tracing::debug!("Browser process wait failed: {}", e);
        }
        self.handler_task.abort();
        tracing::info!("Browser session closed");
        result
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
