//! Cookie-consent overlay handling.
//!
//! Consent managers differ per site and change without notice, so dismissal
//! is a chain of strategies tried in order. The first one that reports a
//! click wins; a failing strategy is logged and skipped.

use crate::actions::ConsentOutcome;
use crate::error::Result;
use async_trait::async_trait;
use harvest_core::BrowserConfig;

/// Minimal page surface the consent strategies need.
#[async_trait]
pub trait PageScripting: Send + Sync {
    /// Evaluate a script that yields a boolean.
    async fn eval_bool(&self, script: &str) -> Result<bool>;

    /// Evaluate `script` in every frame of the page, cross-origin frames
    /// included. `true` as soon as one frame returns `true`.
    async fn eval_bool_in_frames(&self, script: &str) -> Result<bool> {
        self.eval_bool(script).await
    }

    /// Dispatch a mouse click at viewport coordinates.
    async fn click_at(&self, x: f64, y: f64) -> Result<()>;

    /// Current viewport size in CSS pixels.
    async fn viewport(&self) -> Result<(f64, f64)>;
}

#[async_trait]
pub trait ConsentStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Blind strategies cannot tell whether a banner was actually hit.
    fn is_blind(&self) -> bool {
        false
    }

    /// Returns `true` when a click was issued.
    async fn try_dismiss(&self, page: &dyn PageScripting) -> Result<bool>;
}

const DEFAULT_SELECTORS: &[&str] = &[
    "#onetrust-accept-btn-handler",
    "#uc-btn-accept-banner",
    "[data-testid='uc-accept-all-button']",
    "#didomi-notice-agree-button",
    ".cmpboxbtnyes",
    ".cc-allow",
    "button[data-cookiebanner='accept_button']",
    "#CybotCookiebotDialogBodyLevelButtonLevelOptinAllowAll",
];

const DEFAULT_PHRASES: &[&str] = &[
    "Alle akzeptieren",
    "Alle Cookies akzeptieren",
    "Akzeptieren",
    "Alle zulassen",
    "Einverstanden",
    "Zustimmen",
    "Accept all",
    "Accept",
    "Agree",
    "Allow all",
];

const SELECTOR_SCRIPT: &str = r"(() => {
  const selectors = __SELECTORS__;
  for (const sel of selectors) {
    let el = null;
    try { el = document.querySelector(sel); } catch (e) { continue; }
    if (el && el.getClientRects().length > 0) { el.click(); return true; }
  }
  return false;
})()";

// Runs once per frame; walks that frame's document and open shadow roots.
const TEXT_SCRIPT: &str = r#"(() => {
  const phrases = __PHRASES__.map(p => p.toLowerCase());
  const roots = [document];
  for (let i = 0; i < roots.length; i++) {
    for (const host of Array.from(roots[i].querySelectorAll('*'))) {
      if (host.shadowRoot) roots.push(host.shadowRoot);
    }
  }
  for (const root of roots) {
    const candidates = root.querySelectorAll('button, a, [role="button"], input[type="button"], input[type="submit"]');
    for (const el of Array.from(candidates)) {
      const text = (el.innerText || el.value || el.textContent || '').trim().toLowerCase();
      if (text && text.length < 60 && phrases.some(p => text === p || text.startsWith(p))) {
        el.click();
        return true;
      }
    }
  }
  return false;
})()"#;

fn js_string_array(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

/// Clicks the accept button of well-known consent managers by CSS selector.
pub struct SelectorConsent {
    selectors: Vec<String>,
}

impl SelectorConsent {
    pub fn new(selectors: Vec<String>) -> Self {
        Self { selectors }
    }

    fn script(&self) -> String {
        SELECTOR_SCRIPT.replace("__SELECTORS__", &js_string_array(&self.selectors))
    }
}

impl Default for SelectorConsent {
    fn default() -> Self {
        Self::new(DEFAULT_SELECTORS.iter().map(ToString::to_string).collect())
    }
}

#[async_trait]
impl ConsentStrategy for SelectorConsent {
    fn name(&self) -> &'static str {
        "selector"
    }

    async fn try_dismiss(&self, page: &dyn PageScripting) -> Result<bool> {
        page.eval_bool(&self.script()).await
    }
}

/// Clicks any button whose label starts with a known accept phrase.
pub struct TextConsent {
    phrases: Vec<String>,
}

impl TextConsent {
    pub fn new(phrases: Vec<String>) -> Self {
        Self { phrases }
    }

    fn script(&self) -> String {
        TEXT_SCRIPT.replace("__PHRASES__", &js_string_array(&self.phrases))
    }
}

impl Default for TextConsent {
    fn default() -> Self {
        Self::new(DEFAULT_PHRASES.iter().map(ToString::to_string).collect())
    }
}

#[async_trait]
impl ConsentStrategy for TextConsent {
    fn name(&self) -> &'static str {
        "text"
    }

    async fn try_dismiss(&self, page: &dyn PageScripting) -> Result<bool> {
        page.eval_bool_in_frames(&self.script()).await
    }
}

/// Last resort: click where the banner's accept button usually sits.
pub struct BlindClickConsent {
    x_fraction: f64,
    y_fraction: f64,
}

impl BlindClickConsent {
    pub fn new(x_fraction: f64, y_fraction: f64) -> Self {
        Self {
            x_fraction,
            y_fraction,
        }
    }
}

#[async_trait]
impl ConsentStrategy for BlindClickConsent {
    fn name(&self) -> &'static str {
        "blind-click"
    }

    fn is_blind(&self) -> bool {
        true
    }

    async fn try_dismiss(&self, page: &dyn PageScripting) -> Result<bool> {
        let (width, height) = page.viewport().await?;
        page.click_at(width * self.x_fraction, height * self.y_fraction)
            .await?;
        Ok(true)
    }
}

/// Ordered chain of consent strategies.
pub struct ConsentHandler {
    strategies: Vec<Box<dyn ConsentStrategy>>,
}

impl ConsentHandler {
    pub fn new(strategies: Vec<Box<dyn ConsentStrategy>>) -> Self {
        Self { strategies }
    }

    /// Selector, then text match, then the configured blind click if enabled.
    pub fn from_config(config: &BrowserConfig) -> Self {
        let mut strategies: Vec<Box<dyn ConsentStrategy>> = vec![
            Box::new(SelectorConsent::default()),
            Box::new(TextConsent::default()),
        ];
        if config.blind_click {
            strategies.push(Box::new(BlindClickConsent::new(
                config.consent_click_x,
                config.consent_click_y,
            )));
        }
        Self::new(strategies)
    }

    pub async fn dismiss(&self, page: &dyn PageScripting) -> ConsentOutcome {
        for strategy in &self.strategies {
            match strategy.try_dismiss(page).await {
                Ok(true) if strategy.is_blind() => {
                    tracing::debug!("Consent: issued blind click ({})", strategy.name());
                    return ConsentOutcome::Attempted;
                }
                Ok(true) => {
                    tracing::info!("Consent banner dismissed via {}", strategy.name());
                    return ConsentOutcome::Dismissed(strategy.name());
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::debug!("Consent strategy {} failed: {}", strategy.name(), e);
                }
            }
        }
        ConsentOutcome::NotFound
    }
}
