//! Headless browser sessions for JavaScript-rendered directory pages.
//!
//! Provides a Chromium-backed session with a fixed desktop identity,
//! referer-aware navigation and best-effort cookie-consent dismissal.
//! The [`BrowserActions`] and [`SessionLauncher`] traits are the seam the
//! crawler is written against, so tests can drive it with scripted fakes.

pub mod actions;
pub mod consent;
pub mod engine;
pub mod error;
pub mod fingerprint;

pub use actions::{BrowserActions, ConsentOutcome, PageLoad, SessionLauncher};
pub use consent::{ConsentHandler, ConsentStrategy, PageScripting};
pub use engine::{BrowserEngine, BrowserSession};
pub use error::{BrowserError, Result};
pub use fingerprint::Identity;
