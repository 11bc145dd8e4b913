//! Configuration management for harvest.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/harvest/config.toml` (or platform equivalent)
/// unless an explicit path is given. Missing sections fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Staging database settings
    pub database: DatabaseConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// The directory site being crawled
    pub source: SourceConfig,
    /// Pagination stopping and pacing policy
    pub crawl: CrawlPolicy,
    /// Polling supervisor settings
    pub supervisor: SupervisorConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults if not found.
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration (default location or `path`) with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `HARVEST_DATABASE_URL`: staging database URL
    /// - `HARVEST_HEADLESS`: browser headless mode (true/false)
    /// - `HARVEST_CHROME_PATH`: Chrome/Chromium executable
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("HARVEST_DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = Some(url);
                tracing::debug!("Override database.url from env");
            }
        }

        if let Some(val) = lookup("HARVEST_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Some(path) = lookup("HARVEST_CHROME_PATH") {
            self.browser.chrome_executable = Some(PathBuf::from(path));
        }
    }

    /// Reject values the crawler cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.crawl.max_pages == 0 {
            return Err(invalid("crawl.max_pages", "must be at least 1"));
        }
        if self.crawl.deep_window == 0 {
            return Err(invalid("crawl.deep_window", "must be at least 1"));
        }
        if self.crawl.item_delay_min_ms > self.crawl.item_delay_max_ms {
            return Err(invalid(
                "crawl.item_delay_min_ms",
                "must not exceed crawl.item_delay_max_ms",
            ));
        }
        if self.source.base_url.trim().is_empty() {
            return Err(invalid("source.base_url", "must not be empty"));
        }
        if let Some(mapping) = self
            .source
            .categories
            .iter()
            .find(|c| c.path.trim_matches('/').is_empty())
        {
            return Err(invalid(
                "source.categories",
                &format!("category '{}' has an empty path", mapping.category_id),
            ));
        }
        for (field, value) in [
            ("browser.consent_click_x", self.browser.consent_click_x),
            ("browser.consent_click_y", self.browser.consent_click_y),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, "must be a viewport fraction between 0 and 1"));
            }
        }
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/harvest/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "harvest", "harvest").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Staging database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` URL or path. Required at startup; there is deliberately no default.
    pub url: Option<String>,
    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Fixed desktop user agent sent with every request
    pub user_agent: String,
    /// `Accept-Language` header value
    pub accept_language: String,
    /// Chrome/Chromium executable; auto-detected when unset
    pub chrome_executable: Option<PathBuf>,
    /// Horizontal position of the last-resort consent click, as a viewport fraction
    pub consent_click_x: f64,
    /// Vertical position of the last-resort consent click, as a viewport fraction
    pub consent_click_y: f64,
    /// Whether the last-resort blind click is attempted at all
    pub blind_click: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
            accept_language: "de-DE,de;q=0.9,en-US;q=0.8,en;q=0.7".to_string(),
            chrome_executable: None,
            consent_click_x: 0.5,
            consent_click_y: 0.88,
            blind_click: true,
        }
    }
}

impl BrowserConfig {
    /// Navigation timeout as a `Duration`.
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

/// The third-party directory site and how its pages are laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Crawl source key; also stored as `source_system` on every import row
    pub name: String,
    /// Site origin, e.g. `https://www.example-directory.de`
    pub base_url: String,
    /// Path segment under which listings live, e.g. `vendors`
    pub directory_path: String,
    /// Query parameter used for pages 2..N
    pub page_query_param: String,
    /// Path segment used by the alternate pagination scheme (`/<category>/<segment>/<n>`)
    pub page_path_segment: String,
    /// Element id of the embedded page-state script
    pub state_element_id: String,
    /// JSON key holding the listing array inside the page state
    pub state_array_key: String,
    /// Location label the site uses for listings without a region
    pub unregioned_label: String,
    /// Category label given to listings recovered from the DOM scan
    pub dom_category_label: String,
    /// External category paths and the internal categories they map to
    pub categories: Vec<CategoryMapping>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            name: "directory".to_string(),
            base_url: "https://www.example-directory.de".to_string(),
            directory_path: "vendors".to_string(),
            page_query_param: "page".to_string(),
            page_path_segment: "page".to_string(),
            state_element_id: "__NEXT_DATA__".to_string(),
            state_array_key: "vendors".to_string(),
            unregioned_label: "Überregional".to_string(),
            dom_category_label: "Dienstleister".to_string(),
            categories: Vec::new(),
        }
    }
}

/// One external category path and the internal category it feeds.
///
/// Location-scoped variants (`fotografen/berlin`, `fotografen/hamburg`) are
/// separate mappings sharing the same `category_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    /// Path below the directory root, e.g. `hochzeitsfotografen` or `hochzeitsfotografen/berlin`
    pub path: String,
    /// Internal category identifier
    pub category_id: String,
    /// Human-readable name, also accepted as an operator target
    #[serde(default)]
    pub label: String,
}

impl CategoryMapping {
    /// Path with surrounding slashes removed.
    #[must_use]
    pub fn normalized_path(&self) -> &str {
        self.path.trim_matches('/')
    }

    /// First path segment; listing detail pages hang off this.
    #[must_use]
    pub fn root_segment(&self) -> &str {
        self.normalized_path()
            .split('/')
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    /// Label to show in progress lines, falling back to the path.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            self.normalized_path()
        } else {
            &self.label
        }
    }

    /// Whether an operator-supplied selector names this mapping.
    #[must_use]
    pub fn matches(&self, selector: &str) -> bool {
        let selector = selector.trim().trim_matches('/');
        self.normalized_path().eq_ignore_ascii_case(selector)
            || self.category_id.eq_ignore_ascii_case(selector)
            || (!self.label.is_empty() && self.label.to_lowercase() == selector.to_lowercase())
    }
}

/// Pagination stopping and pacing policy.
///
/// These are tuning knobs, not algorithm requirements:
/// - `normal_zero_new_pages`: re-crawls of an ingested category stop quickly
/// - `deep_window`/`deep_min_new`: deep syncs tolerate sparse pages but still terminate
/// - `safety_zero_pages`: absolute bound for a category that yields nothing new
/// - `max_pages`: hard ceiling per category run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlPolicy {
    /// Hard page ceiling per category run
    pub max_pages: u32,
    /// Normal mode: consecutive pages without new listings before stopping
    pub normal_zero_new_pages: u32,
    /// Deep mode: trailing window size, in pages
    pub deep_window: usize,
    /// Deep mode: stop once the windowed new-listing sum falls below this
    pub deep_min_new: usize,
    /// Stop after this many pages when the category produced nothing new at all
    pub safety_zero_pages: u32,
    /// Lower bound of the pause after each newly inserted listing
    pub item_delay_min_ms: u64,
    /// Upper bound of the pause after each newly inserted listing
    pub item_delay_max_ms: u64,
    /// Pause between categories
    pub category_pause_ms: u64,
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        Self {
            max_pages: 25,
            normal_zero_new_pages: 2,
            deep_window: 5,
            deep_min_new: 3,
            safety_zero_pages: 5,
            item_delay_min_ms: 2000,
            item_delay_max_ms: 5000,
            category_pause_ms: 5000,
        }
    }
}

/// Polling supervisor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Seconds between polls of the status record
    pub poll_interval_secs: u64,
    /// Seconds to wait after a failed cycle
    pub error_cooldown_secs: u64,
    /// A `running` record older than this is considered stuck
    pub stale_after_secs: u64,
    /// Treat a finished crawl as re-triggered after this many hours (disabled when unset)
    pub rerun_after_hours: Option<u64>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            error_cooldown_secs: 60,
            stale_after_secs: 3 * 60 * 60,
            rerun_after_hours: None,
        }
    }
}

impl SupervisorConfig {
    /// Poll interval as a `Duration`.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Error cooldown as a `Duration`.
    #[must_use]
    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.error_cooldown_secs)
    }

    /// Staleness window as a `chrono::Duration`.
    #[must_use]
    pub fn stale_after(&self) -> chrono::Duration {
        let secs = i64::try_from(self.stale_after_secs).unwrap_or(i64::MAX);
        chrono::Duration::seconds(secs.min(i64::MAX / 1_000))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.database.url.is_none());
        assert!(config.browser.headless);
        assert_eq!(config.crawl.max_pages, 25);
        assert_eq!(config.crawl.normal_zero_new_pages, 2);
        assert_eq!(config.crawl.deep_window, 5);
        assert_eq!(config.crawl.deep_min_new, 3);
        assert_eq!(config.supervisor.poll_interval_secs, 30);
        assert_eq!(config.supervisor.stale_after_secs, 10_800);
        assert!(config.browser.accept_language.starts_with("de"));
        config.validate().expect("defaults are valid");
    }

    #[test]
    fn test_config_load_from_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let toml_str = r#"
[database]
url = "sqlite://staging.db"

[source]
name = "hochzeit-verzeichnis"
base_url = "https://www.example-directory.de"

[[source.categories]]
path = "hochzeitsfotografen"
category_id = "photography"
label = "Fotografen"

[[source.categories]]
path = "hochzeitsfotografen/berlin"
category_id = "photography"

[crawl]
max_pages = 10
"#;
        fs::write(&config_path, toml_str).expect("write config file");

        let config = AppConfig::load_from(&config_path).expect("load config");
        assert_eq!(config.database.url.as_deref(), Some("sqlite://staging.db"));
        assert_eq!(config.source.name, "hochzeit-verzeichnis");
        assert_eq!(config.source.categories.len(), 2);
        assert_eq!(config.source.categories[1].category_id, "photography");
        assert_eq!(config.crawl.max_pages, 10);
        // Untouched values keep their defaults
        assert_eq!(config.crawl.deep_window, 5);
        assert_eq!(config.source.state_array_key, "vendors");
    }

    #[test]
    fn test_load_from_missing_file() {
        let tmp = TempDir::new().expect("create temp dir");
        let result = AppConfig::load_from(&tmp.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound { .. })));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let toml_str = r"
[crawl]
item_delay_min_ms = 9000
item_delay_max_ms = 1000
";
        let config: AppConfig = toml::from_str(toml_str).expect("parse config");
        let err = config.validate().expect_err("min above max must be rejected");
        assert!(err.to_string().contains("crawl.item_delay_min_ms"));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("HARVEST_DATABASE_URL", "sqlite:///var/lib/harvest.db"),
            ("HARVEST_HEADLESS", "false"),
            ("HARVEST_CHROME_PATH", "/usr/bin/chromium"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(|v| (*v).to_string()));

        assert_eq!(
            config.database.url.as_deref(),
            Some("sqlite:///var/lib/harvest.db")
        );
        assert!(!config.browser.headless);
        assert_eq!(
            config.browser.chrome_executable,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
    }

    #[test]
    fn test_blank_database_env_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| {
            (key == "HARVEST_DATABASE_URL").then(|| "   ".to_string())
        });
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_category_mapping_matching() {
        let mapping = CategoryMapping {
            path: "/hochzeitsfotografen/berlin/".to_string(),
            category_id: "photography".to_string(),
            label: "Fotografen Berlin".to_string(),
        };

        assert_eq!(mapping.normalized_path(), "hochzeitsfotografen/berlin");
        assert_eq!(mapping.root_segment(), "hochzeitsfotografen");
        assert!(mapping.matches("hochzeitsfotografen/berlin"));
        assert!(mapping.matches("PHOTOGRAPHY"));
        assert!(mapping.matches("fotografen berlin"));
        assert!(!mapping.matches("hochzeitsfotografen"));
    }
}
