//! Harvest Core - Foundation crate for the harvest directory crawler.
//!
//! This crate provides shared types, error handling and configuration
//! management that all other harvest crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths and env overrides
//! - [`types`] - Shared enums (`CrawlState`, `ImportStatus`, `TargetCategory`)
//!
//! # Example
//!
//! ```rust
//! use harvest_core::{AppConfig, TargetCategory};
//!
//! let config = AppConfig::default();
//! assert_eq!(config.crawl.max_pages, 25);
//!
//! let target = TargetCategory::parse("all");
//! assert_eq!(target, TargetCategory::All);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AppConfig, BrowserConfig, CategoryMapping, CrawlPolicy, DatabaseConfig, SourceConfig,
    SupervisorConfig,
};
pub use error::{ConfigError, ConfigResult, HarvestError, Result};
pub use types::{CrawlState, ImportStatus, TargetCategory};
