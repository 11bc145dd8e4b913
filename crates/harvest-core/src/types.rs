//! Shared types used across the harvest crates.
//!
//! This module defines common newtypes and enums that provide type safety
//! and clear domain modeling.

use crate::error::HarvestError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the crawl status record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    /// No run in progress
    Idle,
    /// A supervisor has claimed a run
    Running,
    /// The last cycle failed; see the record's error message
    Error,
}

impl CrawlState {
    /// Wire representation stored in the status record.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Error => "error",
        }
    }

    /// Parse the stored representation.
    ///
    /// # Errors
    /// Returns error for anything other than `idle`, `running` or `error`.
    pub fn parse(s: &str) -> Result<Self, HarvestError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "idle" => Ok(Self::Idle),
            "running" => Ok(Self::Running),
            "error" => Ok(Self::Error),
            other => Err(HarvestError::Validation(format!(
                "invalid crawl state '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderation status of a staged import.
///
/// The crawler only ever writes `Pending`; the other states belong to
/// external moderation workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    /// Awaiting moderation
    Pending,
    /// Accepted by staff
    Approved,
    /// Rejected by staff
    Rejected,
}

impl ImportStatus {
    /// Wire representation stored in the staging table.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Parse from string representation; unknown values read as `Pending`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "approved" => Self::Approved,
            "rejected" => Self::Rejected,
            _ => Self::Pending,
        }
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which categories an operator asked the next run to cover.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetCategory {
    /// Every configured category
    #[default]
    All,
    /// One category, named by path, label or internal id
    Specific(String),
}

impl TargetCategory {
    /// Parse the status record's `target_category` field. Empty means `All`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            Self::All
        } else {
            Self::Specific(trimmed.to_string())
        }
    }

    /// Stored representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Specific(s) => s,
        }
    }
}

impl fmt::Display for TargetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
