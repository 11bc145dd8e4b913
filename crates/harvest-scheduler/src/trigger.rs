//! Should-run evaluation over the crawl status record.

use chrono::{DateTime, Utc};
use harvest_core::{CrawlState, SupervisorConfig};
use harvest_db::CrawlStatus;
use std::fmt;

/// The parts of the status record that decide whether to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerView {
    pub status: CrawlState,
    pub has_run: bool,
    pub triggered_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<&CrawlStatus> for TriggerView {
    fn from(record: &CrawlStatus) -> Self {
        Self {
            status: record.status,
            has_run: record.has_run(),
            triggered_at: record.triggered_at,
            started_at: record.last_run_started_at,
            finished_at: record.last_run_finished_at,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TriggerPolicy {
    /// A `running` record started longer ago than this is stuck
    pub stale_after: chrono::Duration,
    /// Re-run a finished crawl after this long, if set
    pub rerun_after: Option<chrono::Duration>,
}

impl TriggerPolicy {
    pub fn from_config(config: &SupervisorConfig) -> Self {
        Self {
            stale_after: config.stale_after(),
            rerun_after: config
                .rerun_after_hours
                .and_then(|h| i64::try_from(h).ok())
                .map(|h| chrono::Duration::hours(h.min(i64::MAX / 3_600_000))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunCause {
    FirstRun,
    Triggered,
    /// Forcible takeover of a run that never finished
    StuckTakeover,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyRunning,
    NotTriggered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    Start(RunCause),
    Skip(SkipReason),
}

impl fmt::Display for RunCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FirstRun => "first run",
            Self::Triggered => "operator trigger",
            Self::StuckTakeover => "stuck run takeover",
            Self::Scheduled => "scheduled re-run",
        })
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::AlreadyRunning => "a healthy run is in progress",
            Self::NotTriggered => "no trigger since the last run",
        })
    }
}

/// Decide whether a new run should start at `now`.
///
/// A `running` record is only taken over once it has been running longer
/// than the staleness window without finishing; a `running` record with no
/// readable start time counts as stuck. Otherwise a run starts if none ever
/// has, if the trigger is newer than the last start, or if the optional
/// re-run interval has elapsed since the last finish.
pub fn evaluate_trigger(view: &TriggerView, now: DateTime<Utc>, policy: &TriggerPolicy) -> RunDecision {
    if view.status == CrawlState::Running {
        let stuck = match view.started_at {
            Some(started) => view.finished_at.is_none() && now - started > policy.stale_after,
            None => true,
        };
        return if stuck {
            RunDecision::Start(RunCause::StuckTakeover)
        } else {
            RunDecision::Skip(SkipReason::AlreadyRunning)
        };
    }

    if !view.has_run {
        return RunDecision::Start(RunCause::FirstRun);
    }

    if let Some(triggered) = view.triggered_at {
        if view.started_at.map_or(true, |started| triggered > started) {
            return RunDecision::Start(RunCause::Triggered);
        }
    }

    if let (Some(interval), Some(finished)) = (policy.rerun_after, view.finished_at) {
        if now - finished >= interval {
            return RunDecision::Start(RunCause::Scheduled);
        }
    }

    RunDecision::Skip(SkipReason::NotTriggered)
}
