//! Harvest Scheduler - decides when to crawl and runs the crawl supervisor.
//!
//! - [`trigger`] - pure should-run evaluation over the status record
//! - [`plan`] - category selection for a run
//! - [`supervisor`] - the polling loop that claims and executes runs

pub mod error;
pub mod plan;
pub mod supervisor;
pub mod trigger;

pub use error::{Result, SupervisorError};
pub use plan::select_categories;
pub use supervisor::{CycleOutcome, RunSummary, Supervisor};
pub use trigger::{evaluate_trigger, RunCause, RunDecision, SkipReason, TriggerPolicy, TriggerView};
