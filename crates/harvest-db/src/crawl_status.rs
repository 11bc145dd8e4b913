//! The crawl control record.
//!
//! One row per crawl source. The operator UI requests a run by bumping
//! `triggered_at`; the supervisor claims, logs into and finishes runs.
//! Claims are compare-and-swap updates against the previously observed
//! `status` and `last_run_started_at`, so two supervisors polling the same
//! row cannot both start a run.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use harvest_core::{CrawlState, TargetCategory};
use serde::Serialize;
use sqlx::{Pool, Row, Sqlite};

/// Snapshot of a crawl status row.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlStatus {
    pub source: String,
    pub status: CrawlState,
    pub triggered_at: Option<DateTime<Utc>>,
    pub last_run_started_at: Option<DateTime<Utc>>,
    pub last_run_finished_at: Option<DateTime<Utc>>,
    pub target_category: TargetCategory,
    pub is_deep_sync: bool,
    pub logs: String,
    pub last_error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Stored text of `last_run_started_at`, used as the claim witness.
    #[serde(skip)]
    started_at_raw: Option<String>,
}

impl CrawlStatus {
    /// Whether a run has ever been started for this source.
    pub fn has_run(&self) -> bool {
        self.started_at_raw.is_some()
    }
}

/// Parse a stored timestamp. Accepts RFC3339 and `SQLite`'s `datetime('now')`
/// format; anything else reads as absent.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

const SELECT_COLUMNS: &str = "SELECT source, status, triggered_at, last_run_started_at,
        last_run_finished_at, target_category, is_deep_sync, logs, last_error, updated_at
     FROM crawl_status WHERE source = ?";

/// Fetch the record for `source`, if any.
pub async fn get(pool: &Pool<Sqlite>, source: &str) -> Result<Option<CrawlStatus>> {
    let row = sqlx::query(SELECT_COLUMNS)
        .bind(source)
        .fetch_optional(pool)
        .await?;

    row.map(|row| parse_status_row(&row)).transpose()
}

/// Fetch the record for `source`, creating an idle one if missing.
pub async fn get_or_create(pool: &Pool<Sqlite>, source: &str) -> Result<CrawlStatus> {
    sqlx::query(
        "INSERT INTO crawl_status (source, status, updated_at) VALUES (?, 'idle', ?)
         ON CONFLICT(source) DO NOTHING",
    )
    .bind(source)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    get(pool, source)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("crawl status for '{source}'")))
}

/// Request a run, as the operator UI does.
pub async fn request_run(
    pool: &Pool<Sqlite>,
    source: &str,
    target: &TargetCategory,
    deep: bool,
) -> Result<CrawlStatus> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO crawl_status (source, status, triggered_at, target_category, is_deep_sync, updated_at)
         VALUES (?, 'idle', ?, ?, ?, ?)
         ON CONFLICT(source) DO UPDATE SET
             triggered_at = excluded.triggered_at,
             target_category = excluded.target_category,
             is_deep_sync = excluded.is_deep_sync,
             updated_at = excluded.updated_at",
    )
    .bind(source)
    .bind(&now)
    .bind(target.as_str())
    .bind(deep)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(
        "Run requested for {} (target: {}, deep: {})",
        source,
        target,
        deep
    );

    get(pool, source)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("crawl status for '{source}'")))
}

/// Claim a run for `observed.source`.
///
/// Succeeds only if the row still carries the status and start time seen in
/// `observed`. On success the row is `running` with a fresh start time, no
/// finish time and a log reset to a single start line.
pub async fn try_claim(
    pool: &Pool<Sqlite>,
    observed: &CrawlStatus,
    started_at: DateTime<Utc>,
) -> Result<bool> {
    let started = started_at.to_rfc3339();
    let result = sqlx::query(
        "UPDATE crawl_status
         SET status = 'running', last_run_started_at = ?, last_run_finished_at = NULL,
             last_error = NULL, logs = ?, updated_at = ?
         WHERE source = ? AND status = ? AND COALESCE(last_run_started_at, '') = ?",
    )
    .bind(&started)
    .bind(format!("Run started at {started}\n"))
    .bind(&started)
    .bind(&observed.source)
    .bind(observed.status.as_str())
    .bind(observed.started_at_raw.as_deref().unwrap_or(""))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Append one line to the progress log.
pub async fn append_log(pool: &Pool<Sqlite>, source: &str, line: &str) -> Result<()> {
    sqlx::query(
        "UPDATE crawl_status SET logs = COALESCE(logs, '') || ?, updated_at = ? WHERE source = ?",
    )
    .bind(format!("{}\n", line.trim_end()))
    .bind(Utc::now().to_rfc3339())
    .bind(source)
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark the current run finished and clear the deep-sync flag.
pub async fn finish_run(pool: &Pool<Sqlite>, source: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let result = sqlx::query(
        "UPDATE crawl_status
         SET status = 'idle', last_run_finished_at = ?, is_deep_sync = 0, updated_at = ?
         WHERE source = ?",
    )
    .bind(&now)
    .bind(&now)
    .bind(source)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound(format!(
            "crawl status for '{source}'"
        )));
    }
    Ok(())
}

/// Move the record to `error` and keep the message.
pub async fn record_error(pool: &Pool<Sqlite>, source: &str, message: &str) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    sqlx::query(
        "INSERT INTO crawl_status (source, status, last_error, logs, updated_at)
         VALUES (?, 'error', ?, ?, ?)
         ON CONFLICT(source) DO UPDATE SET
             status = 'error',
             last_error = excluded.last_error,
             logs = COALESCE(crawl_status.logs, '') || excluded.logs,
             updated_at = excluded.updated_at",
    )
    .bind(source)
    .bind(message)
    .bind(format!("ERROR: {message}\n"))
    .bind(&now)
    .execute(pool)
    .await?;
    Ok(())
}

fn parse_status_row(row: &sqlx::sqlite::SqliteRow) -> Result<CrawlStatus> {
    let status: String = row.try_get("status")?;
    let status = CrawlState::parse(&status).map_err(|e| DatabaseError::Decode(e.to_string()))?;

    let optional_time = |column: &str| -> Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = row.try_get(column)?;
        Ok(raw.as_deref().and_then(parse_timestamp))
    };

    let started_at_raw: Option<String> = row
        .try_get::<Option<String>, _>("last_run_started_at")?
        .filter(|s| !s.trim().is_empty());
    let target: Option<String> = row.try_get("target_category")?;
    let deep: i64 = row.try_get("is_deep_sync")?;
    let logs: Option<String> = row.try_get("logs")?;

    Ok(CrawlStatus {
        source: row.try_get("source")?,
        status,
        triggered_at: optional_time("triggered_at")?,
        last_run_started_at: started_at_raw.as_deref().and_then(parse_timestamp),
        last_run_finished_at: optional_time("last_run_finished_at")?,
        target_category: TargetCategory::parse(target.as_deref().unwrap_or("")),
        is_deep_sync: deep != 0,
        logs: logs.unwrap_or_default(),
        last_error: row.try_get("last_error")?,
        updated_at: optional_time("updated_at")?,
        started_at_raw,
    })
}
