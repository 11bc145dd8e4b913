use super::open_database;
use chrono::{DateTime, Utc};
use harvest_core::{AppConfig, ImportStatus};
use harvest_db::{crawl_status, import_records, CrawlStatus};
use std::fmt::Write;

/// Render the status record plus staging counts for the configured source.
pub async fn execute(config: &AppConfig, json: bool) -> anyhow::Result<String> {
    let db = open_database(config).await?;
    let pool = db.pool();
    let source = &config.source.name;

    let record = crawl_status::get(pool, source).await?;
    let counts = import_records::count_by_status(pool, source).await?;
    db.close().await;

    if json {
        let value = serde_json::json!({
            "status": record,
            "imports": counts
                .iter()
                .map(|(status, n)| (status.as_str().to_string(), serde_json::Value::from(*n)))
                .collect::<serde_json::Map<_, _>>(),
        });
        return Ok(format!("{}\n", serde_json::to_string_pretty(&value)?));
    }

    Ok(match record {
        Some(record) => render(&record, &counts),
        None => format!("No crawl status recorded for {source}\n"),
    })
}

fn when(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "-".to_string(), |t| t.to_rfc3339())
}

/// Human-readable status report.
pub fn render(record: &CrawlStatus, counts: &[(ImportStatus, i64)]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Source:        {}", record.source);
    let _ = writeln!(out, "Status:        {}", record.status);
    let _ = writeln!(out, "Target:        {}", record.target_category);
    let _ = writeln!(out, "Deep sync:     {}", record.is_deep_sync);
    let _ = writeln!(out, "Triggered:     {}", when(record.triggered_at));
    let _ = writeln!(out, "Last started:  {}", when(record.last_run_started_at));
    let _ = writeln!(out, "Last finished: {}", when(record.last_run_finished_at));
    if let Some(error) = &record.last_error {
        let _ = writeln!(out, "Last error:    {error}");
    }

    let total: i64 = counts.iter().map(|(_, n)| n).sum();
    let _ = writeln!(out, "Imports:       {total}");
    for (status, n) in counts {
        let _ = writeln!(out, "  {status}: {n}");
    }

    if !record.logs.is_empty() {
        let _ = writeln!(out, "\n{}", record.logs.trim_end());
    }
    out
}
