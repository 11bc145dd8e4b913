//! Supervisor cycles against an in-memory database and a scripted site.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use harvest_browser::{BrowserActions, BrowserError, ConsentOutcome, PageLoad, SessionLauncher};
use harvest_core::{AppConfig, CategoryMapping, CrawlState, TargetCategory};
use harvest_crawler::{Pacer, StopReason, SyncMode};
use harvest_db::{cities, crawl_status, import_records, Database};
use harvest_scheduler::{CycleOutcome, RunCause, SkipReason, Supervisor, SupervisorError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SOURCE: &str = "directory";

/// Two pages of listings per category, then an empty page.
struct FakeSession {
    current: String,
    closed: Arc<AtomicUsize>,
}

fn render(category: &str, page: u32) -> String {
    let vendors: Vec<_> = if page <= 2 {
        (0..3)
            .map(|i| {
                serde_json::json!({
                    "name": format!("{category} vendor {page}-{i}"),
                    "slug": format!("{category}-{page}-{i}"),
                    "city": "45127 Essen",
                })
            })
            .collect()
    } else {
        Vec::new()
    };
    let state = serde_json::json!({ "vendors": vendors });
    format!(r#"<script id="__NEXT_DATA__">{state}</script>"#)
}

#[async_trait]
impl BrowserActions for FakeSession {
    async fn navigate(&mut self, url: &str, _referer: Option<&str>) -> harvest_browser::Result<PageLoad> {
        let (path, page) = match url.split_once("?page=") {
            Some((path, n)) => (path, n.parse().unwrap_or(1)),
            None => (url, 1),
        };
        let category = path.rsplit('/').next().unwrap_or_default();
        self.current = render(category, page);
        Ok(PageLoad {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status: 200,
        })
    }

    async fn dismiss_consent(&mut self) -> ConsentOutcome {
        ConsentOutcome::NotFound
    }

    async fn content(&mut self) -> harvest_browser::Result<String> {
        Ok(self.current.clone())
    }

    async fn close(&mut self) -> harvest_browser::Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct FakeLauncher {
    launches: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    fail: bool,
}

#[async_trait]
impl SessionLauncher for FakeLauncher {
    type Session = FakeSession;

    async fn launch(&self) -> harvest_browser::Result<FakeSession> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(BrowserError::ChromiumError("no chrome binary".to_string()));
        }
        Ok(FakeSession {
            current: String::new(),
            closed: Arc::clone(&self.closed),
        })
    }
}

fn config() -> AppConfig {
    let mut config = AppConfig::default();
    config.source.name = SOURCE.to_string();
    config.source.categories = vec![
        CategoryMapping {
            path: "dj".to_string(),
            category_id: "music".to_string(),
            label: "DJs".to_string(),
        },
        CategoryMapping {
            path: "fotografen".to_string(),
            category_id: "photo".to_string(),
            label: "Fotografen".to_string(),
        },
    ];
    config
}

async fn setup(launcher: FakeLauncher) -> (Database, Supervisor<FakeLauncher>) {
    let db = Database::open_in_memory().await.expect("open db");
    cities::upsert_city(db.pool(), 1, "Essen").await.expect("city");
    let supervisor = Supervisor::new(db.clone(), launcher, &config()).with_pacer(Pacer::none());
    (db, supervisor)
}

async fn status(db: &Database) -> crawl_status::CrawlStatus {
    crawl_status::get(db.pool(), SOURCE)
        .await
        .expect("query")
        .expect("status exists")
}

#[tokio::test]
async fn test_first_poll_runs_every_category() {
    let launcher = FakeLauncher::default();
    let (db, supervisor) = setup(launcher.clone()).await;

    let CycleOutcome::Completed(summary) = supervisor.poll_once().await.expect("cycle") else {
        panic!("expected a completed run");
    };

    assert_eq!(summary.cause, RunCause::FirstRun);
    assert_eq!(summary.mode, SyncMode::Normal);
    assert_eq!(summary.categories.len(), 2);
    assert_eq!(summary.total_new(), 12);
    assert!(summary
        .categories
        .iter()
        .all(|c| c.stop_reason == StopReason::EmptyPage));
    assert_eq!(import_records::count(db.pool(), Some(SOURCE)).await.expect("count"), 12);

    let record = status(&db).await;
    assert_eq!(record.status, CrawlState::Idle);
    assert!(record.last_run_finished_at.is_some());
    assert!(record.logs.starts_with("Run started at "));
    assert!(record.logs.contains("DJs page 1: 3 new (3 total)"));
    assert!(record.logs.contains("Finished DJs: 6 new, 0 known over 3 pages (empty page)"));
    assert!(record.logs.contains("Finished Fotografen: 6 new, 0 known over 3 pages (empty page)"));
    assert!(record.logs.contains("Run complete: 12 new listings in 2 categories"));

    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_second_run_without_trigger() {
    let launcher = FakeLauncher::default();
    let (_db, supervisor) = setup(launcher.clone()).await;

    supervisor.poll_once().await.expect("first cycle");
    let outcome = supervisor.poll_once().await.expect("second cycle");

    assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::NotTriggered));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_trigger_runs_selected_category_in_deep_mode() {
    let (db, supervisor) = setup(FakeLauncher::default()).await;
    supervisor.poll_once().await.expect("first cycle");

    crawl_status::request_run(
        db.pool(),
        SOURCE,
        &TargetCategory::Specific("fotografen".to_string()),
        true,
    )
    .await
    .expect("trigger");

    let CycleOutcome::Completed(summary) = supervisor.poll_once().await.expect("cycle") else {
        panic!("expected a completed run");
    };
    assert_eq!(summary.cause, RunCause::Triggered);
    assert_eq!(summary.mode, SyncMode::Deep);
    assert_eq!(summary.categories.len(), 1);
    assert_eq!(summary.categories[0].category, "fotografen");
    // everything is known: nothing new is inserted on a re-crawl
    assert_eq!(summary.total_new(), 0);

    let record = status(&db).await;
    assert!(!record.is_deep_sync);
    assert_eq!(record.status, CrawlState::Idle);
}

#[tokio::test]
async fn test_stuck_run_is_taken_over() {
    let launcher = FakeLauncher::default();
    let (db, supervisor) = setup(launcher.clone()).await;
    crawl_status::get_or_create(db.pool(), SOURCE).await.expect("create");

    let four_hours_ago = (Utc::now() - ChronoDuration::hours(4)).to_rfc3339();
    sqlx::query("UPDATE crawl_status SET status = 'running', last_run_started_at = ? WHERE source = ?")
        .bind(&four_hours_ago)
        .bind(SOURCE)
        .execute(db.pool())
        .await
        .expect("mark stuck");

    let CycleOutcome::Completed(summary) = supervisor.poll_once().await.expect("cycle") else {
        panic!("expected takeover");
    };
    assert_eq!(summary.cause, RunCause::StuckTakeover);
    assert_eq!(status(&db).await.status, CrawlState::Idle);
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_healthy_run_is_not_interrupted() {
    let launcher = FakeLauncher::default();
    let (db, supervisor) = setup(launcher.clone()).await;
    crawl_status::get_or_create(db.pool(), SOURCE).await.expect("create");

    let an_hour_ago = (Utc::now() - ChronoDuration::hours(1)).to_rfc3339();
    sqlx::query("UPDATE crawl_status SET status = 'running', last_run_started_at = ? WHERE source = ?")
        .bind(&an_hour_ago)
        .bind(SOURCE)
        .execute(db.pool())
        .await
        .expect("mark running");
    crawl_status::request_run(db.pool(), SOURCE, &TargetCategory::All, false)
        .await
        .expect("trigger");

    let outcome = supervisor.poll_once().await.expect("cycle");
    assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::AlreadyRunning));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_category_is_recorded_as_error() {
    let launcher = FakeLauncher::default();
    let (db, supervisor) = setup(launcher.clone()).await;
    crawl_status::request_run(
        db.pool(),
        SOURCE,
        &TargetCategory::Specific("zauberer".to_string()),
        false,
    )
    .await
    .expect("trigger");

    let wait = supervisor.cycle().await;

    assert_eq!(wait, Duration::from_secs(60));
    assert_eq!(launcher.launches.load(Ordering::SeqCst), 0);
    let record = status(&db).await;
    assert_eq!(record.status, CrawlState::Error);
    assert_eq!(
        record.last_error.as_deref(),
        Some("unknown target category 'zauberer'")
    );
}

#[tokio::test]
async fn test_unknown_category_error_type() {
    let (db, supervisor) = setup(FakeLauncher::default()).await;
    crawl_status::request_run(
        db.pool(),
        SOURCE,
        &TargetCategory::Specific("zauberer".to_string()),
        false,
    )
    .await
    .expect("trigger");

    let err = supervisor.poll_once().await.expect_err("unknown category");
    assert!(matches!(err, SupervisorError::UnknownCategory(s) if s == "zauberer"));
}

#[tokio::test]
async fn test_cycle_records_error_and_cools_down() {
    let launcher = FakeLauncher {
        fail: true,
        ..FakeLauncher::default()
    };
    let (db, supervisor) = setup(launcher).await;

    let wait = supervisor.cycle().await;

    assert_eq!(wait, Duration::from_secs(60));
    let record = status(&db).await;
    assert_eq!(record.status, CrawlState::Error);
    assert!(record
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("no chrome binary")));
    assert!(record.logs.contains("ERROR: browser session failed"));

    // no retry until the operator triggers again
    assert_eq!(supervisor.cycle().await, Duration::from_secs(30));
}
