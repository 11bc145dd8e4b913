//! The crawl supervisor.
//!
//! Polls the status record forever. Each cycle evaluates the trigger, claims
//! the run with a compare-and-swap update, crawls the selected categories
//! through one browser session and finishes the record. Any failure moves
//! the record to `error` and the next poll waits out the cooldown.

use crate::error::Result;
use crate::plan::select_categories;
use crate::trigger::{evaluate_trigger, RunCause, RunDecision, SkipReason, TriggerPolicy, TriggerView};
use chrono::Utc;
use harvest_browser::{BrowserActions, SessionLauncher};
use harvest_core::{AppConfig, CategoryMapping, CrawlPolicy, SourceConfig, SupervisorConfig};
use harvest_crawler::{
    CategoryCrawler, CategoryReport, CityResolver, ImportWriter, ListingExtractor, Pacer,
    PageFetcher, PageUrls, ProgressReporter, StatusLogReporter, SyncMode,
};
use harvest_db::{cities, crawl_status, CrawlStatus, Database};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub cause: RunCause,
    pub mode: SyncMode,
    pub categories: Vec<CategoryReport>,
}

impl RunSummary {
    pub fn total_new(&self) -> usize {
        self.categories.iter().map(|c| c.new_listings).sum()
    }

    pub fn total_pages(&self) -> u32 {
        self.categories.iter().map(|c| c.pages).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    /// Another supervisor changed the record between read and claim
    ClaimLost,
    Completed(RunSummary),
}

pub struct Supervisor<L> {
    db: Database,
    launcher: L,
    source: SourceConfig,
    policy: CrawlPolicy,
    settings: SupervisorConfig,
    pacer: Pacer,
}

impl<L: SessionLauncher> Supervisor<L> {
    pub fn new(db: Database, launcher: L, config: &AppConfig) -> Self {
        Self {
            db,
            launcher,
            source: config.source.clone(),
            policy: config.crawl.clone(),
            settings: config.supervisor.clone(),
            pacer: Pacer::from_policy(&config.crawl),
        }
    }

    /// Replace the pacing derived from the crawl policy.
    #[must_use]
    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    /// Poll forever. Never returns.
    pub async fn run_forever(&self) {
        tracing::info!(
            "Supervisor started for {} (poll every {:?})",
            self.source.name,
            self.settings.poll_interval()
        );
        loop {
            let wait = self.cycle().await;
            tokio::time::sleep(wait).await;
        }
    }

    /// Run one poll and return how long to wait before the next one.
    ///
    /// Errors are recorded into the status record and answered with the
    /// error cooldown.
    pub async fn cycle(&self) -> Duration {
        match self.poll_once().await {
            Ok(CycleOutcome::Completed(summary)) => {
                tracing::info!(
                    "Run finished: {} new listings over {} pages in {} categories",
                    summary.total_new(),
                    summary.total_pages(),
                    summary.categories.len()
                );
                self.settings.poll_interval()
            }
            Ok(CycleOutcome::Skipped(reason)) => {
                tracing::debug!("Skipping cycle: {}", reason);
                self.settings.poll_interval()
            }
            Ok(CycleOutcome::ClaimLost) => self.settings.poll_interval(),
            Err(e) => {
                tracing::error!("Crawl cycle failed: {}", e);
                if let Err(db_err) =
                    crawl_status::record_error(self.db.pool(), &self.source.name, &e.to_string()).await
                {
                    tracing::error!("Could not record crawl error: {}", db_err);
                }
                self.settings.error_cooldown()
            }
        }
    }

    /// Evaluate the trigger and, if due, execute one complete run.
    pub async fn poll_once(&self) -> Result<CycleOutcome> {
        let pool = self.db.pool();
        let record = crawl_status::get_or_create(pool, &self.source.name).await?;

        let cause = match evaluate_trigger(
            &TriggerView::from(&record),
            Utc::now(),
            &TriggerPolicy::from_config(&self.settings),
        ) {
            RunDecision::Skip(reason) => return Ok(CycleOutcome::Skipped(reason)),
            RunDecision::Start(cause) => cause,
        };

        if cause == RunCause::StuckTakeover {
            tracing::warn!(
                "Taking over run started at {:?} that never finished",
                record.last_run_started_at
            );
        }

        if !crawl_status::try_claim(pool, &record, Utc::now()).await? {
            tracing::info!("Run for {} was claimed elsewhere", self.source.name);
            return Ok(CycleOutcome::ClaimLost);
        }
        tracing::info!("Starting crawl of {} ({})", self.source.name, cause);

        let summary = self.execute(&record, cause).await?;
        crawl_status::finish_run(pool, &self.source.name).await?;
        Ok(CycleOutcome::Completed(summary))
    }

    async fn execute(&self, record: &CrawlStatus, cause: RunCause) -> Result<RunSummary> {
        let pool = self.db.pool();
        let mode = SyncMode::from_deep_flag(record.is_deep_sync);
        let categories =
            select_categories(&self.source.name, &self.source.categories, &record.target_category)?;

        let resolver = CityResolver::new(
            &cities::load_cities(pool).await?,
            &cities::load_aliases(pool).await?,
            &self.source.unregioned_label,
        );
        tracing::info!("Loaded {} cities for resolution", resolver.city_count());

        let urls = PageUrls::new(&self.source)?;
        let progress: Arc<dyn ProgressReporter> =
            Arc::new(StatusLogReporter::new(pool.clone(), self.source.name.clone()));
        let crawler = CategoryCrawler::new(
            ListingExtractor::new(self.source.clone(), urls.clone()),
            resolver,
            ImportWriter::new(pool.clone(), self.source.name.clone()),
            self.pacer.clone(),
            self.policy.clone(),
            Arc::clone(&progress),
        );

        let session = self.launcher.launch().await?;
        let mut fetcher = PageFetcher::new(session, urls);
        let reports = self
            .crawl_categories(&crawler, &mut fetcher, &categories, mode, progress.as_ref())
            .await;

        let mut session = fetcher.into_inner();
        if let Err(e) = session.close().await {
            tracing::warn!("Browser session did not close cleanly: {}", e);
        }

        let summary = RunSummary {
            cause,
            mode,
            categories: reports,
        };
        progress
            .report(&format!(
                "Run complete: {} new listings in {} categories",
                summary.total_new(),
                summary.categories.len()
            ))
            .await;
        Ok(summary)
    }

    async fn crawl_categories(
        &self,
        crawler: &CategoryCrawler,
        fetcher: &mut PageFetcher<L::Session>,
        categories: &[CategoryMapping],
        mode: SyncMode,
        progress: &dyn ProgressReporter,
    ) -> Vec<CategoryReport> {
        let mut reports = Vec::with_capacity(categories.len());

        for (i, mapping) in categories.iter().enumerate() {
            let report = crawler.crawl(fetcher, mapping, mode).await;
            progress
                .report(&format!(
                    "Finished {}: {} new, {} known over {} pages ({})",
                    mapping.display_name(),
                    report.new_listings,
                    report.known_listings,
                    report.pages,
                    report.stop_reason
                ))
                .await;
            reports.push(report);

            if i + 1 < categories.len() {
                self.pacer.between_categories().await;
            }
        }

        reports
    }
}
