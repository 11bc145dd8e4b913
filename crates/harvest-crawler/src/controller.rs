//! Category Crawl Controller.
//!
//! Walks the pages of one category in order:
//!
//! ```text
//! Fetching -> Extracting -> Processing -> Deciding -> (Fetching | Stopped)
//! ```
//!
//! Every page is resolved and written before the stopping protocol runs, and
//! a progress line is reported after every page. Failures below this level
//! end the category with a [`StopReason`] instead of an error.

use crate::city_resolver::CityResolver;
use crate::fetcher::{FetchOutcome, FetchedPage, PageFetcher};
use crate::listing::RawListing;
use crate::pacing::Pacer;
use crate::parser::ListingExtractor;
use crate::progress::ProgressReporter;
use crate::stop_policy::{Decision, PageObservation, PaginationTracker, StopReason, SyncMode};
use crate::writer::ImportWriter;
use harvest_browser::BrowserActions;
use harvest_core::{CategoryMapping, CrawlPolicy};
use std::fmt;
use std::sync::Arc;

/// Outcome of crawling one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReport {
    pub category: String,
    pub category_id: String,
    /// Pages whose listings were processed
    pub pages: u32,
    pub listings_seen: usize,
    pub new_listings: usize,
    /// Already stored, or not stored because of a write failure
    pub known_listings: usize,
    pub stop_reason: StopReason,
}

impl fmt::Display for CategoryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} pages, {} new, {} known, stopped on {}",
            self.category, self.pages, self.new_listings, self.known_listings, self.stop_reason
        )
    }
}

#[derive(Debug)]
enum Step {
    Fetching,
    Extracting(FetchedPage),
    Processing(Vec<RawListing>),
    Deciding(PageObservation),
    Stopped(StopReason),
}

/// Tally for one page.
#[derive(Debug, Default)]
struct PageTally {
    new: usize,
    known: usize,
}

/// Crawls categories one at a time with shared extraction, resolution and
/// persistence components.
pub struct CategoryCrawler {
    extractor: ListingExtractor,
    resolver: CityResolver,
    writer: ImportWriter,
    pacer: Pacer,
    policy: CrawlPolicy,
    progress: Arc<dyn ProgressReporter>,
}

impl CategoryCrawler {
    pub fn new(
        extractor: ListingExtractor,
        resolver: CityResolver,
        writer: ImportWriter,
        pacer: Pacer,
        policy: CrawlPolicy,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            extractor,
            resolver,
            writer,
            pacer,
            policy,
            progress,
        }
    }

    pub async fn crawl<B: BrowserActions>(
        &self,
        fetcher: &mut PageFetcher<B>,
        mapping: &CategoryMapping,
        mode: SyncMode,
    ) -> CategoryReport {
        tracing::info!("Crawling category {} ({} mode)", mapping.display_name(), mode);
        fetcher.begin_category();

        let mut tracker = PaginationTracker::new(self.policy.clone(), mode);
        let mut report = CategoryReport {
            category: mapping.normalized_path().to_string(),
            category_id: mapping.category_id.clone(),
            pages: 0,
            listings_seen: 0,
            new_listings: 0,
            known_listings: 0,
            stop_reason: StopReason::EndOfPagination,
        };
        let mut page: u32 = 1;
        let mut step = Step::Fetching;

        loop {
            step = match step {
                Step::Fetching => match fetcher.fetch(mapping, page).await {
                    Ok(FetchOutcome::Loaded(loaded)) => Step::Extracting(loaded),
                    Ok(FetchOutcome::NotFound) => {
                        tracing::debug!("{} page {} not found", mapping.display_name(), page);
                        Step::Stopped(StopReason::EndOfPagination)
                    }
                    Err(e) => {
                        if e.is_transient() {
                            tracing::warn!(
                                "Fetching {} page {} failed, retrying next run: {}",
                                mapping.display_name(),
                                page,
                                e
                            );
                        } else {
                            tracing::error!(
                                "Fetching {} page {} failed: {}",
                                mapping.display_name(),
                                page,
                                e
                            );
                        }
                        self.progress
                            .report(&format!(
                                "{} page {}: fetch failed ({})",
                                mapping.display_name(),
                                page,
                                e
                            ))
                            .await;
                        Step::Stopped(StopReason::FetchFailed(e.to_string()))
                    }
                },

                Step::Extracting(loaded) => {
                    Step::Processing(self.extractor.extract(&loaded.html, &loaded.url, mapping))
                }

                Step::Processing(listings) => {
                    let tally = self.process_page(&listings, mapping).await;
                    report.pages = page;
                    report.listings_seen += listings.len();
                    report.new_listings += tally.new;
                    report.known_listings += tally.known;

                    self.progress
                        .report(&format!(
                            "{} page {}: {} new ({} total)",
                            mapping.display_name(),
                            page,
                            tally.new,
                            report.new_listings
                        ))
                        .await;

                    Step::Deciding(PageObservation {
                        page,
                        first_slug: listings.first().map(RawListing::dedup_key),
                        item_count: listings.len(),
                        new_count: tally.new,
                    })
                }

                Step::Deciding(observation) => match tracker.observe(&observation) {
                    Decision::Continue => {
                        page += 1;
                        Step::Fetching
                    }
                    Decision::Stop(reason) => Step::Stopped(reason),
                },

                Step::Stopped(reason) => {
                    report.stop_reason = reason;
                    break;
                }
            };
        }

        tracing::info!("{}", report);
        report
    }

    async fn process_page(&self, listings: &[RawListing], mapping: &CategoryMapping) -> PageTally {
        let mut tally = PageTally::default();

        for listing in listings {
            let disposition = self.resolver.classify(&listing.location);
            let inserted = self
                .writer
                .log_import(
                    listing,
                    &mapping.category_id,
                    disposition.status,
                    disposition.rejection_reason.as_deref(),
                    disposition.city_id,
                )
                .await;

            if inserted {
                tracing::debug!(
                    "New listing {} ({}) city={:?} via {:?}",
                    listing.name,
                    listing.source_url,
                    disposition.city_id,
                    disposition.method
                );
                tally.new += 1;
                self.pacer.after_new_listing().await;
            } else {
                tally.known += 1;
            }
        }

        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_display() {
        let report = CategoryReport {
            category: "dj".to_string(),
            category_id: "music".to_string(),
            pages: 3,
            listings_seen: 60,
            new_listings: 12,
            known_listings: 48,
            stop_reason: StopReason::NoNewListings,
        };
        assert_eq!(
            report.to_string(),
            "dj: 3 pages, 12 new, 48 known, stopped on no new listings"
        );
    }
}
