//! Harvest Crawler - directory crawling and listing ingestion.
//!
//! One category at a time, the [`CategoryCrawler`] drives a [`PageFetcher`]
//! across the category's pages, extracts listings with the
//! [`ListingExtractor`], resolves their locations with the [`CityResolver`]
//! and stores them through the [`ImportWriter`]. The
//! [`PaginationTracker`] decides after each page whether to continue.
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_crawler::{CategoryCrawler, PageFetcher, SyncMode};
//!
//! let mut fetcher = PageFetcher::new(session, urls.clone());
//! for mapping in &source.categories {
//!     let report = crawler.crawl(&mut fetcher, mapping, SyncMode::Normal).await;
//!     println!("{report}");
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod city_resolver;
pub mod controller;
pub mod error;
pub mod fetcher;
pub mod listing;
pub mod pacing;
pub mod parser;
pub mod progress;
pub mod stop_policy;
pub mod url_builder;
pub mod writer;

// Re-export commonly used types
pub use city_resolver::{CityResolver, Disposition, MatchMethod};
pub use controller::{CategoryCrawler, CategoryReport};
pub use error::{CrawlError, Result};
pub use fetcher::{FetchOutcome, FetchedPage, PageFetcher};
pub use listing::{ListingOrigin, RawListing};
pub use pacing::Pacer;
pub use parser::{merge_listings, ListingExtractor};
pub use progress::{ProgressReporter, StatusLogReporter};
pub use stop_policy::{Decision, PageObservation, PaginationTracker, StopReason, SyncMode};
pub use url_builder::PageUrls;
pub use writer::ImportWriter;
