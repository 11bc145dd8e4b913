//! Pagination stopping protocol.
//!
//! Evaluated after every page, first matching rule wins:
//!
//! 1. the page opens with the same listing as the previous page
//! 2. the page is empty
//! 3. normal mode: too many consecutive pages without new listings
//! 4. deep mode: the trailing window's new-listing sum fell below the threshold
//! 5. the category has produced nothing new for too many pages, in any mode
//! 6. the page ceiling was reached

use harvest_core::CrawlPolicy;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Normal,
    Deep,
}

impl SyncMode {
    pub fn from_deep_flag(deep: bool) -> Self {
        if deep {
            Self::Deep
        } else {
            Self::Normal
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => f.write_str("normal"),
            Self::Deep => f.write_str("deep"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    DuplicateContent,
    EmptyPage,
    NoNewListings,
    DeepWindowExhausted,
    NothingNewAtAll,
    PageCeiling,
    /// Not found on both pagination schemes
    EndOfPagination,
    /// Transient fetch failure; the category is abandoned for this run
    FetchFailed(String),
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateContent => f.write_str("duplicate content"),
            Self::EmptyPage => f.write_str("empty page"),
            Self::NoNewListings => f.write_str("no new listings"),
            Self::DeepWindowExhausted => f.write_str("deep window exhausted"),
            Self::NothingNewAtAll => f.write_str("nothing new in category"),
            Self::PageCeiling => f.write_str("page ceiling"),
            Self::EndOfPagination => f.write_str("end of pagination"),
            Self::FetchFailed(e) => write!(f, "fetch failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Stop(StopReason),
}

/// What the controller saw on one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageObservation {
    pub page: u32,
    pub first_slug: Option<String>,
    pub item_count: usize,
    pub new_count: usize,
}

/// Per-category stopping state.
#[derive(Debug)]
pub struct PaginationTracker {
    policy: CrawlPolicy,
    mode: SyncMode,
    previous_first_slug: Option<String>,
    zero_new_streak: u32,
    window: VecDeque<usize>,
    total_new: usize,
    pages_seen: u32,
}

impl PaginationTracker {
    pub fn new(policy: CrawlPolicy, mode: SyncMode) -> Self {
        Self {
            window: VecDeque::with_capacity(policy.deep_window),
            policy,
            mode,
            previous_first_slug: None,
            zero_new_streak: 0,
            total_new: 0,
            pages_seen: 0,
        }
    }

    pub fn observe(&mut self, obs: &PageObservation) -> Decision {
        self.pages_seen += 1;
        self.total_new += obs.new_count;
        if obs.new_count == 0 {
            self.zero_new_streak += 1;
        } else {
            self.zero_new_streak = 0;
        }
        self.window.push_back(obs.new_count);
        while self.window.len() > self.policy.deep_window.max(1) {
            self.window.pop_front();
        }

        let previous = std::mem::replace(&mut self.previous_first_slug, obs.first_slug.clone());
        if let (Some(prev), Some(first)) = (previous.as_deref(), obs.first_slug.as_deref()) {
            if prev.eq_ignore_ascii_case(first) {
                return Decision::Stop(StopReason::DuplicateContent);
            }
        }

        if obs.item_count == 0 {
            return Decision::Stop(StopReason::EmptyPage);
        }

        match self.mode {
            SyncMode::Normal if self.zero_new_streak >= self.policy.normal_zero_new_pages => {
                return Decision::Stop(StopReason::NoNewListings);
            }
            SyncMode::Deep
                if self.window.len() >= self.policy.deep_window
                    && self.window.iter().sum::<usize>() < self.policy.deep_min_new =>
            {
                return Decision::Stop(StopReason::DeepWindowExhausted);
            }
            _ => {}
        }

        if self.pages_seen >= self.policy.safety_zero_pages && self.total_new == 0 {
            return Decision::Stop(StopReason::NothingNewAtAll);
        }

        if obs.page >= self.policy.max_pages {
            return Decision::Stop(StopReason::PageCeiling);
        }

        Decision::Continue
    }
}
