//! Sync options, limits, and run summaries.

use std::fmt;
use std::time::Duration;

/// Hard ceiling on pages fetched in one run, whatever the feed reports.
pub const ABSOLUTE_MAX_PAGES: u32 = 5000;

/// Consecutive empty pages after which a run treats the feed as exhausted.
pub const EMPTY_PAGE_LIMIT: u32 = 3;

/// Default page size requested from the feed.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Default period between scheduled polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Default upper bound on a single scheduled poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(25 * 60);

/// Shortest tick period the scheduler will run with.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Options for one paginated run.
#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// Items requested per page.
    pub page_size: u32,
    /// Pages per run. `None` means unlimited up to [`ABSOLUTE_MAX_PAGES`].
    ///
    /// Checked after each page, so `Some(0)` still fetches page 0.
    pub max_pages: Option<u32>,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_pages: None,
        }
    }
}

impl PollerOptions {
    /// Build from signed settings where any negative limit means unlimited.
    pub fn from_limits(page_size: u32, max_pages: i64) -> Self {
        Self {
            page_size,
            max_pages: u32::try_from(max_pages).ok(),
        }
    }
}

/// Options for the continuous scheduler.
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Period between ticks.
    pub interval: Duration,
    /// Upper bound on one poll; an overrunning poll is abandoned.
    pub poll_timeout: Duration,
    /// Stop after this many polls. `None` runs until cancelled.
    pub max_polls: Option<u64>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            max_polls: None,
        }
    }
}

impl SchedulerOptions {
    /// Build from a signed poll limit where zero or negative means unlimited.
    pub fn with_poll_limit(mut self, max_polls: i64) -> Self {
        self.max_polls = u64::try_from(max_polls).ok().filter(|n| *n > 0);
        self
    }

    /// Tick period actually used, never below [`MIN_POLL_INTERVAL`].
    pub fn effective_interval(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }
}

/// Why a paginated run ended. Every variant is a successful completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStop {
    /// [`EMPTY_PAGE_LIMIT`] consecutive pages had no content.
    EmptyPages,
    /// The configured page limit was reached.
    PageLimit { limit: u32 },
    /// The page index reached the feed-reported page count.
    LastPage { num_pages: u32 },
    /// [`ABSOLUTE_MAX_PAGES`] was reached.
    AbsoluteCeiling,
}

impl fmt::Display for RunStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStop::EmptyPages => write!(f, "no content for {EMPTY_PAGE_LIMIT} pages"),
            RunStop::PageLimit { limit } => write!(f, "reached configured page limit {limit}"),
            RunStop::LastPage { num_pages } => write!(f, "reached reported last page {num_pages}"),
            RunStop::AbsoluteCeiling => {
                write!(f, "safety stop: {ABSOLUTE_MAX_PAGES} pages scanned")
            }
        }
    }
}

/// Outcome of one paginated run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Pages fetched, including empty ones.
    pub pages: u32,
    /// Entries the feed returned across all pages.
    pub items: usize,
    /// Entries dropped because their `external_id` was already seen this run.
    pub duplicates: usize,
    /// Entries dropped as undecodable or without a usable id.
    pub invalid: usize,
    /// Records handed to the merge repository.
    pub submitted: usize,
    /// Records the repository created or changed.
    pub changed: u64,
    /// Pages whose batch failed wholly or partially.
    pub batch_failures: usize,
    /// `None` only while the run is in progress.
    pub stop: Option<RunStop>,
}

/// Why the continuous scheduler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cancellation token fired.
    Cancelled,
    /// The configured poll limit was reached.
    MaxPollsReached { polls: u64 },
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::MaxPollsReached { polls } => {
                write!(f, "stopping after {polls} polls (max reached)")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_page_limit_means_unlimited() {
        assert_eq!(PollerOptions::from_limits(20, -1).max_pages, None);
        assert_eq!(PollerOptions::from_limits(20, 0).max_pages, Some(0));
        assert_eq!(PollerOptions::from_limits(20, 7).max_pages, Some(7));
    }

    #[test]
    fn zero_interval_is_raised_to_the_minimum() {
        let mut options = SchedulerOptions::default();
        assert_eq!(options.effective_interval(), DEFAULT_POLL_INTERVAL);

        options.interval = Duration::ZERO;
        assert_eq!(options.effective_interval(), MIN_POLL_INTERVAL);
    }

    #[test]
    fn non_positive_poll_limit_means_unlimited() {
        let base = SchedulerOptions::default();
        assert_eq!(base.clone().with_poll_limit(-1).max_polls, None);
        assert_eq!(base.clone().with_poll_limit(0).max_polls, None);
        assert_eq!(base.with_poll_limit(2).max_polls, Some(2));
    }

    #[test]
    fn defaults_match_documented_values() {
        let poller = PollerOptions::default();
        assert_eq!(poller.page_size, 20);
        assert_eq!(poller.max_pages, None);

        let scheduler = SchedulerOptions::default();
        assert_eq!(scheduler.interval, Duration::from_secs(1));
        assert_eq!(scheduler.poll_timeout, Duration::from_secs(1500));
        assert_eq!(scheduler.max_polls, None);
    }

    #[test]
    fn stop_reasons_render_for_logs() {
        assert_eq!(RunStop::EmptyPages.to_string(), "no content for 3 pages");
        assert_eq!(
            RunStop::PageLimit { limit: 4 }.to_string(),
            "reached configured page limit 4"
        );
        assert_eq!(
            StopReason::MaxPollsReached { polls: 2 }.to_string(),
            "stopping after 2 polls (max reached)"
        );
    }
}
