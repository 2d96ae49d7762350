//! Progress reporting types for sync runs.
//!
//! The poller narrates each run through [`SyncProgress`] events so callers (the CLI
//! reporter, tests) can observe it without scraping logs.

use super::types::{RunStop, RunSummary};

/// Progress events emitted during a paginated run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A run is starting.
    RunStarted {
        /// Items requested per page.
        page_size: u32,
        /// Effective page ceiling for this run.
        page_limit: u32,
    },

    /// Fetched a page.
    FetchedPage {
        /// Page number (0-indexed).
        page: u32,
        /// Entries on the page, decodable or not.
        count: usize,
        /// Page count reported by the feed.
        num_pages: u32,
        /// Consecutive empty pages so far.
        empty_streak: u32,
    },

    /// An item was dropped before mapping.
    ItemRejected {
        page: u32,
        /// Why it was dropped.
        reason: String,
    },

    /// An item repeated an `external_id` already seen this run.
    DuplicateSkipped { page: u32, external_id: i64 },

    /// A page's batch was merged.
    BatchPersisted {
        page: u32,
        /// Records submitted.
        submitted: usize,
        /// Records created or changed.
        changed: u64,
    },

    /// A page's batch failed wholly or partially.
    BatchFailed {
        page: u32,
        /// Error message.
        error: String,
    },

    /// The run finished successfully.
    RunComplete {
        /// Totals for the run.
        summary: RunSummary,
        stop: RunStop,
    },
}

/// Callback for progress updates during sync runs.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
