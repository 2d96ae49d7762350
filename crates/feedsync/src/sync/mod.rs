//! Feed synchronization: the paginated poller and its continuous scheduler.
//!
//! # Module Structure
//!
//! - [`types`] - Options, limits, `RunSummary`, `StopReason`
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`poller`] - One paginated pass: `Poller::run_once()`
//! - [`scheduler`] - Timer loop with poll limit and cancellation: `Scheduler::run()`
//!
//! # Example
//!
//! ```ignore
//! use feedsync::feed::HttpFeedClient;
//! use feedsync::sync::{Poller, PollerOptions, Scheduler, SchedulerOptions};
//!
//! let client = HttpFeedClient::new(feed_url, Duration::from_secs(10))?;
//! let poller = Poller::new(client, db, PollerOptions::default());
//! let reason = Scheduler::new(poller, SchedulerOptions::default())
//!     .run(cancel.child_token())
//!     .await;
//! ```

pub mod poller;
mod progress;
pub mod scheduler;
mod types;

pub use poller::{PollTask, Poller};
pub use scheduler::Scheduler;

// Re-export types
pub use types::{PollerOptions, RunStop, RunSummary, SchedulerOptions, StopReason};

// Re-export constants
pub use types::{
    ABSOLUTE_MAX_PAGES, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL, DEFAULT_POLL_TIMEOUT,
    EMPTY_PAGE_LIMIT, MIN_POLL_INTERVAL,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};
