use feedsync::sync::{ProgressCallback, SyncProgress};

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    /// Convert to a `ProgressCallback` for the poller.
    pub fn into_callback(self) -> ProgressCallback {
        Box::new(move |event| self.handle(event))
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::RunStarted {
                page_size,
                page_limit,
            } => {
                tracing::info!(page_size, page_limit, "Starting feed run");
            }

            SyncProgress::FetchedPage {
                page,
                count,
                num_pages,
                empty_streak,
            } => {
                if count == 0 {
                    tracing::info!(page, num_pages, empty_streak, "Fetched empty page");
                } else {
                    tracing::debug!(page, count, num_pages, "Fetched page");
                }
            }

            SyncProgress::ItemRejected { page, reason } => {
                tracing::warn!(page, reason = %reason, "Dropped feed item");
            }

            SyncProgress::DuplicateSkipped { page, external_id } => {
                tracing::debug!(page, external_id, "Skipped duplicate item");
            }

            SyncProgress::BatchPersisted {
                page,
                submitted,
                changed,
            } => {
                tracing::info!(page, submitted, changed, "Saved page");
            }

            SyncProgress::BatchFailed { page, error } => {
                tracing::error!(page, error = %error, "Failed to save page");
            }

            SyncProgress::RunComplete { summary, stop } => {
                tracing::info!(
                    pages = summary.pages,
                    items = summary.items,
                    changed = summary.changed,
                    duplicates = summary.duplicates,
                    invalid = summary.invalid,
                    "Run complete: {stop}"
                );
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
