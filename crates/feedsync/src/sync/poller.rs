//! The feed poller: one paginated pass over the feed per run.

use std::collections::HashSet;

use async_trait::async_trait;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{
    ABSOLUTE_MAX_PAGES, EMPTY_PAGE_LIMIT, PollerOptions, RunStop, RunSummary,
};
use crate::feed::{FeedClient, FeedError, FeedPage, map_item, validate_item};
use crate::record::ContentRecord;
use crate::repository::{MergeStore, RepositoryError};

/// One unit of scheduled work.
#[async_trait]
pub trait PollTask: Send + Sync {
    async fn poll(&self) -> Result<RunSummary, FeedError>;
}

/// Drives pagination against a [`FeedClient`] and merges every page into a
/// [`MergeStore`].
pub struct Poller<C, S> {
    client: C,
    store: S,
    options: PollerOptions,
    on_progress: Option<ProgressCallback>,
}

impl<C: FeedClient, S: MergeStore> Poller<C, S> {
    pub fn new(client: C, store: S, options: PollerOptions) -> Self {
        Self {
            client,
            store,
            options,
            on_progress: None,
        }
    }

    /// Report run progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    /// Effective page ceiling for a run.
    pub fn page_limit(&self) -> u32 {
        self.options
            .max_pages
            .map_or(ABSOLUTE_MAX_PAGES, |max| max.min(ABSOLUTE_MAX_PAGES))
    }

    /// Fetch pages from 0 upward, merging each, until a stop condition holds.
    ///
    /// # Errors
    /// Only a failed page fetch aborts the run. Persistence failures are logged,
    /// counted in [`RunSummary::batch_failures`], and the run continues.
    pub async fn run_once(&self) -> Result<RunSummary, FeedError> {
        let on_progress = self.on_progress.as_ref();
        let page_size = self.options.page_size;
        let mut summary = RunSummary::default();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut empty_streak = 0u32;
        let mut page = 0u32;

        emit(
            on_progress,
            SyncProgress::RunStarted {
                page_size,
                page_limit: self.page_limit(),
            },
        );

        let stop = loop {
            let fetched = self.client.fetch_page(page, page_size).await?;
            let num_pages = fetched.info.num_pages;
            summary.pages += 1;
            summary.items += fetched.len();

            if fetched.is_empty() {
                empty_streak += 1;
            } else {
                empty_streak = 0;
            }

            emit(
                on_progress,
                SyncProgress::FetchedPage {
                    page,
                    count: fetched.len(),
                    num_pages,
                    empty_streak,
                },
            );

            if empty_streak >= EMPTY_PAGE_LIMIT {
                break RunStop::EmptyPages;
            }

            let records = self.collect_records(page, fetched, &mut seen, &mut summary);
            if !records.is_empty() {
                self.persist(page, records, &mut summary).await;
            }

            page += 1;

            if page >= ABSOLUTE_MAX_PAGES {
                break RunStop::AbsoluteCeiling;
            }
            if let Some(limit) = self.options.max_pages
                && page >= limit
            {
                break RunStop::PageLimit { limit };
            }
            if page >= num_pages {
                break RunStop::LastPage { num_pages };
            }
        };

        tracing::info!(
            pages = summary.pages,
            items = summary.items,
            changed = summary.changed,
            duplicates = summary.duplicates,
            invalid = summary.invalid,
            batch_failures = summary.batch_failures,
            "{stop}, stopping"
        );
        summary.stop = Some(stop);
        emit(
            on_progress,
            SyncProgress::RunComplete {
                summary: summary.clone(),
                stop,
            },
        );
        Ok(summary)
    }

    /// Validate, dedup, and map one page's items.
    fn collect_records(
        &self,
        page: u32,
        fetched: FeedPage,
        seen: &mut HashSet<i64>,
        summary: &mut RunSummary,
    ) -> Vec<ContentRecord> {
        let on_progress = self.on_progress.as_ref();

        for rejected in fetched.rejected {
            summary.invalid += 1;
            tracing::warn!(page, reason = %rejected, "dropping feed item");
            emit(
                on_progress,
                SyncProgress::ItemRejected {
                    page,
                    reason: rejected.to_string(),
                },
            );
        }

        let mut records = Vec::with_capacity(fetched.items.len());
        for item in &fetched.items {
            let external_id = match validate_item(item) {
                Ok(id) => id,
                Err(rejected) => {
                    summary.invalid += 1;
                    tracing::warn!(page, reason = %rejected, "dropping feed item");
                    emit(
                        on_progress,
                        SyncProgress::ItemRejected {
                            page,
                            reason: rejected.to_string(),
                        },
                    );
                    continue;
                }
            };

            if !seen.insert(external_id) {
                summary.duplicates += 1;
                tracing::debug!(page, external_id, "skipping item already seen this run");
                emit(
                    on_progress,
                    SyncProgress::DuplicateSkipped { page, external_id },
                );
                continue;
            }

            records.push(map_item(item));
        }
        records
    }

    async fn persist(&self, page: u32, records: Vec<ContentRecord>, summary: &mut RunSummary) {
        let submitted = records.len();
        summary.submitted += submitted;

        match self.store.upsert_batch(records).await {
            Ok(changed) => {
                summary.changed += changed;
                tracing::debug!(page, submitted, changed, "page merged");
                emit(
                    self.on_progress.as_ref(),
                    SyncProgress::BatchPersisted {
                        page,
                        submitted,
                        changed,
                    },
                );
            }
            Err(e) => {
                if let RepositoryError::PartialFailure { changed, .. } = &e {
                    summary.changed += changed;
                }
                summary.batch_failures += 1;
                tracing::error!(page, error = %e, "bulk upsert failed on page {page}");
                emit(
                    self.on_progress.as_ref(),
                    SyncProgress::BatchFailed {
                        page,
                        error: e.to_string(),
                    },
                );
            }
        }
    }
}

#[async_trait]
impl<C: FeedClient, S: MergeStore> PollTask for Poller<C, S> {
    async fn poll(&self) -> Result<RunSummary, FeedError> {
        self.run_once().await
    }
}
