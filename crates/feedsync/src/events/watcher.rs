//! The change watcher: turns commit notifications into published events.

use std::fmt;

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::WatchError;
use super::change_feed::ChangeFeed;
use super::publisher::{EventPublisher, MessageBus};
use crate::repository::{RecordReader, RepositoryError};

/// Lifecycle of a [`Watcher`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Starting,
    Subscribed,
    Fetching,
    Publishing,
    Stopped,
}

/// Why a watcher run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchStop {
    Cancelled,
    /// The change feed closed without error.
    StreamEnded,
    Failed(WatchError),
}

impl fmt::Display for WatchStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::StreamEnded => write!(f, "change stream stopped"),
            Self::Failed(e) => write!(f, "change stream closed with error: {e}"),
        }
    }
}

/// Counters for one watcher run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSummary {
    /// Notifications taken off the feed.
    pub received: u64,
    pub published: u64,
    /// Notifications without a usable identity, or whose record no longer exists.
    pub skipped: u64,
    /// Read-back or publish failures.
    pub failed: u64,
    pub stop: WatchStop,
}

/// Subscribes to a [`ChangeFeed`], re-reads each changed record, and publishes it.
///
/// The notification payload is only used for the record identity; the published
/// body is always the current stored state.
pub struct Watcher<R, B> {
    feed: Box<dyn ChangeFeed>,
    reader: R,
    publisher: EventPublisher<B>,
}

impl<R: RecordReader, B: MessageBus> Watcher<R, B> {
    pub fn new(feed: Box<dyn ChangeFeed>, reader: R, publisher: EventPublisher<B>) -> Self {
        Self {
            feed,
            reader,
            publisher,
        }
    }

    /// Run until cancelled or the feed ends.
    ///
    /// Per-notification failures are logged and counted; only a subscription or
    /// stream failure stops the run early.
    pub async fn run(&self, cancel: CancellationToken) -> WatchSummary {
        let mut state = WatchState::Starting;
        let mut received = 0;
        let mut published = 0;
        let mut skipped = 0;
        let mut failed = 0;

        let stop = 'run: {
            let subscribed = tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'run WatchStop::Cancelled,
                subscribed = self.feed.subscribe() => subscribed,
            };
            let mut stream = match subscribed {
                Ok(stream) => stream,
                Err(e) => break 'run WatchStop::Failed(e),
            };
            transition(&mut state, WatchState::Subscribed);
            tracing::info!("watching record change stream");

            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'run WatchStop::Cancelled,
                    next = stream.next() => next,
                };
                let notification = match next {
                    Some(Ok(notification)) => notification,
                    Some(Err(e)) => break 'run WatchStop::Failed(e),
                    None => break 'run WatchStop::StreamEnded,
                };
                received += 1;

                let Some(external_id) = notification.external_id() else {
                    skipped += 1;
                    tracing::warn!(
                        payload = %notification.payload,
                        "skip event missing externalId in documentKey"
                    );
                    continue;
                };

                transition(&mut state, WatchState::Fetching);
                let loaded = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'run WatchStop::Cancelled,
                    loaded = self.reader.load(external_id) => loaded,
                };
                let record = match loaded {
                    Ok(record) => record,
                    Err(RepositoryError::NotFound { .. }) => {
                        skipped += 1;
                        tracing::warn!(external_id, "changed record {external_id} no longer exists, skipping");
                        transition(&mut state, WatchState::Subscribed);
                        continue;
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(external_id, error = %e, "failed fetching updated record {external_id}");
                        transition(&mut state, WatchState::Subscribed);
                        continue;
                    }
                };

                transition(&mut state, WatchState::Publishing);
                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'run WatchStop::Cancelled,
                    outcome = self.publisher.publish_record(record) => outcome,
                };
                match outcome {
                    Ok(()) => {
                        published += 1;
                        tracing::info!(external_id, "published record {external_id} to message bus");
                    }
                    Err(e) => {
                        failed += 1;
                        tracing::warn!(external_id, error = %e, "failed publishing record {external_id}");
                    }
                }
                transition(&mut state, WatchState::Subscribed);
            }
        };

        transition(&mut state, WatchState::Stopped);
        match &stop {
            WatchStop::Failed(e) => tracing::error!(error = %e, "watcher stopped: {stop}"),
            _ => tracing::info!(received, published, "watcher stopped: {stop}"),
        }

        WatchSummary {
            received,
            published,
            skipped,
            failed,
            stop,
        }
    }
}

fn transition(state: &mut WatchState, next: WatchState) {
    tracing::trace!(from = ?state, to = ?next, "watcher state");
    *state = next;
}
