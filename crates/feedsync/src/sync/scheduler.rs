//! Continuous scheduling of feed polls.

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::poller::PollTask;
use super::types::{MIN_POLL_INTERVAL, SchedulerOptions, StopReason};

/// Runs a [`PollTask`] on a fixed cadence until cancelled or out of polls.
pub struct Scheduler<P> {
    task: P,
    options: SchedulerOptions,
}

impl<P: PollTask> Scheduler<P> {
    pub fn new(task: P, options: SchedulerOptions) -> Self {
        Self { task, options }
    }

    fn limit_reached(&self, polls: u64) -> bool {
        self.options.max_polls.is_some_and(|max| polls >= max)
    }

    /// Poll once per tick. The first tick fires one interval after start.
    ///
    /// An interval below [`MIN_POLL_INTERVAL`] is raised to it.
    ///
    /// Each poll is bounded by `poll_timeout`; a failed or timed-out poll is logged
    /// and the loop waits for the next tick. Cancellation is observed both between
    /// ticks and while a poll is in flight, in which case the poll is dropped.
    pub async fn run(&self, cancel: CancellationToken) -> StopReason {
        let interval = self.options.effective_interval();
        if interval != self.options.interval {
            tracing::warn!(
                configured = ?self.options.interval,
                "poll interval too short, using {interval:?}"
            );
        }
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0u64;

        tracing::info!(?interval, max_polls = ?self.options.max_polls, "polling every {interval:?}");

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("poller stopping, cancelled");
                    return StopReason::Cancelled;
                }
                _ = ticker.tick() => {}
            }

            if self.limit_reached(polls) {
                return self.stop_after(polls);
            }

            polls += 1;
            tracing::info!(poll = polls, "poll #{polls} starting ingestion");

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!(poll = polls, "poller stopping, cancelled mid-poll");
                    return StopReason::Cancelled;
                }
                outcome = tokio::time::timeout(self.options.poll_timeout, self.task.poll()) => outcome,
            };

            match outcome {
                Ok(Ok(summary)) => tracing::debug!(
                    poll = polls,
                    pages = summary.pages,
                    changed = summary.changed,
                    "poll finished"
                ),
                Ok(Err(e)) => tracing::warn!(poll = polls, error = %e, "poll error"),
                Err(_) => tracing::warn!(
                    poll = polls,
                    timeout = ?self.options.poll_timeout,
                    "poll timed out, abandoning"
                ),
            }

            if self.limit_reached(polls) {
                return self.stop_after(polls);
            }
        }
    }

    fn stop_after(&self, polls: u64) -> StopReason {
        let reason = StopReason::MaxPollsReached { polls };
        tracing::info!(polls, "poller {reason}");
        reason
    }
}
