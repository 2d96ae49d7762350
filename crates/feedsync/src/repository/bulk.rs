use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, EntityTrait};

use crate::entity::content_record::Entity as ContentRecords;
use crate::record::ContentRecord;
use crate::retry::{RetryConfig, with_retry};

use super::errors::{RepositoryError, Result};
use super::merge::build_merge_on_conflict;
use super::single::{upsert_one_at, validate};

// ─── Bulk Operations ─────────────────────────────────────────────────────────

/// Rows per merge statement. Keeps bind parameters well under the SQLite and
/// PostgreSQL limits (21 columns per row).
pub const BULK_CHUNK_ROWS: usize = 500;

/// Merge a batch of records, returning how many were created or changed.
///
/// Equivalent to calling [`upsert_one`](super::upsert_one) for every record, but
/// executed as one `INSERT … ON CONFLICT` statement per chunk. Records repeating an
/// `external_id` are collapsed first. If a statement fails, its chunk is replayed
/// record by record so the healthy members still land; any member failures are
/// then reported as [`RepositoryError::PartialFailure`].
pub async fn upsert_batch(db: &DatabaseConnection, records: Vec<ContentRecord>) -> Result<u64> {
    upsert_batch_with_retry(db, records, &RetryConfig::none()).await
}

/// [`upsert_batch`] that first retries transient store errors with backoff.
///
/// Only errors that look transient (locked, busy, connection, timeout) are retried;
/// the per-record fallback runs once retries are exhausted.
pub async fn upsert_batch_with_retry(
    db: &DatabaseConnection,
    records: Vec<ContentRecord>,
    retry: &RetryConfig,
) -> Result<u64> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut changed = 0u64;
    let mut succeeded = 0usize;
    let mut failed = 0usize;

    let (records, invalid): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| validate(r).is_ok());
    for record in &invalid {
        tracing::warn!(
            external_id = record.external_id,
            "skipping record without a usable external id"
        );
    }
    failed += invalid.len();

    let submitted = records.len();
    let records = collapse_duplicates(records);
    if records.len() < submitted {
        tracing::debug!(
            submitted,
            unique = records.len(),
            "collapsed duplicate external ids in batch"
        );
    }

    let now = Utc::now();

    for chunk in records.chunks(BULK_CHUNK_ROWS) {
        let bulk = with_retry(
            || merge_chunk(db, chunk, now),
            RepositoryError::is_transient,
            "upsert_batch",
            retry,
        )
        .await;

        match bulk {
            Ok(rows) => {
                changed += rows;
                succeeded += chunk.len();
            }
            Err(e) => {
                tracing::warn!(
                    count = chunk.len(),
                    error = %e,
                    "bulk merge failed, falling back to per-record upserts"
                );
                let outcome = merge_individually(db, chunk, now).await;
                changed += outcome.changed;
                succeeded += outcome.succeeded;
                failed += outcome.failed;
            }
        }
    }

    if failed > 0 {
        return Err(RepositoryError::PartialFailure {
            succeeded,
            failed,
            changed,
        });
    }

    tracing::debug!(count = succeeded, changed, "batch merged");
    Ok(changed)
}

async fn merge_chunk(
    db: &DatabaseConnection,
    records: &[ContentRecord],
    now: DateTime<Utc>,
) -> Result<u64> {
    let models = records.iter().map(|r| r.to_active_model(now));
    ContentRecords::insert_many(models)
        .on_conflict(build_merge_on_conflict())
        .exec_without_returning(db)
        .await
        .map_err(RepositoryError::from)
}

#[derive(Debug, Default)]
struct FallbackOutcome {
    succeeded: usize,
    failed: usize,
    changed: u64,
}

async fn merge_individually(
    db: &DatabaseConnection,
    records: &[ContentRecord],
    now: DateTime<Utc>,
) -> FallbackOutcome {
    let mut outcome = FallbackOutcome::default();
    for record in records {
        match upsert_one_at(db, record, now).await {
            Ok(changed) => {
                outcome.succeeded += 1;
                outcome.changed += u64::from(changed);
            }
            Err(e) => {
                outcome.failed += 1;
                tracing::warn!(
                    external_id = record.external_id,
                    error = %e,
                    "record upsert failed"
                );
            }
        }
    }
    outcome
}

/// Fold records sharing an `external_id` into one, keeping first-seen order.
///
/// A single statement cannot touch the same row twice, so the strict-newer rule is
/// applied in memory first.
pub(crate) fn collapse_duplicates(records: Vec<ContentRecord>) -> Vec<ContentRecord> {
    let mut positions: HashMap<i64, usize> = HashMap::with_capacity(records.len());
    let mut unique: Vec<ContentRecord> = Vec::with_capacity(records.len());

    for record in records {
        match positions.get(&record.external_id) {
            Some(&idx) => unique[idx].absorb(record),
            None => {
                positions.insert(record.external_id, unique.len());
                unique.push(record);
            }
        }
    }

    unique
}
