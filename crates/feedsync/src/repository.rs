//! The merge repository: sole writer of content records.
//!
//! Every write is an idempotent merge keyed on `external_id`. Top-level content and
//! lead media are reconciled independently, each replaced only when its incoming
//! `last_modified` is strictly newer than the stored one. The comparison runs inside
//! the store's conflict clause, so concurrent pollers and replayed pages converge to
//! the same state without locking.
//!
//! [`MergeStore`] and [`RecordReader`] are the seams the poller and the change
//! watcher depend on; both are implemented for [`DatabaseConnection`] and for an
//! `Arc` around any implementor, which is how the CLI shares one connection.

mod bulk;
mod errors;
mod merge;
mod single;

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DatabaseConnection;

pub use bulk::{BULK_CHUNK_ROWS, upsert_batch, upsert_batch_with_retry};
pub use errors::{RepositoryError, Result};
pub use single::{
    count, find_by_external_id, find_by_id, find_modified_after, find_modified_since,
    get_by_external_id, upsert_one,
};

use crate::record::ContentRecord;
use crate::retry::RetryConfig;

/// Write side used by the feed poller.
#[async_trait]
pub trait MergeStore: Send + Sync {
    /// Merge one record; `true` if it was created or changed.
    async fn upsert_one(&self, record: &ContentRecord) -> Result<bool>;

    /// Merge a batch; returns the number of records created or changed.
    async fn upsert_batch(&self, records: Vec<ContentRecord>) -> Result<u64>;
}

#[async_trait]
impl MergeStore for DatabaseConnection {
    async fn upsert_one(&self, record: &ContentRecord) -> Result<bool> {
        single::upsert_one(self, record).await
    }

    async fn upsert_batch(&self, records: Vec<ContentRecord>) -> Result<u64> {
        bulk::upsert_batch_with_retry(self, records, &RetryConfig::default()).await
    }
}

#[async_trait]
impl<S: MergeStore + ?Sized> MergeStore for Arc<S> {
    async fn upsert_one(&self, record: &ContentRecord) -> Result<bool> {
        (**self).upsert_one(record).await
    }

    async fn upsert_batch(&self, records: Vec<ContentRecord>) -> Result<u64> {
        (**self).upsert_batch(records).await
    }
}

/// Read side used by the change watcher.
#[async_trait]
pub trait RecordReader: Send + Sync {
    /// Load the current record for `external_id`.
    ///
    /// # Errors
    /// `RepositoryError::NotFound` when the identity is unknown.
    async fn load(&self, external_id: i64) -> Result<ContentRecord>;
}

#[async_trait]
impl RecordReader for DatabaseConnection {
    async fn load(&self, external_id: i64) -> Result<ContentRecord> {
        single::get_by_external_id(self, external_id).await
    }
}

#[async_trait]
impl<R: RecordReader + ?Sized> RecordReader for Arc<R> {
    async fn load(&self, external_id: i64) -> Result<ContentRecord> {
        (**self).load(external_id).await
    }
}
