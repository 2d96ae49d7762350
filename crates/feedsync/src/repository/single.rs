use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};
use uuid::Uuid;

use crate::entity::content_record::{Column, Entity as ContentRecords, Model};
use crate::record::ContentRecord;

use super::errors::{RepositoryError, Result};
use super::merge::build_merge_on_conflict;

// ─── Single Record Operations ────────────────────────────────────────────────

/// Insert or merge one record by `external_id`.
///
/// Returns `true` when the record was created or at least one field group was
/// strictly newer than the stored copy. A `false` result means nothing was written,
/// including `modified_at`.
pub async fn upsert_one(db: &DatabaseConnection, record: &ContentRecord) -> Result<bool> {
    upsert_one_at(db, record, Utc::now()).await
}

pub(crate) async fn upsert_one_at(
    db: &DatabaseConnection,
    record: &ContentRecord,
    now: DateTime<Utc>,
) -> Result<bool> {
    validate(record)?;
    let rows = ContentRecords::insert(record.to_active_model(now))
        .on_conflict(build_merge_on_conflict())
        .exec_without_returning(db)
        .await?;
    Ok(rows > 0)
}

/// Reject records that cannot be keyed.
pub(crate) fn validate(record: &ContentRecord) -> Result<()> {
    if record.external_id <= 0 {
        return Err(RepositoryError::InvalidInput {
            message: format!("external_id must be positive, got {}", record.external_id),
        });
    }
    Ok(())
}

/// Find a record by its surrogate id.
pub async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> Result<Option<Model>> {
    ContentRecords::find_by_id(id)
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

/// Find a record by its feed identity.
pub async fn find_by_external_id(db: &DatabaseConnection, external_id: i64) -> Result<Option<Model>> {
    ContentRecords::find()
        .filter(Column::ExternalId.eq(external_id))
        .one(db)
        .await
        .map_err(RepositoryError::from)
}

/// Load the current canonical record for a feed identity.
///
/// # Errors
/// Returns `RepositoryError::NotFound` if no record carries `external_id`.
pub async fn get_by_external_id(db: &DatabaseConnection, external_id: i64) -> Result<ContentRecord> {
    find_by_external_id(db, external_id)
        .await?
        .map(ContentRecord::from)
        .ok_or_else(|| RepositoryError::not_found_by_external_id(external_id))
}

/// Records whose `modified_at` is at or after `since`, oldest first.
///
/// Ties on `modified_at` are ordered by `external_id` so repeated scans are stable.
pub async fn find_modified_since(
    db: &DatabaseConnection,
    since: DateTime<Utc>,
    limit: u64,
) -> Result<Vec<Model>> {
    ContentRecords::find()
        .filter(Column::ModifiedAt.gte(since))
        .order_by_asc(Column::ModifiedAt)
        .order_by_asc(Column::ExternalId)
        .limit(limit)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// Records strictly after the `(modified_at, external_id)` position, in the same order
/// as [`find_modified_since`]. Used to page through a scan without skipping ties.
pub async fn find_modified_after(
    db: &DatabaseConnection,
    modified_at: DateTime<Utc>,
    external_id: i64,
    limit: u64,
) -> Result<Vec<Model>> {
    ContentRecords::find()
        .filter(
            Condition::any()
                .add(Column::ModifiedAt.gt(modified_at))
                .add(
                    Condition::all()
                        .add(Column::ModifiedAt.eq(modified_at))
                        .add(Column::ExternalId.gt(external_id)),
                ),
        )
        .order_by_asc(Column::ModifiedAt)
        .order_by_asc(Column::ExternalId)
        .limit(limit)
        .all(db)
        .await
        .map_err(RepositoryError::from)
}

/// Total number of stored records.
pub async fn count(db: &DatabaseConnection) -> Result<u64> {
    ContentRecords::find()
        .count(db)
        .await
        .map_err(RepositoryError::from)
}
