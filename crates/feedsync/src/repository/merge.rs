//! The conflict clause that performs field-group reconciliation inside the store.
//!
//! Every insert goes through `INSERT … ON CONFLICT (external_id) DO UPDATE`. Each
//! content column is assigned `CASE WHEN <its group is newer> THEN excluded.col
//! ELSE col END`, and the whole update is skipped unless at least one group is
//! newer. The decision and the write happen in one statement, so concurrent
//! writers for the same `external_id` cannot interleave between read and write.

use sea_orm::sea_query::{Alias, Condition, Expr, OnConflict, SimpleExpr};

use crate::entity::content_record::{
    Column, Entity as ContentRecords, MEDIA_COLUMNS, TOP_LEVEL_COLUMNS,
};

fn excluded(column: Column) -> Expr {
    Expr::col((Alias::new("excluded"), column))
}

fn stored(column: Column) -> Expr {
    Expr::col((ContentRecords, column))
}

/// `excluded.ts IS NOT NULL AND (stored.ts IS NULL OR excluded.ts > stored.ts)`
///
/// Equal timestamps are not newer.
pub(crate) fn is_newer(timestamp: Column) -> Condition {
    Condition::all()
        .add(excluded(timestamp).is_not_null())
        .add(
            Condition::any()
                .add(stored(timestamp).is_null())
                .add(excluded(timestamp).gt(stored(timestamp))),
        )
}

fn guarded(column: Column, when: Condition) -> (Column, SimpleExpr) {
    (
        column,
        Expr::case(when, excluded(column))
            .finally(stored(column))
            .into(),
    )
}

/// Build the merge clause shared by single and bulk upserts.
pub(crate) fn build_merge_on_conflict() -> OnConflict {
    let top = TOP_LEVEL_COLUMNS
        .into_iter()
        .map(|column| guarded(column, is_newer(Column::LastModified)));
    let media = MEDIA_COLUMNS
        .into_iter()
        .map(|column| guarded(column, is_newer(Column::MediaLastModified)));
    let modified_at: (Column, SimpleExpr) = (Column::ModifiedAt, excluded(Column::ModifiedAt).into());

    OnConflict::column(Column::ExternalId)
        .values(top.chain(media).chain(std::iter::once(modified_at)))
        .action_and_where(
            Condition::any()
                .add(is_newer(Column::LastModified))
                .add(is_newer(Column::MediaLastModified))
                .into(),
        )
        .to_owned()
}
