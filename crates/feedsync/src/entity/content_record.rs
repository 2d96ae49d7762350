//! ContentRecord entity - the durable, canonical form of one feed content item.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// ContentRecord model - one row per `external_id` seen on the feed.
///
/// The lead media sub-record is flattened into `media_*` columns. It carries its own
/// `media_last_modified` and is reconciled independently of the top-level fields.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_records")]
pub struct Model {
    /// Internal UUID primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    // ─── Feed Identity ───────────────────────────────────────────────────────
    /// Identifier assigned by the feed. Unique, and the only reconciliation key.
    #[sea_orm(unique)]
    pub external_id: i64,

    // ─── Content ─────────────────────────────────────────────────────────────
    /// Content type as reported by the feed (`type` on the wire).
    pub kind: String,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Publish date.
    pub date: Option<DateTimeUtc>,
    pub location: String,
    pub language: String,
    #[sea_orm(column_type = "Text")]
    pub canonical_url: String,
    /// Feed-side modification time of the top-level field group.
    pub last_modified: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text")]
    pub body: String,
    #[sea_orm(column_type = "Text")]
    pub summary: String,

    // ─── Lead Media ──────────────────────────────────────────────────────────
    pub media_id: i64,
    pub media_kind: String,
    pub media_title: String,
    pub media_date: Option<DateTimeUtc>,
    pub media_language: String,
    #[sea_orm(column_type = "Text")]
    pub media_image_url: String,
    /// Feed-side modification time of the lead media field group.
    pub media_last_modified: Option<DateTimeUtc>,

    // ─── Tracking ────────────────────────────────────────────────────────────
    /// When this record was first persisted. Never rewritten.
    pub created_at: DateTimeUtc,
    /// When a field group of this record was last rewritten.
    pub modified_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Columns rewritten when the top-level field group wins reconciliation.
pub const TOP_LEVEL_COLUMNS: [Column; 10] = [
    Column::Kind,
    Column::Title,
    Column::Description,
    Column::Date,
    Column::Location,
    Column::Language,
    Column::CanonicalUrl,
    Column::LastModified,
    Column::Body,
    Column::Summary,
];

/// Columns rewritten when the lead media field group wins reconciliation.
pub const MEDIA_COLUMNS: [Column; 7] = [
    Column::MediaId,
    Column::MediaKind,
    Column::MediaTitle,
    Column::MediaDate,
    Column::MediaLanguage,
    Column::MediaImageUrl,
    Column::MediaLastModified,
];
