//! Canonical content records.
//!
//! [`ContentRecord`] is the store-independent shape of one content item. It is what
//! the mapper produces from the feed, what the merge repository accepts, and what the
//! event publisher serializes for downstream consumers.

use chrono::{DateTime, Utc};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::content_record::{ActiveModel, Model};

/// Lead media attached to a content record.
///
/// Reconciled independently of the parent record, on its own `last_modified`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadMedia {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub date: Option<DateTime<Utc>>,
    pub language: String,
    pub image_url: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// The canonical representation of one content item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    /// Store-internal surrogate identifier. `None` until first persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    /// Feed-assigned identifier; the reconciliation key.
    pub external_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    pub date: Option<DateTime<Utc>>,
    pub location: String,
    pub language: String,
    pub canonical_url: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub body: String,
    pub summary: String,
    pub lead_media: LeadMedia,
    /// Set once, on first persistence.
    pub created_at: Option<DateTime<Utc>>,
    /// Set on every accepted write.
    pub modified_at: Option<DateTime<Utc>>,
}

impl ContentRecord {
    /// Build the active model for an insert-or-merge at `now`.
    ///
    /// `created_at` and `modified_at` are both `now`; the merge clause never carries
    /// `created_at` into an existing row, so it only lands on first insert.
    pub fn to_active_model(&self, now: DateTime<Utc>) -> ActiveModel {
        ActiveModel {
            id: Set(self.id.unwrap_or_else(Uuid::new_v4)),
            external_id: Set(self.external_id),
            kind: Set(self.kind.clone()),
            title: Set(self.title.clone()),
            description: Set(self.description.clone()),
            date: Set(self.date),
            location: Set(self.location.clone()),
            language: Set(self.language.clone()),
            canonical_url: Set(self.canonical_url.clone()),
            last_modified: Set(self.last_modified),
            body: Set(self.body.clone()),
            summary: Set(self.summary.clone()),
            media_id: Set(self.lead_media.id),
            media_kind: Set(self.lead_media.kind.clone()),
            media_title: Set(self.lead_media.title.clone()),
            media_date: Set(self.lead_media.date),
            media_language: Set(self.lead_media.language.clone()),
            media_image_url: Set(self.lead_media.image_url.clone()),
            media_last_modified: Set(self.lead_media.last_modified),
            created_at: Set(now),
            modified_at: Set(now),
        }
    }

    /// Merge a later duplicate of the same `external_id` into this record, applying
    /// the strict-newer rule per field group.
    ///
    /// One bulk statement cannot touch a row twice, so duplicates inside a batch are
    /// folded in memory with the same rule the store applies.
    pub(crate) fn absorb(&mut self, mut other: ContentRecord) {
        let take_top = other.last_modified.is_some() && other.last_modified > self.last_modified;
        let take_media = other.lead_media.last_modified.is_some()
            && other.lead_media.last_modified > self.lead_media.last_modified;

        if take_media {
            std::mem::swap(&mut self.lead_media, &mut other.lead_media);
        }
        if take_top {
            other.lead_media = std::mem::take(&mut self.lead_media);
            *self = ContentRecord {
                id: self.id,
                ..other
            };
        }
    }
}

impl From<Model> for ContentRecord {
    fn from(model: Model) -> Self {
        Self {
            id: Some(model.id),
            external_id: model.external_id,
            kind: model.kind,
            title: model.title,
            description: model.description,
            date: model.date,
            location: model.location,
            language: model.language,
            canonical_url: model.canonical_url,
            last_modified: model.last_modified,
            body: model.body,
            summary: model.summary,
            lead_media: LeadMedia {
                id: model.media_id,
                kind: model.media_kind,
                title: model.media_title,
                date: model.media_date,
                language: model.media_language,
                image_url: model.media_image_url,
                last_modified: model.media_last_modified,
            },
            created_at: Some(model.created_at),
            modified_at: Some(model.modified_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::ActiveValue;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    fn record() -> ContentRecord {
        ContentRecord {
            external_id: 1001,
            kind: "text".to_string(),
            title: "Match report".to_string(),
            last_modified: Some(ts(1_764_580_500)),
            lead_media: LeadMedia {
                id: 77,
                image_url: "https://img.example.com/77.jpg".to_string(),
                last_modified: Some(ts(1_764_580_000)),
                ..LeadMedia::default()
            },
            ..ContentRecord::default()
        }
    }

    #[test]
    fn active_model_sets_both_tracking_timestamps_to_now() {
        let now = ts(1_800_000_000);
        let model = record().to_active_model(now);

        assert_eq!(model.created_at, ActiveValue::Set(now));
        assert_eq!(model.modified_at, ActiveValue::Set(now));
        assert_eq!(model.external_id, ActiveValue::Set(1001));
        assert_eq!(model.media_id, ActiveValue::Set(77));
    }

    #[test]
    fn active_model_keeps_existing_surrogate_id() {
        let id = Uuid::new_v4();
        let mut rec = record();
        rec.id = Some(id);

        let model = rec.to_active_model(ts(0));
        assert_eq!(model.id, ActiveValue::Set(id));
    }

    #[test]
    fn serializes_with_feed_style_keys() {
        let json = serde_json::to_value(record()).expect("serialize");

        assert_eq!(json["externalId"], 1001);
        assert_eq!(json["type"], "text");
        assert_eq!(json["leadMedia"]["imageUrl"], "https://img.example.com/77.jpg");
        assert!(json.get("id").is_none(), "unpersisted id is omitted");
        assert!(json["modifiedAt"].is_null());
    }

    #[test]
    fn absorb_takes_each_field_group_from_its_newest_copy() {
        let mut base = record();
        let mut top_newer = record();
        top_newer.title = "Updated report".to_string();
        top_newer.last_modified = Some(ts(1_764_590_000));
        top_newer.lead_media.title = "stale media".to_string();
        top_newer.lead_media.last_modified = Some(ts(1));

        base.absorb(top_newer);
        assert_eq!(base.title, "Updated report");
        assert_eq!(base.last_modified, Some(ts(1_764_590_000)));
        assert_eq!(base.lead_media.last_modified, Some(ts(1_764_580_000)));
        assert_eq!(base.lead_media.title, "");

        let mut media_newer = record();
        media_newer.title = "stale title".to_string();
        media_newer.lead_media.title = "New photo".to_string();
        media_newer.lead_media.last_modified = Some(ts(1_764_600_000));

        base.absorb(media_newer);
        assert_eq!(base.title, "Updated report");
        assert_eq!(base.lead_media.title, "New photo");
    }

    #[test]
    fn absorb_ignores_equal_and_absent_timestamps() {
        let mut base = record();
        let mut same = record();
        same.title = "ignored".to_string();
        same.lead_media.title = "ignored".to_string();
        base.absorb(same);
        assert_eq!(base, record());

        let mut absent = record();
        absent.last_modified = None;
        absent.lead_media.last_modified = None;
        absent.title = "ignored".to_string();
        base.absorb(absent);
        assert_eq!(base, record());
    }
}
