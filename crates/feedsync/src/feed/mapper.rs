//! Translation from feed items to canonical records.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::types::{FeedItem, FeedLeadMedia};
use crate::record::{ContentRecord, LeadMedia};

/// Epoch values above this are milliseconds; at or below it, seconds.
///
/// `9_999_999_999` seconds is in the year 2286, while the same number of
/// milliseconds is in April 1970, so no real feed timestamp is ambiguous.
pub const EPOCH_MILLIS_THRESHOLD: i64 = 9_999_999_999;

/// Why a feed item was dropped before mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidItem {
    #[error("item could not be decoded: {reason}")]
    Undecodable { reason: String },

    #[error("item has no id")]
    MissingId,

    #[error("item has non-positive id {id}")]
    NonPositiveId { id: i64 },
}

/// Check that an item carries a usable identity, returning it.
pub fn validate_item(item: &FeedItem) -> Result<i64, InvalidItem> {
    match item.id {
        None => Err(InvalidItem::MissingId),
        Some(id) if id <= 0 => Err(InvalidItem::NonPositiveId { id }),
        Some(id) => Ok(id),
    }
}

/// Map a feed item to a canonical record.
///
/// Never fails. Unparseable dates become `None`; the caller is expected to have run
/// [`validate_item`] first, otherwise `external_id` is `0`.
pub fn map_item(item: &FeedItem) -> ContentRecord {
    ContentRecord {
        id: None,
        external_id: item.id.unwrap_or_default(),
        kind: item.kind.clone(),
        title: item.title.clone(),
        description: item.description.clone(),
        date: parse_date(&item.date),
        location: item.location.clone(),
        language: item.language.clone(),
        canonical_url: item.canonical_url.clone(),
        last_modified: parse_epoch(item.last_modified),
        body: item.body.clone(),
        summary: item.summary.clone(),
        lead_media: map_lead_media(&item.lead_media),
        created_at: None,
        modified_at: None,
    }
}

fn map_lead_media(media: &FeedLeadMedia) -> LeadMedia {
    LeadMedia {
        id: media.id,
        kind: media.kind.clone(),
        title: media.title.clone(),
        date: parse_date(&media.date),
        language: media.language.clone(),
        image_url: media.image_url.clone(),
        last_modified: parse_epoch(media.last_modified),
    }
}

/// Parse an RFC 3339 instant such as `2025-12-01T09:15:00Z`.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a Unix epoch in seconds or milliseconds. `0` means absent.
pub fn parse_epoch(value: i64) -> Option<DateTime<Utc>> {
    match value {
        0 => None,
        n if n > EPOCH_MILLIS_THRESHOLD => DateTime::from_timestamp_millis(n),
        n => DateTime::from_timestamp(n, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_date_accepts_rfc3339_with_offsets() {
        let expected = Utc.with_ymd_and_hms(2025, 12, 1, 9, 15, 0).single();
        assert_eq!(parse_date("2025-12-01T09:15:00Z"), expected);
        assert_eq!(parse_date("2025-12-01T10:15:00+01:00"), expected);
        assert_eq!(parse_date("  2025-12-01T09:15:00Z "), expected);
    }

    #[test]
    fn parse_date_maps_empty_and_garbage_to_none() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date("2025-12-01"), None);
    }

    #[test]
    fn parse_epoch_distinguishes_seconds_and_millis() {
        let secs = parse_epoch(1_764_580_500).expect("seconds");
        let millis = parse_epoch(1_764_580_500_000).expect("millis");
        assert_eq!(secs, millis);
        assert_eq!(secs.timestamp(), 1_764_580_500);

        let with_fraction = parse_epoch(1_764_580_500_250).expect("millis");
        assert_eq!(with_fraction.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn parse_epoch_threshold_is_inclusive_for_seconds() {
        let at = parse_epoch(EPOCH_MILLIS_THRESHOLD).expect("seconds");
        assert_eq!(at.timestamp(), EPOCH_MILLIS_THRESHOLD);

        let above = parse_epoch(EPOCH_MILLIS_THRESHOLD + 1).expect("millis");
        assert_eq!(above.timestamp_millis(), EPOCH_MILLIS_THRESHOLD + 1);
    }

    #[test]
    fn parse_epoch_zero_is_absent() {
        assert_eq!(parse_epoch(0), None);
    }

    #[test]
    fn parse_epoch_out_of_range_is_absent() {
        assert_eq!(parse_epoch(i64::MAX), None);
    }

    #[test]
    fn validate_item_rejects_missing_and_non_positive_ids() {
        let mut item = FeedItem::default();
        assert_eq!(validate_item(&item), Err(InvalidItem::MissingId));

        item.id = Some(0);
        assert_eq!(validate_item(&item), Err(InvalidItem::NonPositiveId { id: 0 }));

        item.id = Some(-3);
        assert_eq!(validate_item(&item), Err(InvalidItem::NonPositiveId { id: -3 }));

        item.id = Some(1001);
        assert_eq!(validate_item(&item), Ok(1001));
    }

    #[test]
    fn map_item_copies_fields_and_normalizes_timestamps() {
        let item = FeedItem {
            id: Some(1001),
            kind: "text".to_string(),
            title: "Match report".to_string(),
            date: "2025-12-01T09:15:00Z".to_string(),
            canonical_url: "https://example.com/1001".to_string(),
            last_modified: 1_764_580_500_000,
            lead_media: FeedLeadMedia {
                id: 77,
                kind: "photo".to_string(),
                date: "not a date".to_string(),
                image_url: "https://img.example.com/77.jpg".to_string(),
                last_modified: 1_764_580_000,
                ..FeedLeadMedia::default()
            },
            ..FeedItem::default()
        };

        let record = map_item(&item);
        assert_eq!(record.id, None);
        assert_eq!(record.external_id, 1001);
        assert_eq!(record.kind, "text");
        assert_eq!(record.canonical_url, "https://example.com/1001");
        assert_eq!(record.date, Utc.with_ymd_and_hms(2025, 12, 1, 9, 15, 0).single());
        assert_eq!(record.last_modified.map(|t| t.timestamp()), Some(1_764_580_500));
        assert_eq!(record.lead_media.id, 77);
        assert_eq!(record.lead_media.date, None);
        assert_eq!(
            record.lead_media.last_modified.map(|t| t.timestamp()),
            Some(1_764_580_000)
        );
        assert_eq!(record.created_at, None);
        assert_eq!(record.modified_at, None);
    }

    #[test]
    fn map_item_without_timestamps_leaves_them_absent() {
        let record = map_item(&FeedItem {
            id: Some(9),
            ..FeedItem::default()
        });
        assert_eq!(record.last_modified, None);
        assert_eq!(record.lead_media.last_modified, None);
        assert_eq!(record.date, None);
    }
}
