//! Wire types for the content feed.
//!
//! Decoding is deliberately lenient: every field defaults when missing or `null`,
//! so a sparse item still maps to a record. Identity is checked separately by
//! [`validate_item`](super::mapper::validate_item).

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Pagination metadata reported by the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub page: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub num_pages: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub page_size: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub num_entries: u64,
}

/// Top-level response envelope.
///
/// Items stay as raw JSON here so one malformed item cannot fail the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub page_info: PageInfo,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Vec<serde_json::Value>,
}

/// Lead media as the feed sends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedLeadMedia {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_modified: i64,
}

/// One content item as the feed sends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedItem {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub language: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub canonical_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_modified: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub lead_media: FeedLeadMedia,
}
