//! The outbound event envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::ContentRecord;

/// Event name carried by every record change message.
pub const RECORD_UPDATED: &str = "record.updated";

/// `{event, timestamp, record}` as published to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordUpdated {
    pub event: String,
    /// Publish time, not the record's modification time.
    pub timestamp: DateTime<Utc>,
    pub record: ContentRecord,
}

impl RecordUpdated {
    pub fn new(record: ContentRecord, timestamp: DateTime<Utc>) -> Self {
        Self {
            event: RECORD_UPDATED.to_string(),
            timestamp,
            record,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
