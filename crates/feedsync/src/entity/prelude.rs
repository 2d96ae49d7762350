//! Common re-exports for convenient entity usage.

pub use super::content_record::{
    ActiveModel as ContentRecordActiveModel, Column as ContentRecordColumn,
    Entity as ContentRecords, Model as ContentRecordModel,
};
