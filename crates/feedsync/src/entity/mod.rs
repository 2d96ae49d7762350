//! SeaORM entity definitions for the feedsync database schema.

pub mod content_record;
pub mod prelude;
