//! Database migrations for the feedsync schema.
//!
//! This module is only available when the `migrate` feature is enabled.

pub use sea_orm_migration::prelude::*;

mod m20251201_000001_create_content_records;
mod m20251201_000002_content_record_notify_trigger;

/// The migrator that runs all migrations.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251201_000001_create_content_records::Migration),
            Box::new(m20251201_000002_content_record_notify_trigger::Migration),
        ]
    }

    fn migration_table_name() -> SeaRc<dyn Iden> {
        SeaRc::new(Alias::new("feedsync_migrations"))
    }
}
