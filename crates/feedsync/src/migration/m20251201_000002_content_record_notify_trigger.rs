//! Commit notifications for content records (PostgreSQL only).
//!
//! Installs a row trigger that sends `NOTIFY feedsync_content_records` with a small
//! JSON envelope after every insert or update. PostgreSQL delivers notifications at
//! commit time, so listeners only ever see committed mutations. Other backends skip
//! this migration and rely on the polling change feed.

use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::DatabaseBackend;

use crate::events::NOTIFY_CHANNEL;

#[derive(DeriveMigrationName)]
pub struct Migration;


fn create_function_sql() -> String {
    format!(
        r#"
CREATE OR REPLACE FUNCTION feedsync_notify_content_record() RETURNS trigger AS $$
BEGIN
    PERFORM pg_notify(
        '{NOTIFY_CHANNEL}',
        json_build_object(
            'operation', TG_OP,
            'documentKey', json_build_object('externalId', NEW.external_id, 'id', NEW.id)
        )::text
    );
    RETURN NEW;
END;
$$ LANGUAGE plpgsql
"#
    )
}

const CREATE_TRIGGER: &str = r#"
CREATE TRIGGER content_records_notify
AFTER INSERT OR UPDATE ON content_records
FOR EACH ROW EXECUTE FUNCTION feedsync_notify_content_record()
"#;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() != DatabaseBackend::Postgres {
            return Ok(());
        }

        let db = manager.get_connection();
        db.execute_unprepared(&create_function_sql()).await?;
        db.execute_unprepared("DROP TRIGGER IF EXISTS content_records_notify ON content_records")
            .await?;
        db.execute_unprepared(CREATE_TRIGGER).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        if manager.get_database_backend() != DatabaseBackend::Postgres {
            return Ok(());
        }

        let db = manager.get_connection();
        db.execute_unprepared("DROP TRIGGER IF EXISTS content_records_notify ON content_records")
            .await?;
        db.execute_unprepared("DROP FUNCTION IF EXISTS feedsync_notify_content_record()")
            .await?;
        Ok(())
    }
}
