//! Schema migrations for the record store.

use feedsync::db;
use feedsync::migration::{Migrator, MigratorTrait};
use sea_orm::{DatabaseConnection, DbErr};

use crate::MigrateAction;

/// Table the migrator records applied versions in.
const MIGRATION_TABLE: &str = "feedsync_migrations";

pub(crate) async fn handle_migrate(
    action: MigrateAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;

    match action {
        MigrateAction::Up => {
            let pending: Vec<String> = Migrator::get_pending_migrations(&db)
                .await?
                .iter()
                .map(|m| m.name().to_string())
                .collect();
            if pending.is_empty() {
                println!("Schema is up to date.");
            } else {
                for name in &pending {
                    println!("Applying {}", describe(name, feedsync::supports_notify(&db)));
                }
                Migrator::up(&db, None).await?;
                println!("Applied {} migration(s).", pending.len());
            }
        }
        MigrateAction::Down => {
            println!("Rolling back last migration...");
            Migrator::down(&db, Some(1)).await?;
            println!("Rollback complete.");
        }
        MigrateAction::Status => {
            for line in status_report(&db).await? {
                println!("{line}");
            }
        }
        MigrateAction::Fresh => {
            println!("Dropping content_records and {MIGRATION_TABLE}, then reapplying...");
            Migrator::fresh(&db).await?;
            println!("Fresh migration complete.");
        }
    }

    db.close().await?;
    Ok(())
}

/// The trigger migration only installs anything on PostgreSQL.
fn describe(name: &str, notify: bool) -> String {
    if !notify && name.ends_with("_notify_trigger") {
        format!("{name} (no-op on this backend)")
    } else {
        name.to_string()
    }
}

async fn status_report(db: &DatabaseConnection) -> Result<Vec<String>, DbErr> {
    let applied: Vec<String> = Migrator::get_applied_migrations(db)
        .await?
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    let pending: Vec<String> = Migrator::get_pending_migrations(db)
        .await?
        .iter()
        .map(|m| m.name().to_string())
        .collect();
    Ok(status_lines(&applied, &pending, feedsync::supports_notify(db)))
}

fn status_lines(applied: &[String], pending: &[String], notify: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "Migrations ({MIGRATION_TABLE}): {} applied, {} pending",
        applied.len(),
        pending.len()
    )];
    lines.extend(
        applied
            .iter()
            .map(|name| format!("  applied  {}", describe(name, notify))),
    );
    lines.extend(
        pending
            .iter()
            .map(|name| format!("  pending  {}", describe(name, notify))),
    );
    lines
}
