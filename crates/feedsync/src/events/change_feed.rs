//! Commit notifications for the record store.
//!
//! A [`ChangeFeed`] yields one [`ChangeNotification`] per committed insert or update
//! of a content record. Notifications carry only the record's identity; consumers
//! re-read the current state themselves.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use sea_orm::DatabaseConnection;
use serde_json::{Value, json};

use super::WatchError;
use crate::entity::content_record::Model;
use crate::repository::{self, RepositoryError};

/// `LISTEN`/`NOTIFY` channel fed by the content record trigger.
pub const NOTIFY_CHANNEL: &str = "feedsync_content_records";

/// A lazy, possibly endless stream of commit notifications.
///
/// An `Err` item is terminal; the stream yields nothing after it.
pub type ChangeStream = BoxStream<'static, Result<ChangeNotification, WatchError>>;

/// Source of commit notifications.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a new subscription starting at the current commit position.
    async fn subscribe(&self) -> Result<ChangeStream, WatchError>;
}

/// One committed mutation, as delivered by the store.
///
/// The payload is kept raw: a notification that does not decode is skipped by the
/// watcher rather than ending the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub payload: String,
}

impl ChangeNotification {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Identity of the mutated record, if the payload carries a usable one.
    pub fn external_id(&self) -> Option<i64> {
        extract_external_id(&self.payload)
    }

    /// `INSERT` or `UPDATE`, when present.
    pub fn operation(&self) -> Option<String> {
        let value: Value = serde_json::from_str(&self.payload).ok()?;
        value.get("operation")?.as_str().map(str::to_owned)
    }
}

/// Read `documentKey.externalId` from a notification payload.
///
/// Returns `None` for undecodable payloads and for missing, non-integer, or
/// non-positive identities.
pub fn extract_external_id(payload: &str) -> Option<i64> {
    let value: Value = serde_json::from_str(payload).ok()?;
    value
        .get("documentKey")?
        .get("externalId")?
        .as_i64()
        .filter(|id| *id > 0)
}

fn notification_for(model: &Model) -> ChangeNotification {
    let operation = if model.created_at == model.modified_at {
        "INSERT"
    } else {
        "UPDATE"
    };
    ChangeNotification::new(
        json!({
            "operation": operation,
            "documentKey": {"externalId": model.external_id, "id": model.id},
        })
        .to_string(),
    )
}

// ---------- PostgreSQL LISTEN/NOTIFY ----------

/// Change feed over PostgreSQL `LISTEN`.
///
/// Requires the notify trigger migration. Notifications are delivered at commit, so
/// only committed mutations are observed.
#[cfg(feature = "postgres")]
#[derive(Clone)]
pub struct PgNotifyChangeFeed {
    pool: sqlx::PgPool,
}

#[cfg(feature = "postgres")]
impl PgNotifyChangeFeed {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    /// Share the pool of an existing sea-orm PostgreSQL connection.
    ///
    /// # Errors
    /// `WatchError::Subscribe` when `db` is not a PostgreSQL connection.
    pub fn from_connection(db: &DatabaseConnection) -> Result<Self, WatchError> {
        if !crate::db::supports_notify(db) {
            return Err(WatchError::Subscribe(format!(
                "LISTEN/NOTIFY needs PostgreSQL, connected to {:?}",
                sea_orm::ConnectionTrait::get_database_backend(db)
            )));
        }
        Ok(Self::new(db.get_postgres_connection_pool().clone()))
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl ChangeFeed for PgNotifyChangeFeed {
    async fn subscribe(&self) -> Result<ChangeStream, WatchError> {
        let mut listener = sqlx::postgres::PgListener::connect_with(&self.pool)
            .await
            .map_err(|e| WatchError::Subscribe(e.to_string()))?;
        listener
            .listen(NOTIFY_CHANNEL)
            .await
            .map_err(|e| WatchError::Subscribe(e.to_string()))?;

        tracing::debug!(channel = NOTIFY_CHANNEL, "listening for record notifications");

        let notifications = listener.into_stream().map(|item| {
            item.map(|n| ChangeNotification::new(n.payload()))
                .map_err(|e| WatchError::Stream(e.to_string()))
        });
        Ok(end_after_error(notifications.boxed()))
    }
}

/// Stop a stream right after its first error.
fn end_after_error(inner: ChangeStream) -> ChangeStream {
    stream::unfold(Some(inner), |state| async move {
        let mut inner = state?;
        match inner.next().await? {
            Ok(n) => Some((Ok(n), Some(inner))),
            Err(e) => Some((Err(e), None)),
        }
    })
    .boxed()
}

// ---------- Backend-agnostic polling ----------

/// Default scan period for [`PollingChangeFeed`].
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_millis(500);

/// How far behind the newest seen `modified_at` each scan looks.
///
/// Writers stamp `modified_at` before they commit, so a slow transaction can land
/// with a timestamp older than one already scanned. Rows inside the window are
/// deduplicated by `(external_id, modified_at)`.
pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(5);

const SCAN_BATCH: u64 = 200;

/// Change feed that scans the `modified_at` index on an interval.
///
/// Works on any backend. Emits one notification per observed `(external_id,
/// modified_at)` pair, starting with mutations committed after [`subscribe`].
///
/// Only the state visible at scan time is observed: several writes to one record
/// between two scans produce a single notification. A commit whose `modified_at`
/// is already more than the lookback behind the newest row seen is never reported;
/// use `PgNotifyChangeFeed` where every commit must be seen.
///
/// [`subscribe`]: ChangeFeed::subscribe
#[derive(Clone)]
pub struct PollingChangeFeed {
    db: Arc<DatabaseConnection>,
    interval: Duration,
    lookback: Duration,
}

impl PollingChangeFeed {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            db,
            interval: DEFAULT_SCAN_INTERVAL,
            lookback: DEFAULT_LOOKBACK,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }
}

struct ScanState {
    db: Arc<DatabaseConnection>,
    interval: Duration,
    lookback: chrono::Duration,
    /// Nothing modified before this instant is reported.
    floor: DateTime<Utc>,
    high_water: DateTime<Utc>,
    delivered: HashMap<i64, DateTime<Utc>>,
    pending: VecDeque<ChangeNotification>,
    finished: bool,
}

impl ScanState {
    fn window_start(&self) -> DateTime<Utc> {
        (self.high_water - self.lookback).max(self.floor)
    }

    /// Queue notifications for rows not yet delivered.
    fn absorb(&mut self, rows: &[Model]) {
        for row in rows {
            if self.delivered.get(&row.external_id) == Some(&row.modified_at) {
                continue;
            }
            self.delivered.insert(row.external_id, row.modified_at);
            self.high_water = self.high_water.max(row.modified_at);
            self.pending.push_back(notification_for(row));
        }
        let start = self.window_start();
        self.delivered.retain(|_, modified_at| *modified_at >= start);
    }

    async fn scan(&mut self) -> Result<(), RepositoryError> {
        let start = self.window_start();
        let mut rows = repository::find_modified_since(&self.db, start, SCAN_BATCH).await?;
        loop {
            let last = rows.last().map(|r| (r.modified_at, r.external_id));
            let full = rows.len() as u64 >= SCAN_BATCH;
            self.absorb(&rows);
            match last {
                Some((modified_at, external_id)) if full => {
                    rows = repository::find_modified_after(
                        &self.db,
                        modified_at,
                        external_id,
                        SCAN_BATCH,
                    )
                    .await?;
                }
                _ => return Ok(()),
            }
        }
    }
}

#[async_trait]
impl ChangeFeed for PollingChangeFeed {
    async fn subscribe(&self) -> Result<ChangeStream, WatchError> {
        let lookback = chrono::Duration::from_std(self.lookback)
            .map_err(|e| WatchError::Subscribe(format!("invalid lookback: {e}")))?;
        let now = Utc::now();
        let state = ScanState {
            db: Arc::clone(&self.db),
            interval: self.interval,
            lookback,
            floor: now,
            high_water: now,
            delivered: HashMap::new(),
            pending: VecDeque::new(),
            finished: false,
        };

        let stream = stream::unfold(state, |mut state| async move {
            if state.finished {
                return None;
            }
            loop {
                if let Some(n) = state.pending.pop_front() {
                    return Some((Ok(n), state));
                }
                tokio::time::sleep(state.interval).await;
                match state.scan().await {
                    Ok(()) => {}
                    Err(e) if e.is_transient() => {
                        tracing::warn!(error = %e, "change scan failed, retrying next interval");
                    }
                    Err(e) => {
                        state.finished = true;
                        return Some((Err(WatchError::Stream(e.to_string())), state));
                    }
                }
            }
        });

        tracing::debug!(interval = ?self.interval, "scanning for record changes");
        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn extracts_external_id_from_document_key() {
        let payload = r#"{"operation":"UPDATE","documentKey":{"externalId":1001,"id":"x"}}"#;
        assert_eq!(extract_external_id(payload), Some(1001));
        assert_eq!(
            ChangeNotification::new(payload).operation().as_deref(),
            Some("UPDATE")
        );
    }

    #[test]
    fn missing_or_unusable_identity_is_none() {
        assert_eq!(extract_external_id(r#"{"operation":"INSERT"}"#), None);
        assert_eq!(extract_external_id(r#"{"documentKey":{}}"#), None);
        assert_eq!(extract_external_id(r#"{"documentKey":{"externalId":"12"}}"#), None);
        assert_eq!(extract_external_id(r#"{"documentKey":{"externalId":0}}"#), None);
        assert_eq!(extract_external_id("not json"), None);
    }

    fn model(external_id: i64, created: i64, modified: i64) -> Model {
        let at = |s| DateTime::from_timestamp(s, 0).expect("valid timestamp");
        Model {
            id: Uuid::new_v4(),
            external_id,
            kind: String::new(),
            title: String::new(),
            description: String::new(),
            date: None,
            location: String::new(),
            language: String::new(),
            canonical_url: String::new(),
            last_modified: None,
            body: String::new(),
            summary: String::new(),
            media_id: 0,
            media_kind: String::new(),
            media_title: String::new(),
            media_date: None,
            media_language: String::new(),
            media_image_url: String::new(),
            media_last_modified: None,
            created_at: at(created),
            modified_at: at(modified),
        }
    }

    #[test]
    fn notification_reports_insert_or_update() {
        let inserted = notification_for(&model(7, 100, 100));
        assert_eq!(inserted.operation().as_deref(), Some("INSERT"));
        assert_eq!(inserted.external_id(), Some(7));

        let updated = notification_for(&model(7, 100, 200));
        assert_eq!(updated.operation().as_deref(), Some("UPDATE"));
    }

    #[test]
    fn scan_state_delivers_each_mutation_once() {
        let db = Arc::new(
            sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Sqlite).into_connection(),
        );
        let start = DateTime::from_timestamp(100, 0).expect("valid timestamp");
        let mut state = ScanState {
            db,
            interval: Duration::from_millis(10),
            lookback: chrono::Duration::seconds(5),
            floor: start,
            high_water: start,
            delivered: HashMap::new(),
            pending: VecDeque::new(),
            finished: false,
        };

        state.absorb(&[model(1, 101, 101), model(2, 101, 101)]);
        // The next scan overlaps the window and sees the same rows again.
        state.absorb(&[model(1, 101, 101), model(2, 101, 101), model(1, 101, 102)]);

        let ids: Vec<_> = state.pending.iter().filter_map(|n| n.external_id()).collect();
        assert_eq!(ids, [1, 2, 1]);
        assert_eq!(state.high_water.timestamp(), 102);
        assert_eq!(state.window_start().timestamp(), 100);
    }

    #[test]
    fn scan_state_reports_writes_between_scans_once() {
        let db = Arc::new(
            sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Sqlite).into_connection(),
        );
        let start = DateTime::from_timestamp(100, 0).expect("valid timestamp");
        let mut state = ScanState {
            db,
            interval: Duration::from_millis(10),
            lookback: chrono::Duration::seconds(5),
            floor: start,
            high_water: start,
            delivered: HashMap::new(),
            pending: VecDeque::new(),
            finished: false,
        };

        // Inserted at 101 and updated at 103 before the scan ran: one row, one event.
        state.absorb(&[model(1, 101, 103)]);

        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.pending[0].operation().as_deref(), Some("UPDATE"));
        // A commit stamped 97 would now sit before the scanned window.
        assert!(DateTime::from_timestamp(97, 0).expect("valid timestamp") < state.window_start());
    }

    #[test]
    fn scan_state_forgets_rows_behind_the_window() {
        let db = Arc::new(
            sea_orm::MockDatabase::new(sea_orm::DatabaseBackend::Sqlite).into_connection(),
        );
        let start = DateTime::from_timestamp(100, 0).expect("valid timestamp");
        let mut state = ScanState {
            db,
            interval: Duration::from_millis(10),
            lookback: chrono::Duration::seconds(5),
            floor: start,
            high_water: start,
            delivered: HashMap::new(),
            pending: VecDeque::new(),
            finished: false,
        };

        state.absorb(&[model(1, 101, 101)]);
        state.absorb(&[model(2, 120, 120)]);

        assert_eq!(state.window_start().timestamp(), 115);
        assert!(!state.delivered.contains_key(&1));
        assert!(state.delivered.contains_key(&2));
    }
}
