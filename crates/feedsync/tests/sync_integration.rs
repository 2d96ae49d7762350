//! Integration tests for the poller, scheduler, and change watcher.
//!
//! These tests run against an in-memory SQLite database with a scripted feed and an
//! in-memory message bus, and guard against hangs with explicit timeouts.
//!
//! Key scenarios tested:
//! - A full paginated run lands every item exactly once
//! - Replaying the feed changes nothing
//! - The scheduler stops after its poll limit
//! - Committed changes reach the bus, no-op merges do not

#![cfg(all(feature = "sqlite", feature = "migrate"))]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use feedsync::connect_and_migrate;
use feedsync::events::{
    EventPublisher, MessageBus, OutboundMessage, PollingChangeFeed, PublishError, WatchStop,
    Watcher,
};
use feedsync::feed::{FeedClient, FeedError, FeedItem, FeedLeadMedia, FeedPage, PageInfo};
use feedsync::repository;
use feedsync::sync::{
    PollerOptions, Poller, RunStop, Scheduler, SchedulerOptions, StopReason,
};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Maximum time any run should take in tests.
/// If exceeded, there's likely a hang.
const SYNC_TIMEOUT: Duration = Duration::from_secs(10);

const T0: i64 = 1_764_547_200;
const T1: i64 = T0 + 60;

async fn setup_test_db() -> Arc<DatabaseConnection> {
    let db = connect_and_migrate("sqlite::memory:")
        .await
        .expect("Failed to create test database");
    Arc::new(db)
}

fn item(id: i64, last_modified: i64, title: &str) -> FeedItem {
    FeedItem {
        id: Some(id),
        kind: "text".to_string(),
        title: title.to_string(),
        date: "2025-12-01T09:15:00Z".to_string(),
        language: "EN".to_string(),
        last_modified,
        lead_media: FeedLeadMedia {
            id: id + 500,
            kind: "photo".to_string(),
            last_modified: T0,
            ..FeedLeadMedia::default()
        },
        ..FeedItem::default()
    }
}

/// Serves a fixed list of pages; pages past the end are empty.
#[derive(Clone, Default)]
struct ScriptedFeed {
    pages: Arc<Mutex<Vec<Vec<FeedItem>>>>,
}

impl ScriptedFeed {
    fn new(pages: Vec<Vec<FeedItem>>) -> Self {
        Self {
            pages: Arc::new(Mutex::new(pages)),
        }
    }

    fn replace(&self, pages: Vec<Vec<FeedItem>>) {
        *self.pages.lock().unwrap() = pages;
    }
}

#[async_trait]
impl FeedClient for ScriptedFeed {
    async fn fetch_page(&self, page: u32, page_size: u32) -> Result<FeedPage, FeedError> {
        let pages = self.pages.lock().unwrap();
        let items = pages.get(page as usize).cloned().unwrap_or_default();
        Ok(FeedPage {
            info: PageInfo {
                page,
                num_pages: pages.len() as u32,
                page_size,
                num_entries: pages.iter().map(|p| p.len() as u64).sum(),
            },
            items,
            rejected: Vec::new(),
        })
    }
}

#[derive(Default)]
struct CollectingBus {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl CollectingBus {
    fn external_ids(&self) -> Vec<i64> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| {
                let body: Value = serde_json::from_slice(&m.body).unwrap();
                body["record"]["externalId"].as_i64().unwrap()
            })
            .collect()
    }

    async fn wait_for(&self, count: usize) {
        tokio::time::timeout(SYNC_TIMEOUT, async {
            while self.sent.lock().unwrap().len() < count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for published events");
    }
}

#[async_trait]
impl MessageBus for CollectingBus {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

// ─── Poller ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_single_item_feed_creates_one_record() {
    let db = setup_test_db().await;
    let feed = ScriptedFeed::new(vec![vec![item(1001, T0, "first")]]);
    let poller = Poller::new(feed, Arc::clone(&db), PollerOptions::default());

    let summary = tokio::time::timeout(SYNC_TIMEOUT, poller.run_once())
        .await
        .expect("run timed out")
        .unwrap();

    assert_eq!(summary.changed, 1);
    assert_eq!(summary.stop, Some(RunStop::LastPage { num_pages: 1 }));

    let stored = repository::get_by_external_id(&db, 1001).await.unwrap();
    assert_eq!(stored.title, "first");
    assert_eq!(stored.created_at, stored.modified_at);
}

#[tokio::test]
async fn test_full_run_dedups_across_pages_and_replays_cleanly() {
    let db = setup_test_db().await;
    let feed = ScriptedFeed::new(vec![
        vec![item(1001, T0, "a"), item(123, T0, "first copy")],
        vec![item(123, T1, "second copy"), item(1002, T0, "b")],
    ]);
    let poller = Poller::new(feed.clone(), Arc::clone(&db), PollerOptions::default());

    let first = poller.run_once().await.unwrap();
    assert_eq!(first.pages, 2);
    assert_eq!(first.duplicates, 1);
    assert_eq!(first.submitted, 3);
    assert_eq!(first.changed, 3);
    assert_eq!(repository::count(&db).await.unwrap(), 3);
    // The first occurrence in a run wins.
    assert_eq!(
        repository::get_by_external_id(&db, 123).await.unwrap().title,
        "first copy"
    );

    let replay = poller.run_once().await.unwrap();
    assert_eq!(replay.submitted, 3);
    assert_eq!(replay.changed, 0);

    feed.replace(vec![vec![item(1001, T1, "a, edited")]]);
    let edited = poller.run_once().await.unwrap();
    assert_eq!(edited.changed, 1);
    assert_eq!(
        repository::get_by_external_id(&db, 1001).await.unwrap().title,
        "a, edited"
    );
}

#[tokio::test]
async fn test_empty_feed_stops_after_three_empty_pages() {
    let db = setup_test_db().await;
    // The feed claims five pages but serves none.
    let feed = ScriptedFeed::new(vec![Vec::new(); 5]);
    let poller = Poller::new(
        feed,
        Arc::clone(&db),
        PollerOptions {
            page_size: 20,
            max_pages: None,
        },
    );

    let summary = poller.run_once().await.unwrap();

    assert_eq!(summary.pages, 3);
    assert_eq!(summary.stop, Some(RunStop::EmptyPages));
    assert_eq!(repository::count(&db).await.unwrap(), 0);
}

// ─── Scheduler ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_scheduler_stops_after_poll_limit() {
    let db = setup_test_db().await;
    let feed = ScriptedFeed::new(vec![vec![item(1001, T0, "a")]]);
    let poller = Poller::new(feed, Arc::clone(&db), PollerOptions::default());
    let options = SchedulerOptions {
        interval: Duration::from_millis(20),
        ..SchedulerOptions::default()
    }
    .with_poll_limit(2);

    let reason = tokio::time::timeout(
        SYNC_TIMEOUT,
        Scheduler::new(poller, options).run(CancellationToken::new()),
    )
    .await
    .expect("scheduler timed out");

    assert_eq!(reason, StopReason::MaxPollsReached { polls: 2 });
    assert_eq!(repository::count(&db).await.unwrap(), 1);
}

// ─── Change Watcher ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_polling_watcher_publishes_committed_changes_only() {
    let db = setup_test_db().await;
    let bus = Arc::new(CollectingBus::default());
    let watcher = Watcher::new(
        Box::new(PollingChangeFeed::new(Arc::clone(&db)).with_interval(Duration::from_millis(20))),
        Arc::clone(&db),
        EventPublisher::new(Arc::clone(&bus), "cms.sync", "record.updated"),
    );
    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { watcher.run(cancel).await }
    });
    // Let the watcher subscribe before writing.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let feed = ScriptedFeed::new(vec![vec![item(1001, T0, "a")]]);
    let poller = Poller::new(feed.clone(), Arc::clone(&db), PollerOptions::default());
    poller.run_once().await.unwrap();
    bus.wait_for(1).await;

    // A replay merges nothing, so nothing is published.
    poller.run_once().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(bus.external_ids(), [1001]);

    feed.replace(vec![vec![item(1001, T1, "a, edited")]]);
    poller.run_once().await.unwrap();
    bus.wait_for(2).await;

    cancel.cancel();
    let summary = tokio::time::timeout(SYNC_TIMEOUT, handle)
        .await
        .expect("watcher did not stop")
        .unwrap();

    assert_eq!(summary.stop, WatchStop::Cancelled);
    assert_eq!(summary.published, 2);
    assert_eq!(bus.external_ids(), [1001, 1001]);

    let sent = bus.sent.lock().unwrap();
    let latest: Value = serde_json::from_slice(&sent[1].body).unwrap();
    assert_eq!(latest["event"], "record.updated");
    assert_eq!(latest["record"]["title"], "a, edited");
    assert!(sent.iter().all(|m| m.persistent));
}
