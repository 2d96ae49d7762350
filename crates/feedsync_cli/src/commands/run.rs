//! Long-running service: scheduler, change watcher, and health endpoint.

use std::sync::Arc;
use std::time::Duration;

use feedsync::events::{ChangeFeed, EventPublisher, LapinBus, PollingChangeFeed, Watcher};
use feedsync::feed::HttpFeedClient;
use feedsync::sync::{Poller, Scheduler};
use sea_orm::DatabaseConnection;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::RunOptions;
use crate::config::{Config, WatcherMode};
use crate::health;

/// How long tasks get to wind down after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub(crate) async fn handle_run(
    opts: RunOptions,
    config: &Config,
    database_url: &str,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(feedsync::connect_and_migrate(database_url).await?);
    tracing::info!("Record store ready");

    let mut tasks = JoinSet::new();

    let client = HttpFeedClient::new(&config.feed.url, config.fetch_timeout())?;
    let poller = Poller::new(client, Arc::clone(&db), config.poller_options());
    let mut scheduler_options = config.scheduler_options();
    if let Some(max_polls) = opts.max_polls {
        scheduler_options = scheduler_options.with_poll_limit(max_polls);
    }
    let scheduler = Scheduler::new(poller, scheduler_options);
    let token = shutdown.child_token();
    tasks.spawn(async move {
        let reason = scheduler.run(token).await;
        tracing::info!("Scheduler finished: {reason}");
    });

    let bus = if opts.no_watcher {
        tracing::info!("Change watcher disabled");
        None
    } else {
        let bus = Arc::new(LapinBus::connect(&config.broker.uri, &config.broker.exchange).await?);
        let watcher = Watcher::new(
            change_feed(config, &db)?,
            Arc::clone(&db),
            EventPublisher::new(
                Arc::clone(&bus),
                config.broker.exchange.clone(),
                config.broker.routing_key.clone(),
            ),
        );
        let token = shutdown.child_token();
        tasks.spawn(async move {
            let summary = watcher.run(token).await;
            tracing::info!(
                received = summary.received,
                published = summary.published,
                skipped = summary.skipped,
                failed = summary.failed,
                "Watcher finished: {}",
                summary.stop
            );
        });
        Some(bus)
    };

    let addr = config.health.addr;
    let token = shutdown.child_token();
    tasks.spawn(async move {
        if let Err(e) = health::serve(addr, token).await {
            tracing::error!("Health endpoint failed on {addr}: {e}");
        }
    });

    tracing::info!("Service started");
    shutdown.cancelled().await;
    tracing::info!("Shutdown signal received, shutting down...");

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if drained.is_err() {
        tracing::warn!(
            "Tasks still running after {:?}, abandoning them",
            SHUTDOWN_GRACE
        );
        tasks.abort_all();
    }

    if let Some(bus) = bus
        && let Err(e) = bus.close().await
    {
        tracing::warn!("Message bus close error: {e}");
    }
    match Arc::try_unwrap(db) {
        Ok(db) => {
            if let Err(e) = db.close().await {
                tracing::warn!("Database close error: {e}");
            }
        }
        Err(_) => tracing::debug!("Database still shared by abandoned tasks, dropping handle"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Pick the change feed for the configured watcher mode.
fn change_feed(
    config: &Config,
    db: &Arc<DatabaseConnection>,
) -> Result<Box<dyn ChangeFeed>, Box<dyn std::error::Error>> {
    let polling = || {
        Box::new(
            PollingChangeFeed::new(Arc::clone(db)).with_interval(config.watcher_poll_interval()),
        ) as Box<dyn ChangeFeed>
    };

    match config.watcher.mode {
        WatcherMode::Poll => Ok(polling()),
        WatcherMode::Notify => notify_feed(db),
        WatcherMode::Auto if feedsync::supports_notify(db) => notify_feed(db),
        WatcherMode::Auto => Ok(polling()),
    }
}

#[cfg(feature = "postgres")]
fn notify_feed(db: &DatabaseConnection) -> Result<Box<dyn ChangeFeed>, Box<dyn std::error::Error>> {
    let feed = feedsync::events::PgNotifyChangeFeed::from_connection(db)?;
    Ok(Box::new(feed))
}

#[cfg(not(feature = "postgres"))]
fn notify_feed(_db: &DatabaseConnection) -> Result<Box<dyn ChangeFeed>, Box<dyn std::error::Error>> {
    Err("watcher mode `notify` needs the postgres feature".into())
}
