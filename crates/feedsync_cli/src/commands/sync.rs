//! One paginated pass over the feed.

use std::sync::Arc;

use console::{Term, style};
use feedsync::feed::HttpFeedClient;
use feedsync::sync::Poller;

use crate::SyncOptions;
use crate::config::Config;
use crate::progress::LoggingReporter;

pub(crate) async fn handle_sync(
    opts: SyncOptions,
    config: &Config,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Arc::new(feedsync::connect_and_migrate(database_url).await?);

    let mut options = config.poller_options();
    if let Some(page_size) = opts.page_size {
        options.page_size = page_size;
    }
    if let Some(max_pages) = opts.max_pages {
        options.max_pages = u32::try_from(max_pages).ok();
    }

    let client = HttpFeedClient::new(&config.feed.url, config.fetch_timeout())?;
    let poller = Poller::new(client, Arc::clone(&db), options)
        .with_progress(LoggingReporter::new().into_callback());

    let summary = poller.run_once().await?;
    let total = feedsync::repository::count(&db).await?;

    if Term::stdout().is_term() {
        println!(
            "{} {} pages, {} items, {} changed ({} duplicates, {} invalid)",
            style("Synced").green().bold(),
            summary.pages,
            summary.items,
            style(summary.changed).cyan(),
            summary.duplicates,
            summary.invalid,
        );
        if summary.batch_failures > 0 {
            println!(
                "{} {} page batches failed to save",
                style("Warning:").yellow().bold(),
                summary.batch_failures
            );
        }
        println!("{} records stored", style(total).cyan());
    } else {
        println!(
            "pages={} items={} changed={} duplicates={} invalid={} batch_failures={} stored={}",
            summary.pages,
            summary.items,
            summary.changed,
            summary.duplicates,
            summary.invalid,
            summary.batch_failures,
            total
        );
    }

    drop(poller);
    if let Ok(db) = Arc::try_unwrap(db) {
        db.close().await?;
    }
    Ok(())
}
