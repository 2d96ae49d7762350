//! Feedsync CLI - runs the feed poller, change watcher, and health endpoint.

mod commands;
mod config;
mod health;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feedsync")]
#[command(version)]
#[command(about = "Sync a paginated content feed into a local store")]
#[command(
    long_about = "Feedsync polls a paginated content feed, merges every item into a local \
SQLite or PostgreSQL store by its feed id, and publishes a record.updated message to a \
RabbitMQ topic exchange whenever a stored record changes."
)]
#[command(after_long_help = r#"EXAMPLES
    Run the poller, watcher, and health endpoint until Ctrl+C:
        $ feedsync run

    Poll twice, then idle until stopped:
        $ feedsync run --max-polls 2

    One pass over the first five pages:
        $ feedsync sync --max-pages 5

    Apply migrations to a PostgreSQL store:
        $ FEEDSYNC_DATABASE__URL=postgres://localhost/feedsync feedsync migrate up

CONFIGURATION
    Feedsync reads configuration from:
      1. ~/.config/feedsync/config.toml (or $XDG_CONFIG_HOME/feedsync/config.toml)
      2. ./feedsync.toml
      3. Environment variables (FEEDSYNC_<SECTION>__<KEY>)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    FEEDSYNC_DATABASE__URL             Database connection string (default: ~/.local/state/feedsync/feedsync.db)
    FEEDSYNC_FEED__URL                 Feed base URL
    FEEDSYNC_FEED__PAGE_SIZE           Items per page (default: 20)
    FEEDSYNC_FEED__MAX_PAGES           Pages per run, -1 for unlimited (default: -1)
    FEEDSYNC_SCHEDULER__POLL_INTERVAL_SECS
                                       Seconds between polls (default: 1)
    FEEDSYNC_SCHEDULER__MAX_POLLS      Stop polling after N polls, <=0 for unlimited
    FEEDSYNC_BROKER__URI               AMQP URI
    FEEDSYNC_BROKER__EXCHANGE          Topic exchange (default: cms.sync)
    FEEDSYNC_WATCHER__MODE             auto, notify, or poll (default: auto)
    RUST_LOG                           Log filter (default: feedsync=info,feedsync_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the feed continuously and publish record changes
    Run(RunOptions),
    /// Run one paginated pass over the feed and exit
    Sync(SyncOptions),
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// List applied and pending migrations
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

/// Options for the long-running service.
#[derive(Debug, Clone, clap::Args)]
struct RunOptions {
    /// Stop polling after this many polls; zero or negative for unlimited
    /// (default from config)
    #[arg(short = 'm', long, allow_negative_numbers = true)]
    max_polls: Option<i64>,

    /// Don't start the change watcher (no broker connection)
    #[arg(long)]
    no_watcher: bool,
}

/// Options for a one-shot sync.
#[derive(Debug, Clone, clap::Args)]
struct SyncOptions {
    /// Pages to fetch; negative for unlimited (default from config)
    #[arg(short = 'p', long, allow_negative_numbers = true)]
    max_pages: Option<i64>,

    /// Items per page (default from config or 20)
    #[arg(short = 's', long)]
    page_size: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("feedsync=info,feedsync_cli=info"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // Load configuration (defaults -> config files -> env vars)
    let config = config::Config::load()?;

    let database_url = config
        .database_url()
        .ok_or("Failed to determine database URL: no home directory and no database.url set")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        // Warn if using a relative path (can cause issues depending on cwd)
        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Run(opts) => {
            let shutdown = CancellationToken::new();
            shutdown::setup_shutdown_handler(shutdown.clone());
            commands::run::handle_run(opts, &config, &database_url, shutdown).await?;
        }
        Commands::Sync(opts) => {
            commands::sync::handle_sync(opts, &config, &database_url).await?;
        }
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
    }

    Ok(())
}
