//! Feedsync - incremental sync of a paginated content feed into a local store.
//!
//! The poller walks the feed page by page and merges every item into the store by
//! its feed identity. The change watcher turns committed writes into
//! `record.updated` messages on a topic exchange.
//!
//! # Features
//!
//! - `sqlite` / `postgres` - Store backends. `postgres` also enables the
//!   `LISTEN`/`NOTIFY` change feed.
//! - `migrate` - Enables database migration support. When enabled, you can use
//!   [`connect_and_migrate`] to automatically run migrations on connection.
//! - `amqp` - The RabbitMQ message bus.
//!
//! # Example
//!
//! ```ignore
//! use feedsync::{connect_and_migrate, repository};
//!
//! let db = connect_and_migrate("sqlite://feedsync.db?mode=rwc").await?;
//!
//! let changed = repository::upsert_one(&db, &record).await?;
//! let recent = repository::find_modified_since(&db, one_minute_ago, 100).await?;
//! ```

pub mod db;
pub mod entity;
pub mod events;
pub mod feed;
pub mod http;
pub mod record;
pub mod repository;
pub mod retry;
pub mod sync;

#[cfg(feature = "migrate")]
pub mod migration;

pub use db::{connect, supports_notify};
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use entity::prelude::*;
pub use record::{ContentRecord, LeadMedia};
pub use repository::RepositoryError;
