//! Change propagation: commit notifications in, `record.updated` messages out.
//!
//! # Module Structure
//!
//! - [`change_feed`] - `ChangeFeed` trait, `PgNotifyChangeFeed`, `PollingChangeFeed`
//! - [`message`] - The outbound `RecordUpdated` envelope
//! - [`publisher`] - `MessageBus` trait and `EventPublisher`
//! - `amqp` - `LapinBus`, the RabbitMQ `MessageBus` (feature `amqp`)
//! - [`watcher`] - `Watcher`: subscribe, re-read, publish

#[cfg(feature = "amqp")]
mod amqp;
pub mod change_feed;
pub mod message;
pub mod publisher;
pub mod watcher;

use thiserror::Error;

#[cfg(feature = "amqp")]
pub use amqp::LapinBus;
#[cfg(feature = "postgres")]
pub use change_feed::PgNotifyChangeFeed;
pub use change_feed::{
    ChangeFeed, ChangeNotification, ChangeStream, NOTIFY_CHANNEL, PollingChangeFeed,
    extract_external_id,
};
pub use message::{RECORD_UPDATED, RecordUpdated};
pub use publisher::{
    DEFAULT_EXCHANGE, DEFAULT_ROUTING_KEY, EventPublisher, MessageBus, OutboundMessage,
};
pub use watcher::{WatchState, WatchStop, WatchSummary, Watcher};

/// Errors publishing a message to the bus.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Broker error: {0}")]
    Broker(String),

    #[error("Broker rejected message for {exchange}/{routing_key}")]
    Nacked {
        exchange: String,
        routing_key: String,
    },
}

/// Terminal change feed failures. Per-notification problems are skips, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WatchError {
    #[error("Failed to subscribe to change feed: {0}")]
    Subscribe(String),

    #[error("Change feed failed: {0}")]
    Stream(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_error_messages() {
        let err = PublishError::Nacked {
            exchange: "cms.sync".to_string(),
            routing_key: "record.updated".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Broker rejected message for cms.sync/record.updated"
        );
        assert!(PublishError::Broker("channel closed".into())
            .to_string()
            .contains("channel closed"));
    }

    #[test]
    fn watch_error_messages() {
        assert!(WatchError::Subscribe("refused".into())
            .to_string()
            .starts_with("Failed to subscribe"));
        assert!(WatchError::Stream("eof".into()).to_string().contains("eof"));
    }
}
