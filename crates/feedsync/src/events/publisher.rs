//! Publishing record change events.

use async_trait::async_trait;
use chrono::Utc;

use super::PublishError;
use super::message::RecordUpdated;
use crate::record::ContentRecord;

pub const DEFAULT_EXCHANGE: &str = "cms.sync";
pub const DEFAULT_ROUTING_KEY: &str = "record.updated";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// One message ready for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub content_type: &'static str,
    /// Survive broker restarts (AMQP delivery mode 2).
    pub persistent: bool,
    pub body: Vec<u8>,
}

/// Broker boundary.
///
/// `publish` resolves once the broker has confirmed the message. A rejected
/// message is `PublishError::Nacked`.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError>;
}

#[async_trait]
impl<B: MessageBus + ?Sized> MessageBus for std::sync::Arc<B> {
    async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError> {
        (**self).publish(message).await
    }
}

/// Wraps records in the `record.updated` envelope and hands them to a bus.
pub struct EventPublisher<B> {
    bus: B,
    exchange: String,
    routing_key: String,
}

impl<B: MessageBus> EventPublisher<B> {
    pub fn new(bus: B, exchange: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            bus,
            exchange: exchange.into(),
            routing_key: routing_key.into(),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Publish `record` as a persistent JSON message and wait for the confirm.
    pub async fn publish_record(&self, record: ContentRecord) -> Result<(), PublishError> {
        let body = RecordUpdated::new(record, Utc::now()).to_json()?;
        self.bus
            .publish(OutboundMessage {
                exchange: self.exchange.clone(),
                routing_key: self.routing_key.clone(),
                content_type: JSON_CONTENT_TYPE,
                persistent: true,
                body,
            })
            .await
    }
}
