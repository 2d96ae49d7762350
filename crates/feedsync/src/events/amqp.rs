//! RabbitMQ message bus over lapin.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};
use tracing::instrument;

use super::PublishError;
use super::publisher::{MessageBus, OutboundMessage};

const PERSISTENT_DELIVERY: u8 = 2;

/// A confirm-mode channel on one AMQP connection.
///
/// The exchange is declared durable and of kind `topic` at connect time.
pub struct LapinBus {
    connection: Connection,
    channel: Channel,
}

impl LapinBus {
    pub async fn connect(uri: &str, exchange: &str) -> Result<Self, PublishError> {
        let connection = Connection::connect(uri, ConnectionProperties::default())
            .await
            .map_err(|e| PublishError::Broker(format!("amqp connect: {e}")))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| PublishError::Broker(format!("amqp channel: {e}")))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|e| PublishError::Broker(format!("amqp confirm mode: {e}")))?;
        channel
            .exchange_declare(
                exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| PublishError::Broker(format!("amqp declare {exchange}: {e}")))?;

        tracing::info!(exchange, "connected to message bus");
        Ok(Self {
            connection,
            channel,
        })
    }

    /// Close the channel, then the connection.
    pub async fn close(&self) -> Result<(), PublishError> {
        self.channel
            .close(200, "shutdown")
            .await
            .map_err(|e| PublishError::Broker(format!("amqp channel close: {e}")))?;
        self.connection
            .close(200, "shutdown")
            .await
            .map_err(|e| PublishError::Broker(format!("amqp close: {e}")))
    }
}

fn properties(message: &OutboundMessage) -> BasicProperties {
    let properties = BasicProperties::default().with_content_type(message.content_type.into());
    if message.persistent {
        properties.with_delivery_mode(PERSISTENT_DELIVERY)
    } else {
        properties
    }
}

#[async_trait]
impl MessageBus for LapinBus {
    #[instrument(level = "debug", skip(self, message), fields(exchange = %message.exchange, routing_key = %message.routing_key))]
    async fn publish(&self, message: OutboundMessage) -> Result<(), PublishError> {
        let confirm = self
            .channel
            .basic_publish(
                &message.exchange,
                &message.routing_key,
                BasicPublishOptions::default(),
                &message.body,
                properties(&message),
            )
            .await
            .map_err(|e| PublishError::Broker(format!("amqp publish: {e}")))?;

        let confirmation = confirm
            .await
            .map_err(|e| PublishError::Broker(format!("amqp confirm: {e}")))?;
        if confirmation.is_nack() {
            return Err(PublishError::Nacked {
                exchange: message.exchange,
                routing_key: message.routing_key,
            });
        }
        Ok(())
    }
}
