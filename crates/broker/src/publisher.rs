//! Publishing signed work items to durable queues.
//!
//! [`AmqpPublisher`] opens a fresh connection and channel for every publish
//! and closes both afterwards, so request handlers never share broker state.
//! Messages are persistent (`delivery_mode = 2`) and a publish only succeeds
//! once the broker has confirmed it.

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::BasicProperties;

use crate::config::BrokerConfig;
use crate::connection::{self, REPLY_SUCCESS};
use crate::error::BrokerError;

/// AMQP delivery mode for messages that survive a broker restart.
pub const PERSISTENT: u8 = 2;

/// Content type of every work item.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Publishes a message body to a named durable queue.
#[async_trait]
pub trait QueuePublisher: Send + Sync {
    /// Returns once the broker has confirmed the message.
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError>;

    /// Confirm the broker accepts connections.
    async fn ping(&self) -> Result<(), BrokerError>;
}

/// [`QueuePublisher`] over a per-call AMQP connection.
#[derive(Debug, Clone)]
pub struct AmqpPublisher {
    config: BrokerConfig,
}

impl AmqpPublisher {
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl QueuePublisher for AmqpPublisher {
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError> {
        let conn = connection::connect(&self.config).await?;
        let result = publish_on(&conn, queue, body).await;

        if let Err(e) = conn.close(REPLY_SUCCESS, "publish complete").await {
            tracing::debug!(error = %e, "Failed to close publisher connection");
        }

        result
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        let conn = connection::connect(&self.config).await?;
        conn.close(REPLY_SUCCESS, "health check").await?;
        Ok(())
    }
}

async fn publish_on(
    conn: &lapin::Connection,
    queue: &str,
    body: &[u8],
) -> Result<(), BrokerError> {
    let channel = conn.create_channel().await?;
    channel
        .confirm_select(ConfirmSelectOptions::default())
        .await?;
    connection::declare_durable_queue(&channel, queue).await?;

    let properties = BasicProperties::default()
        .with_delivery_mode(PERSISTENT)
        .with_content_type(CONTENT_TYPE_JSON.into());

    let confirmation = channel
        .basic_publish(
            "",
            queue,
            BasicPublishOptions::default(),
            body,
            properties,
        )
        .await?
        .await?;

    if confirmation.is_nack() {
        return Err(BrokerError::Nacked {
            queue: queue.to_string(),
        });
    }

    tracing::debug!(queue, bytes = body.len(), "Message published");
    Ok(())
}
