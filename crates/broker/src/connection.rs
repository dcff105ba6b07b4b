//! Connection setup shared by the publisher, the relay, and the worker.

use lapin::options::{ExchangeDeclareOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::config::BrokerConfig;
use crate::error::BrokerError;

/// Reply code for a normal channel or connection close.
pub const REPLY_SUCCESS: u16 = 200;

/// Open a connection, bounded by the configured connect timeout.
pub async fn connect(config: &BrokerConfig) -> Result<Connection, BrokerError> {
    let uri = config.amqp_uri();
    let connecting = Connection::connect(&uri, ConnectionProperties::default());
    match tokio::time::timeout(config.connect_timeout(), connecting).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(BrokerError::ConnectTimeout {
            secs: config.connect_timeout_secs,
        }),
    }
}

/// Declare `queue` as durable. Idempotent on the broker side.
pub async fn declare_durable_queue(channel: &Channel, queue: &str) -> Result<(), BrokerError> {
    channel
        .queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    Ok(())
}

/// Declare the durable fanout exchange used for broadcast relay.
pub async fn declare_fanout_exchange(
    channel: &Channel,
    exchange: &str,
) -> Result<(), BrokerError> {
    channel
        .exchange_declare(
            exchange,
            ExchangeKind::Fanout,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    Ok(())
}
