//! Cross-process broadcast relay over a fanout exchange.
//!
//! The results worker runs in its own process, so it cannot reach the API
//! server's in-process [`Broadcaster`]. It publishes through an
//! [`ExchangeSink`] instead, and the API server runs [`run_relay`] to feed
//! every event on the exchange into its local broadcaster.

use std::sync::Arc;
use std::time::Duration;

use courier_events::{BroadcastEvent, Broadcaster, EventSink, TopicEvent};
use futures::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::BasicProperties;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::BrokerConfig;
use crate::connection::{self, REPLY_SUCCESS};
use crate::error::BrokerError;
use crate::publisher::CONTENT_TYPE_JSON;

/// Events buffered between the sink and its forwarding task.
const SINK_BUFFER: usize = 1024;

/// Delay before reconnecting after the relay loses the broker.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// ExchangeSink
// ---------------------------------------------------------------------------

/// [`EventSink`] that forwards events to the broadcast exchange.
///
/// `publish` only enqueues; a background task owns the broker connection.
/// When the buffer is full the event is dropped with a warning.
#[derive(Clone)]
pub struct ExchangeSink {
    tx: mpsc::Sender<TopicEvent>,
}

impl ExchangeSink {
    /// Create the sink and spawn its forwarding task.
    pub fn spawn(config: BrokerConfig, cancel: CancellationToken) -> Self {
        let (tx, rx) = mpsc::channel(SINK_BUFFER);
        tokio::spawn(forward_to_exchange(config, rx, cancel));
        Self { tx }
    }
}

impl EventSink for ExchangeSink {
    fn publish(&self, topic: &str, event: BroadcastEvent) {
        if let Err(e) = self.tx.try_send(TopicEvent::new(topic, event)) {
            tracing::warn!(topic, error = %e, "Dropping broadcast event");
        }
    }
}

async fn forward_to_exchange(
    config: BrokerConfig,
    mut rx: mpsc::Receiver<TopicEvent>,
    cancel: CancellationToken,
) {
    let mut link: Option<(lapin::Connection, lapin::Channel)> = None;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let body = match serde_json::to_vec(&event) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!(topic = %event.topic, error = %e, "Failed to serialize event");
                continue;
            }
        };

        if link.is_none() {
            match open_exchange_channel(&config).await {
                Ok(opened) => link = Some(opened),
                Err(e) => {
                    tracing::warn!(topic = %event.topic, error = %e, "Broadcast exchange unavailable, event dropped");
                    continue;
                }
            }
        }

        if let Some((_, ch)) = &link {
            let published = ch
                .basic_publish(
                    &config.broadcast_exchange,
                    "",
                    BasicPublishOptions::default(),
                    &body,
                    BasicProperties::default().with_content_type(CONTENT_TYPE_JSON.into()),
                )
                .await;
            if let Err(e) = published {
                tracing::warn!(topic = %event.topic, error = %e, "Failed to relay event, reconnecting");
                link = None;
            }
        }
    }

    if let Some((conn, _)) = link {
        let _ = conn.close(REPLY_SUCCESS, "shutdown").await;
    }
    tracing::info!("Broadcast forwarder stopped");
}

async fn open_exchange_channel(
    config: &BrokerConfig,
) -> Result<(lapin::Connection, lapin::Channel), BrokerError> {
    let conn = connection::connect(config).await?;
    let channel = conn.create_channel().await?;
    connection::declare_fanout_exchange(&channel, &config.broadcast_exchange).await?;
    Ok((conn, channel))
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// Feed events from the broadcast exchange into `broadcaster` until
/// cancelled, reconnecting after broker failures.
pub async fn run_relay(
    config: BrokerConfig,
    broadcaster: Arc<Broadcaster>,
    cancel: CancellationToken,
) {
    tracing::info!(exchange = %config.broadcast_exchange, "Broadcast relay started");

    loop {
        match relay_once(&config, &broadcaster, &cancel).await {
            Ok(()) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Broadcast relay disconnected");
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }

    tracing::info!("Broadcast relay stopped");
}

async fn relay_once(
    config: &BrokerConfig,
    broadcaster: &Broadcaster,
    cancel: &CancellationToken,
) -> Result<(), BrokerError> {
    let conn = connection::connect(config).await?;
    let channel = conn.create_channel().await?;
    connection::declare_fanout_exchange(&channel, &config.broadcast_exchange).await?;

    let queue = channel
        .queue_declare(
            "",
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
    channel
        .queue_bind(
            queue.name().as_str(),
            &config.broadcast_exchange,
            "",
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;

    let mut consumer = channel
        .basic_consume(
            queue.name().as_str(),
            "courier-relay",
            BasicConsumeOptions {
                no_ack: true,
                ..BasicConsumeOptions::default()
            },
            FieldTable::default(),
        )
        .await?;

    loop {
        let delivery = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = conn.close(REPLY_SUCCESS, "shutdown").await;
                return Ok(());
            }
            delivery = consumer.next() => delivery,
        };

        let Some(delivery) = delivery else {
            return Err(BrokerError::ConsumerClosed);
        };
        let delivery = delivery?;

        match serde_json::from_slice::<TopicEvent>(&delivery.data) {
            Ok(TopicEvent { topic, event }) => {
                broadcaster.publish(&topic, event);
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring malformed relayed event"),
        }
    }
}
