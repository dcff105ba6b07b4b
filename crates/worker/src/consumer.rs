//! Consume loop for the results queue.
//!
//! One connection and channel are held for the consumer's lifetime. The
//! in-flight delivery is always settled before cancellation is observed.

use std::time::Duration;

use courier_broker::connection::{self, REPLY_SUCCESS};
use courier_broker::BrokerError;
use futures::StreamExt;
use lapin::message::Delivery;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicQosOptions, BasicRejectOptions,
};
use lapin::types::FieldTable;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::handler::{HandleOutcome, RejectReason, ResultHandler};
use crate::settle::{settle, Attempts, Settlement};

/// Consumer tag announced to the broker.
const CONSUMER_TAG: &str = "courier-worker";

/// Delay before reconnecting after the consumer loses the broker.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Consume until cancelled, reconnecting after broker failures.
pub async fn run(config: &WorkerConfig, handler: &ResultHandler, cancel: &CancellationToken) {
    loop {
        match consume(config, handler, cancel).await {
            Ok(()) => break,
            Err(e) => tracing::error!(error = %e, "Results consumer disconnected"),
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
        }
    }
}

/// One connection's worth of consuming. Returns `Ok(())` on cancellation.
pub async fn consume(
    config: &WorkerConfig,
    handler: &ResultHandler,
    cancel: &CancellationToken,
) -> Result<(), BrokerError> {
    let queue = &config.broker.queues.results;

    let conn = connection::connect(&config.broker).await?;
    let channel = conn.create_channel().await?;
    channel
        .basic_qos(config.consumer.prefetch, BasicQosOptions::default())
        .await?;
    connection::declare_durable_queue(&channel, queue).await?;

    let mut consumer = channel
        .basic_consume(
            queue,
            CONSUMER_TAG,
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    tracing::info!(
        queue = %queue,
        prefetch = config.consumer.prefetch,
        max_retries = config.consumer.max_retries,
        "Results consumer started",
    );

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = consumer.next() => next,
        };

        let Some(delivery) = next else {
            return Err(BrokerError::ConsumerClosed);
        };
        let delivery = delivery?;

        let outcome = match tokio::time::timeout(
            config.consumer.timeout(),
            handler.handle(&delivery.data),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(
                    delivery_tag = delivery.delivery_tag,
                    timeout_secs = config.consumer.timeout_secs,
                    "Result processing timed out",
                );
                HandleOutcome::Rejected(RejectReason::Transient("processing timed out".into()))
            }
        };

        let attempts = Attempts::from_delivery(
            delivery.properties.headers().as_ref(),
            delivery.redelivered,
        );
        let settlement = settle(&outcome, attempts, config.consumer.max_retries);
        apply(&delivery, settlement).await?;

        tracing::debug!(
            delivery_tag = delivery.delivery_tag,
            ?attempts,
            ?settlement,
            "Delivery settled",
        );
    }

    if let Err(e) = conn.close(REPLY_SUCCESS, "shutdown").await {
        tracing::debug!(error = %e, "Failed to close consumer connection");
    }
    tracing::info!("Results consumer stopped");
    Ok(())
}

async fn apply(delivery: &Delivery, settlement: Settlement) -> Result<(), BrokerError> {
    match settlement {
        Settlement::Ack => {
            delivery.acker.ack(BasicAckOptions::default()).await?;
        }
        Settlement::Reject => {
            tracing::warn!(delivery_tag = delivery.delivery_tag, "Rejecting delivery");
            delivery
                .acker
                .reject(BasicRejectOptions { requeue: false })
                .await?;
        }
        Settlement::Requeue => {
            tracing::warn!(delivery_tag = delivery.delivery_tag, "Requeueing delivery");
            delivery
                .acker
                .nack(BasicNackOptions {
                    requeue: true,
                    ..BasicNackOptions::default()
                })
                .await?;
        }
    }
    Ok(())
}
