/// Errors from the AMQP layer.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// The broker did not accept a connection within the configured timeout.
    #[error("Timed out connecting to the broker after {secs}s")]
    ConnectTimeout { secs: u64 },

    /// Any protocol or I/O failure reported by the AMQP client.
    #[error("AMQP error: {0}")]
    Amqp(#[from] lapin::Error),

    /// The consumer stream ended without a cancellation request.
    #[error("Consumer stream closed by the broker")]
    ConsumerClosed,

    /// The broker negatively acknowledged a published message.
    #[error("Broker rejected the message published to '{queue}'")]
    Nacked { queue: String },
}
