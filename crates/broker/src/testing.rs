//! In-process [`QueuePublisher`] for tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::BrokerError;
use crate::publisher::QueuePublisher;

/// A message captured by [`RecordingPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub queue: String,
    pub body: Vec<u8>,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Records every publish. With [`RecordingPublisher::set_down`] it behaves
/// like an unreachable broker and records nothing.
#[derive(Default)]
pub struct RecordingPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    down: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl QueuePublisher for RecordingPublisher {
    async fn publish(&self, queue: &str, body: &[u8]) -> Result<(), BrokerError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BrokerError::ConnectTimeout { secs: 0 });
        }
        self.published.lock().await.push(PublishedMessage {
            queue: queue.to_string(),
            body: body.to_vec(),
        });
        Ok(())
    }

    async fn ping(&self) -> Result<(), BrokerError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BrokerError::ConnectTimeout { secs: 0 });
        }
        Ok(())
    }
}
