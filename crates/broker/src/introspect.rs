//! Queue depth from the RabbitMQ management API.
//!
//! Every snapshot builds a fresh HTTP client and queries each queue live.
//! Nothing is cached, so readings reflect the broker at call time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::BrokerConfig;

/// Request timeout for management API calls.
const MANAGEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Depth and consumer count of one queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueTraffic {
    pub queue: String,
    pub messages_ready: u64,
    pub messages_unacknowledged: u64,
    pub consumers: u64,
}

/// Subset of the management API's queue object.
///
/// Message counters are absent until the broker has collected stats for a
/// freshly declared queue, so they default to zero.
#[derive(Debug, Deserialize)]
struct ManagementQueue {
    #[serde(default)]
    messages_ready: u64,
    #[serde(default)]
    messages_unacknowledged: u64,
    #[serde(default)]
    consumers: u64,
}

/// Errors from the management API.
#[derive(Debug, thiserror::Error)]
pub enum IntrospectError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("Management API request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The broker does not know the queue.
    #[error("Queue '{0}' not found")]
    QueueNotFound(String),

    /// Any other non-2xx response.
    #[error("Management API error ({status}): {body}")]
    Api { status: u16, body: String },
}

/// Reads queue depth through the management plugin.
#[derive(Clone)]
pub struct QueueIntrospector {
    base_url: String,
    vhost: String,
    user: String,
    password: String,
}

impl QueueIntrospector {
    pub fn new(
        base_url: impl Into<String>,
        vhost: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            vhost: vhost.into(),
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn from_config(config: &BrokerConfig) -> Self {
        Self::new(
            config.management_url.clone(),
            config.vhost.clone(),
            config.user.clone(),
            config.password.clone(),
        )
    }

    /// Current traffic of each queue in `queues`, in order.
    pub async fn traffic_snapshot(
        &self,
        queues: &[String],
    ) -> Result<Vec<QueueTraffic>, IntrospectError> {
        let client = reqwest::Client::builder()
            .timeout(MANAGEMENT_TIMEOUT)
            .build()?;

        let mut snapshot = Vec::with_capacity(queues.len());
        for queue in queues {
            snapshot.push(self.queue_traffic(&client, queue).await?);
        }
        Ok(snapshot)
    }

    async fn queue_traffic(
        &self,
        client: &reqwest::Client,
        queue: &str,
    ) -> Result<QueueTraffic, IntrospectError> {
        let response = client
            .get(self.queue_url(queue))
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(IntrospectError::QueueNotFound(queue.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IntrospectError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let stats: ManagementQueue = response.json().await?;
        Ok(QueueTraffic {
            queue: queue.to_string(),
            messages_ready: stats.messages_ready,
            messages_unacknowledged: stats.messages_unacknowledged,
            consumers: stats.consumers,
        })
    }

    fn queue_url(&self, queue: &str) -> String {
        format!(
            "{}/api/queues/{}/{}",
            self.base_url,
            urlencoding::encode(&self.vhost),
            urlencoding::encode(queue),
        )
    }
}

impl std::fmt::Debug for QueueIntrospector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueIntrospector")
            .field("base_url", &self.base_url)
            .field("vhost", &self.vhost)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}
