use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use courier_core::types::Timestamp;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing control frames to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// The broadcast topic this connection listens to.
    pub topic: String,
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Registry of active WebSocket connections.
///
/// Topic events reach a connection through its broadcaster subscription.
/// The manager channel only carries control frames (heartbeat pings and the
/// shutdown close).
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection subscribed to `topic`.
    ///
    /// Returns the receiver half of the control channel.
    pub async fn add(&self, conn_id: String, topic: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            topic,
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Number of connections subscribed to `topic`.
    pub async fn topic_connection_count(&self, topic: &str) -> usize {
        self.connections
            .read()
            .await
            .values()
            .filter(|conn| conn.topic == topic)
            .count()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
