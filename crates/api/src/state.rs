use std::sync::Arc;

use courier_broker::{QueueIntrospector, QueuePublisher};
use courier_core::signing::Signer;
use courier_db::{ConversationStore, JobStore};
use courier_events::Broadcaster;
use courier_worker::ResultHandler;

use crate::config::ServerConfig;
use crate::engine::ingestion::IngestionProxy;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (every field is behind an `Arc`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Job and derived-resource persistence.
    pub jobs: Arc<dyn JobStore>,
    /// Conversation lookup and message appends for the results callback.
    pub conversations: Arc<dyn ConversationStore>,
    /// Publishes signed work items to dispatch queues.
    pub publisher: Arc<dyn QueuePublisher>,
    pub signer: Arc<Signer>,
    /// Topic fan-out for job status and conversation events.
    pub broadcaster: Arc<Broadcaster>,
    pub introspector: Arc<QueueIntrospector>,
    pub ingestion: Arc<IngestionProxy>,
    /// Shared with the results queue consumer; backs `POST /webhooks/results`.
    pub results: Arc<ResultHandler>,
    /// WebSocket connection manager.
    pub ws_manager: Arc<WsManager>,
}
