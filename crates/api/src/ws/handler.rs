use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use courier_core::topics;
use courier_events::{BroadcastEvent, Broadcaster};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::ws::manager::WsManager;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub topic: String,
}

/// GET /api/v1/ws?topic=<topic>
///
/// Upgrades to a WebSocket that receives every event published on `topic`
/// from now on, as JSON text frames.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> AppResult<impl IntoResponse> {
    let topic = validate_topic(query.topic)?;

    // Subscribe before the upgrade so nothing published after the handshake
    // is missed.
    let events = state.broadcaster.subscribe(&topic);
    let manager = Arc::clone(&state.ws_manager);
    let broadcaster = Arc::clone(&state.broadcaster);

    Ok(ws.on_upgrade(move |socket| {
        handle_socket(socket, manager, broadcaster, topic, events)
    }))
}

/// Reject topics no publisher will ever use.
pub fn validate_topic(topic: String) -> AppResult<String> {
    let topic = topic.trim().to_string();
    if topics::is_known_topic(&topic) {
        Ok(topic)
    } else {
        Err(AppError::BadRequest(format!("Unknown topic '{topic}'")))
    }
}

async fn handle_socket(
    socket: WebSocket,
    ws_manager: Arc<WsManager>,
    broadcaster: Arc<Broadcaster>,
    topic: String,
    mut events: broadcast::Receiver<BroadcastEvent>,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, topic = %topic, "WebSocket connected");

    let mut control = ws_manager.add(conn_id.clone(), topic.clone()).await;

    let (mut sink, mut stream) = socket.split();

    // Sender task: control frames from the manager, events from the topic.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                ctl = control.recv() => match ctl {
                    Some(msg) => msg,
                    None => break,
                },
                event = events.recv() => match event {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => Message::Text(json.into()),
                        Err(e) => {
                            tracing::error!(conn_id = %sender_conn_id, error = %e, "Failed to encode event");
                            continue;
                        }
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(conn_id = %sender_conn_id, skipped, "WebSocket subscriber lagged");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };

            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    // Inbound frames are ignored apart from close and pong.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    // The receiver lives in the send task; wait for it to drop.
    let _ = send_task.await;
    broadcaster.release(&topic);
    tracing::info!(conn_id = %conn_id, topic = %topic, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn accepts_conversation_and_status_topics() {
        assert_eq!(validate_topic(" conversation_7 ".into()).unwrap(), "conversation_7");
        assert_eq!(validate_topic("job_status_install".into()).unwrap(), "job_status_install");
    }

    #[test]
    fn rejects_unknown_topics() {
        assert_matches!(validate_topic("everything".into()), Err(AppError::BadRequest(_)));
    }
}
