//! Liveness and dependency health.

use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when every dependency answers, `degraded` otherwise.
    pub status: &'static str,
    pub version: &'static str,
    pub db_healthy: bool,
    /// Whether the message broker accepts connections.
    pub broker_healthy: bool,
    /// Open WebSocket subscriptions on this instance.
    pub ws_connections: usize,
}

/// GET /health
///
/// Always 200; a failing dependency shows up as `degraded`. The database and
/// broker are probed concurrently.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (db, broker) = tokio::join!(state.jobs.ping(), state.publisher.ping());

    if let Err(e) = &broker {
        tracing::warn!(error = %e, "Broker health probe failed");
    }
    let db_healthy = db.is_ok();
    let broker_healthy = broker.is_ok();

    Json(HealthResponse {
        status: if db_healthy && broker_healthy {
            "ok"
        } else {
            "degraded"
        },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        broker_healthy,
        ws_connections: state.ws_manager.connection_count().await,
    })
}

/// Mounted at the root, outside `/api/v1`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
