//! Handlers for queue introspection.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use courier_broker::IntrospectError;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/queues/traffic
///
/// Live depth of every monitored queue (both dispatch queues and the results
/// queue), read from the management API on each call.
pub async fn queue_traffic(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let queues = state.config.broker.queues.monitored();
    let traffic = state
        .introspector
        .traffic_snapshot(&queues)
        .await
        .map_err(|e| match e {
            IntrospectError::QueueNotFound(_) => AppError::NotFound(e.to_string()),
            other => AppError::BadGateway(other.to_string()),
        })?;
    Ok(Json(DataResponse { data: traffic }))
}
