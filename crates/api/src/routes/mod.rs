pub mod health;
pub mod jobs;
pub mod queues;
pub mod resources;
pub mod webhooks;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws?topic=<topic>                    WebSocket topic subscription
///
/// /jobs                                list
/// /jobs/{kind}                         dispatch (POST)
/// /jobs/{id}                           get
///
/// /resources/{id}                      get
///
/// /webhooks/{kind}/{id}/status         worker status report (POST, signed)
/// /webhooks/results                    inference result (POST, signed)
///
/// /queues/traffic                      live queue depth
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // WebSocket endpoint.
        .route("/ws", get(ws::ws_handler))
        // Job dispatch and polling.
        .nest("/jobs", jobs::router())
        // Resources derived from completed jobs.
        .nest("/resources", resources::router())
        // Signed worker callbacks.
        .nest("/webhooks", webhooks::router())
        // Broker queue introspection.
        .nest("/queues", queues::router())
}
