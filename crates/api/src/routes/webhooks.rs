//! Route definitions for worker callbacks.
//!
//! These endpoints authenticate by request signature, not by user session.

use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// ```text
/// POST   /results                 -> results_callback
/// POST   /{kind}/{id}/status      -> update_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/results", post(webhooks::results_callback))
        .route("/{kind}/{id}/status", post(webhooks::update_status))
}
