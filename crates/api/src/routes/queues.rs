use axum::routing::get;
use axum::Router;

use crate::handlers::queues;
use crate::state::AppState;

/// Routes mounted at `/queues`.
///
/// ```text
/// GET    /traffic         -> queue_traffic
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/traffic", get(queues::queue_traffic))
}
