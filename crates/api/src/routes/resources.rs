use axum::routing::get;
use axum::Router;

use crate::handlers::resources;
use crate::state::AppState;

/// Routes mounted at `/resources`.
///
/// ```text
/// GET    /{id}            -> get_resource
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}", get(resources::get_resource))
}
