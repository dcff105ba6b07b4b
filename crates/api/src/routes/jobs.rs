//! Route definitions for the `/jobs` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                -> list_jobs
/// GET    /{id}            -> get_job
/// POST   /{kind}          -> submit_job
/// ```
///
/// `/{id}` and `/{kind}` share a path segment; the method tells them apart.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs))
        .route("/{key}", get(jobs::get_job).post(jobs::submit_job))
}
