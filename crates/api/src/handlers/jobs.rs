//! Handlers for the `/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use courier_core::error::CoreError;
use courier_core::job_kind::JobKind;
use courier_core::types::DbId;
use courier_db::models::job::JobListQuery;

use crate::engine::dispatcher::{self, DispatchOutcome};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{kind}
///
/// Validate the payload, create the job and dispatch it. Returns 201 with the
/// job once its worker has it (for ingestion, once the service answered
/// successfully). A job that was created but could not be dispatched yields
/// 502 carrying its id.
pub async fn submit_job(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> AppResult<impl IntoResponse> {
    let kind: JobKind = kind.parse()?;

    match dispatcher::dispatch(&state, kind, &payload).await? {
        DispatchOutcome::Dispatched(job) => {
            tracing::info!(job_id = job.id, %kind, status = %job.status, "Job dispatched");
            Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
        }
        DispatchOutcome::Failed(job) => Err(AppError::DispatchFailed {
            job_id: job.id,
            message: job
                .error_message
                .unwrap_or_else(|| "Dispatch failed".to_string()),
        }),
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Newest first. Filters: `kind`, `status`; paging: `limit`, `offset`.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = state.jobs.list_jobs(&params).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let job = state
        .jobs
        .find_job(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Job", id }))?;
    Ok(Json(DataResponse { data: job }))
}
