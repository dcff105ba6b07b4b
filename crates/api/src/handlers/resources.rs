//! Handlers for derived resources.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use courier_core::error::CoreError;
use courier_core::types::DbId;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/resources/{id}
pub async fn get_resource(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let resource = state
        .jobs
        .find_resource(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Resource",
            id,
        }))?;
    Ok(Json(DataResponse { data: resource }))
}
