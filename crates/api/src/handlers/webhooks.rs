//! Worker callbacks.
//!
//! Both endpoints authenticate with an HMAC-SHA256 signature in the
//! `X-Courier-Signature` header. The results callback signs the raw body,
//! which names its conversation. The status webhook signs the job kind and
//! id from the path together with the body (see
//! [`signing::status_webhook_input`]), so a report cannot be replayed
//! against another job. Authentication happens before the body is parsed,
//! so an unsigned request never touches state.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use courier_core::error::CoreError;
use courier_core::job_kind::JobKind;
use courier_core::results::ResultMessage;
use courier_core::signing::{self, Signer, SIGNATURE_HEADER};
use courier_core::types::DbId;
use courier_worker::{HandleOutcome, RejectReason};
use serde::{Deserialize, Serialize};

use crate::engine::status::{self, StatusUpdate};
use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Reject the request unless its signature header matches `signed`.
fn authenticate(signer: &Signer, headers: &HeaderMap, signed: &[u8]) -> AppResult<()> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Missing webhook signature".to_string(),
            ))
        })?;

    if !signer.verify(signed, signature) {
        tracing::warn!(bytes = signed.len(), "Webhook signature mismatch");
        return Err(AppError::Core(CoreError::Unauthorized(
            "Invalid webhook signature".to_string(),
        )));
    }
    Ok(())
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> AppResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::Unprocessable(format!("Invalid webhook body: {e}")))
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// POST /api/v1/webhooks/{kind}/{id}/status
///
/// Body: `{"status": "success" | "fail", "details": {...}}`, signed together
/// with `{kind}/{id}`. Returns 200 with the updated job.
pub async fn update_status(
    State(state): State<AppState>,
    Path((kind, job_id)): Path<(String, DbId)>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    authenticate(
        &state.signer,
        &headers,
        &signing::status_webhook_input(&kind, job_id, &body),
    )?;

    let kind = kind
        .parse::<JobKind>()
        .ok()
        .filter(|kind| kind.accepts_webhooks())
        .ok_or_else(|| AppError::NotFound(format!("No status webhook for job kind '{kind}'")))?;

    let update: StatusUpdate = parse_body(&body)?;
    let job = status::apply_status(&state, kind, job_id, &update).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Body of `POST /webhooks/results`: the same result a worker could publish
/// to the results queue, under HTTP field names.
#[derive(Debug, Deserialize)]
pub struct ResultsCallback {
    pub conversation_id: DbId,
    pub ai_content: String,
    #[serde(default)]
    pub ai_content_base_model: Option<String>,
    #[serde(default)]
    pub result_id: Option<String>,
}

impl From<ResultsCallback> for ResultMessage {
    fn from(body: ResultsCallback) -> Self {
        ResultMessage {
            conversation_id: body.conversation_id,
            result: body.ai_content,
            result_base_model: body.ai_content_base_model,
            result_id: body.result_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResultsAccepted {
    pub conversation_id: DbId,
    pub message_ids: Vec<DbId>,
    pub duplicate: bool,
}

/// POST /api/v1/webhooks/results
///
/// Synchronous counterpart of the results queue. Returns 200 once the
/// messages are stored and broadcast, or immediately for a known
/// `result_id`.
pub async fn results_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    authenticate(&state.signer, &headers, &body)?;

    let callback: ResultsCallback = parse_body(&body)?;

    let accepted = match state.results.process(callback.into()).await {
        HandleOutcome::Processed {
            conversation_id,
            message_ids,
        } => ResultsAccepted {
            conversation_id,
            message_ids,
            duplicate: false,
        },
        HandleOutcome::Duplicate { conversation_id } => ResultsAccepted {
            conversation_id,
            message_ids: Vec::new(),
            duplicate: true,
        },
        HandleOutcome::Rejected(RejectReason::UnknownConversation(id)) => {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Conversation",
                id,
            }));
        }
        HandleOutcome::Rejected(RejectReason::Malformed(reason)) => {
            return Err(AppError::Unprocessable(reason));
        }
        HandleOutcome::Rejected(RejectReason::Transient(reason)) => {
            return Err(AppError::InternalError(reason));
        }
    };

    Ok(Json(DataResponse { data: accepted }))
}
