//! Synchronous proxy to the document-ingestion service.
//!
//! Ingestion jobs skip the broker. The service is called inline and its
//! answer drives the job through its whole lifecycle:
//!
//! - transport error (connect, timeout): `pending -> failed`
//! - any HTTP response: `pending -> in_progress`, then
//!   - 2xx: `in_progress -> done` with a `knowledge_base` resource, or
//!     `in_progress -> failed` if the resource cannot be stored
//!   - otherwise: `in_progress -> failed` with the response body

use courier_core::job_status::JobStatus;
use courier_core::payloads::{self, IngestionPayload};
use courier_core::types::DbId;
use courier_db::models::job::Job;
use courier_db::models::resource::NewResource;
use serde::Serialize;

use crate::config::IngestionConfig;
use crate::engine::dispatcher::{lost, DispatchOutcome};
use crate::engine::transition;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Header carrying the ingestion service credential.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Longest response body kept as a job's `error_message`.
const MAX_ERROR_BODY: usize = 2000;

/// Request body sent to the ingestion service.
#[derive(Debug, Serialize)]
struct IngestionRequest<'a> {
    job_id: DbId,
    file_references: &'a [String],
    clinician_type_id: DbId,
}

/// The service's answer, whatever its status.
#[derive(Debug, Clone)]
pub struct IngestionResponse {
    pub status: u16,
    pub body: String,
}

impl IngestionResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client for the ingestion service.
pub struct IngestionProxy {
    client: reqwest::Client,
    url: String,
    api_key: String,
}

impl IngestionProxy {
    pub fn new(config: &IngestionConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// POST one ingestion request. Only transport failures are `Err`.
    pub async fn submit(
        &self,
        job_id: DbId,
        payload: &IngestionPayload,
    ) -> Result<IngestionResponse, reqwest::Error> {
        let request = IngestionRequest {
            job_id,
            file_references: &payload.file_references,
            clinician_type_id: payload.clinician_type_id,
        };

        let response = self
            .client
            .post(&self.url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(IngestionResponse { status, body })
    }
}

/// Run a freshly created ingestion job to completion.
pub async fn ingest(state: &AppState, job: Job) -> AppResult<DispatchOutcome> {
    let payload: IngestionPayload = serde_json::from_value(job.payload.clone())
        .map_err(|e| AppError::InternalError(format!("Stored ingestion payload is invalid: {e}")))?;

    let response = match state.ingestion.submit(job.id, &payload).await {
        Ok(response) => response,
        Err(e) => {
            let reason = format!("Ingestion service unreachable: {e}");
            tracing::error!(job_id = job.id, error = %e, "Ingestion request failed");
            let failed = transition::transition(
                state,
                &job,
                JobStatus::Failed,
                Some(&reason),
                "ingestion_unreachable",
            )
            .await?
            .ok_or_else(|| lost(&job))?;
            return Ok(DispatchOutcome::Failed(failed));
        }
    };

    tracing::debug!(job_id = job.id, status = response.status, "Ingestion service responded");

    let running = transition::transition(
        state,
        &job,
        JobStatus::InProgress,
        None,
        "ingestion_responded",
    )
    .await?
    .ok_or_else(|| lost(&job))?;

    if response.is_success() {
        let details = parse_body(&response.body);
        let resource = NewResource {
            resource_kind: running.job_kind.resource_kind().to_string(),
            name: payloads::resource_name(running.job_kind, running.id, &running.payload),
            attributes: payloads::merge_attributes(&running.payload, Some(&details)),
        };
        match transition::complete(state, &running, &resource, "ingestion_succeeded").await {
            Ok(Some((done, _))) => Ok(DispatchOutcome::Dispatched(done)),
            Ok(None) => Err(lost(&running)),
            Err(e) => {
                // Nothing else can move an ingestion job out of `in_progress`.
                tracing::error!(job_id = running.id, error = %e, "Failed to record ingestion result");
                let reason = format!("Failed to record ingestion result: {e}");
                match transition::transition(
                    state,
                    &running,
                    JobStatus::Failed,
                    Some(&reason),
                    "ingestion_unrecorded",
                )
                .await
                {
                    Ok(Some(failed)) => Ok(DispatchOutcome::Failed(failed)),
                    _ => Err(e.into()),
                }
            }
        }
    } else {
        let reason = error_message(&response);
        let failed = transition::transition(
            state,
            &running,
            JobStatus::Failed,
            Some(&reason),
            "ingestion_rejected",
        )
        .await?
        .ok_or_else(|| lost(&running))?;
        Ok(DispatchOutcome::Failed(failed))
    }
}

/// JSON bodies become resource attributes as-is; anything else is kept as a
/// string.
fn parse_body(body: &str) -> serde_json::Value {
    if body.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(body).unwrap_or_else(|_| serde_json::Value::String(body.to_string()))
}

fn error_message(response: &IngestionResponse) -> String {
    let body = response.body.trim();
    if body.is_empty() {
        return format!("Ingestion service returned HTTP {}", response.status);
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}
