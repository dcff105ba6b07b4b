//! Job dispatch.
//!
//! A job is validated, created in `pending`, and handed to its worker right
//! away. Queued kinds publish a signed work item and move to `in_progress`
//! once the broker confirms it; a failed publish moves the job straight to
//! `failed`. Nothing is retried here.
//!
//! The message is published before the status change commits. A crash in
//! between leaves a queued message for a `pending` job, which the worker's
//! webhook then cannot advance; a job is never `in_progress` without a
//! message.

use courier_core::job_kind::JobKind;
use courier_core::job_status::JobStatus;
use courier_core::payloads;
use courier_core::signing;
use courier_db::models::job::Job;

use crate::engine::ingestion;
use crate::engine::transition;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Result of a dispatch attempt for a job that was created.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The worker accepted the job.
    Dispatched(Job),
    /// The job was created but ended up `failed`; `error_message` says why.
    Failed(Job),
}

impl DispatchOutcome {
    pub fn job(&self) -> &Job {
        match self {
            DispatchOutcome::Dispatched(job) | DispatchOutcome::Failed(job) => job,
        }
    }
}

/// Validate `raw`, create the job, and dispatch it.
///
/// Validation failures return `Err` before anything is written.
pub async fn dispatch(
    state: &AppState,
    kind: JobKind,
    raw: &serde_json::Value,
) -> AppResult<DispatchOutcome> {
    let payload = payloads::validate_payload(kind, raw)?;
    let job = state.jobs.create_pending(kind, &payload).await?;
    tracing::info!(job_id = job.id, %kind, "Job created");

    if !kind.is_queued() {
        return ingestion::ingest(state, job).await;
    }

    let queue = state
        .config
        .broker
        .queues
        .for_kind(kind)
        .ok_or_else(|| AppError::InternalError(format!("No queue configured for {kind}")))?
        .to_string();

    let message = signing::sign_work_item(&state.signer, job.id, &job.payload)?;

    match state.publisher.publish(&queue, &message).await {
        Ok(()) => {
            tracing::debug!(job_id = job.id, queue = %queue, "Work item published");
            let updated =
                transition::transition(state, &job, JobStatus::InProgress, None, "dispatch")
                    .await?;
            let job = updated.ok_or_else(|| lost(&job))?;
            Ok(DispatchOutcome::Dispatched(job))
        }
        Err(e) => {
            let reason = format!("Failed to publish to queue '{queue}': {e}");
            tracing::error!(job_id = job.id, queue = %queue, error = %e, "Dispatch failed");
            let updated = transition::transition(
                state,
                &job,
                JobStatus::Failed,
                Some(&reason),
                "dispatch_failed",
            )
            .await?;
            let job = updated.ok_or_else(|| lost(&job))?;
            Ok(DispatchOutcome::Failed(job))
        }
    }
}

/// A freshly created job changed under us; nothing else writes `pending` jobs.
pub(crate) fn lost(job: &Job) -> AppError {
    AppError::InternalError(format!(
        "Job {} left {} before dispatch completed",
        job.id, job.status
    ))
}
