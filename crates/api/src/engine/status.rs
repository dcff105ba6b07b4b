//! Worker-reported status changes for queued jobs.

use std::str::FromStr;

use courier_core::job_kind::JobKind;
use courier_core::job_status::JobStatus;
use courier_core::payloads;
use courier_core::types::DbId;
use courier_db::models::job::Job;
use courier_db::models::resource::NewResource;
use serde::Deserialize;

use crate::engine::transition::{self, TransitionError};
use crate::error::AppError;
use crate::state::AppState;

/// Fallback `error_message` when a worker reports `fail` without one.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Worker reported failure";

/// Status a worker may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedStatus {
    Success,
    Fail,
}

impl FromStr for RequestedStatus {
    type Err = ApplyStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(RequestedStatus::Success),
            "fail" => Ok(RequestedStatus::Fail),
            other => Err(ApplyStatusError::UnknownStatus(other.to_string())),
        }
    }
}

/// Body of `POST /webhooks/{kind}/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyStatusError {
    #[error("Job {0} not found")]
    NotFound(DbId),

    #[error("Job {job_id} is {status}, not in_progress")]
    NotReady { job_id: DbId, status: JobStatus },

    #[error("Unknown status '{0}', expected 'success' or 'fail'")]
    UnknownStatus(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

impl From<ApplyStatusError> for AppError {
    fn from(err: ApplyStatusError) -> Self {
        match err {
            ApplyStatusError::NotFound(id) => AppError::Core(
                courier_core::error::CoreError::NotFound { entity: "Job", id },
            ),
            e @ ApplyStatusError::NotReady { .. } => AppError::BadRequest(e.to_string()),
            e @ ApplyStatusError::UnknownStatus(_) => AppError::Unprocessable(e.to_string()),
            ApplyStatusError::Transition(e) => e.into(),
        }
    }
}

/// Apply a worker's report to job `job_id` of `kind`.
///
/// The caller has already authenticated the request. A job of another kind
/// is reported as not found. Only `in_progress` jobs accept a report, and a
/// concurrent duplicate that loses the compare-and-set gets `NotReady` too.
pub async fn apply_status(
    state: &AppState,
    kind: JobKind,
    job_id: DbId,
    update: &StatusUpdate,
) -> Result<Job, ApplyStatusError> {
    let requested: RequestedStatus = update.status.parse()?;

    let job = state
        .jobs
        .find_job(job_id)
        .await
        .map_err(TransitionError::from)?
        .filter(|job| job.job_kind == kind)
        .ok_or(ApplyStatusError::NotFound(job_id))?;

    if job.status != JobStatus::InProgress {
        tracing::warn!(
            job_id,
            %kind,
            status = %job.status,
            requested = %update.status,
            "Status report for job that is not in progress",
        );
        return Err(ApplyStatusError::NotReady {
            job_id,
            status: job.status,
        });
    }

    let applied = match requested {
        RequestedStatus::Success => {
            let resource = NewResource {
                resource_kind: kind.resource_kind().to_string(),
                name: payloads::resource_name(kind, job.id, &job.payload),
                attributes: payloads::merge_attributes(&job.payload, update.details.as_ref()),
            };
            transition::complete(state, &job, &resource, "webhook_success")
                .await?
                .map(|(job, _)| job)
        }
        RequestedStatus::Fail => {
            let reason = failure_message(update.details.as_ref());
            transition::transition(state, &job, JobStatus::Failed, Some(&reason), "webhook_fail")
                .await?
        }
    };

    applied.ok_or(ApplyStatusError::NotReady {
        job_id,
        status: job.status,
    })
}

fn failure_message(details: Option<&serde_json::Value>) -> String {
    details
        .and_then(|d| d.get("error_message"))
        .and_then(|m| m.as_str())
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string()
}
