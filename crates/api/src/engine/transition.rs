//! The single path through which job status changes.

use courier_core::error::CoreError;
use courier_core::job_status::JobStatus;
use courier_core::topics;
use courier_db::models::job::Job;
use courier_db::models::resource::{NewResource, Resource};
use courier_events::BroadcastEvent;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// The move is not in the transition table.
    #[error(transparent)]
    Illegal(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] sqlx::Error),
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Illegal(e) => AppError::Core(e),
            TransitionError::Store(e) => AppError::Database(e),
        }
    }
}

/// Move `job` to `to` if it is still in the status it was read with.
///
/// Returns `None` when another writer changed the job first.
pub async fn transition(
    state: &AppState,
    job: &Job,
    to: JobStatus,
    error_message: Option<&str>,
    trigger: &'static str,
) -> Result<Option<Job>, TransitionError> {
    job.status.check_transition(to)?;

    let updated = state
        .jobs
        .transition(job.id, job.status, to, error_message)
        .await?;

    match &updated {
        Some(updated) => announce(state, updated, job.status, trigger),
        None => lost_race(job, to, trigger),
    }
    Ok(updated)
}

/// Create the derived resource and move `job` to `Done` atomically.
pub async fn complete(
    state: &AppState,
    job: &Job,
    resource: &NewResource,
    trigger: &'static str,
) -> Result<Option<(Job, Resource)>, TransitionError> {
    job.status.check_transition(JobStatus::Done)?;

    let completed = state.jobs.complete(job.id, resource).await?;

    match &completed {
        Some((updated, created)) => {
            tracing::info!(
                job_id = job.id,
                resource_id = created.id,
                resource_kind = %created.resource_kind,
                "Derived resource created",
            );
            announce(state, updated, job.status, trigger);
        }
        None => lost_race(job, JobStatus::Done, trigger),
    }
    Ok(completed)
}

/// Log an applied transition and publish it on the kind's status topic.
fn announce(state: &AppState, job: &Job, from: JobStatus, trigger: &'static str) {
    tracing::info!(
        job_id = job.id,
        kind = %job.job_kind,
        %from,
        to = %job.status,
        trigger,
        error_message = job.error_message.as_deref().unwrap_or_default(),
        "Job status changed",
    );
    state.broadcaster.publish(
        &topics::job_status_topic(job.job_kind),
        BroadcastEvent::job_status(job),
    );
}

fn lost_race(job: &Job, to: JobStatus, trigger: &'static str) {
    tracing::warn!(
        job_id = job.id,
        kind = %job.job_kind,
        from = %job.status,
        %to,
        trigger,
        "Job changed concurrently, transition not applied",
    );
}
