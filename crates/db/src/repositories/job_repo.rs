//! Repository for the `jobs` table.
//!
//! Every status change is a compare-and-set: the `UPDATE` is conditioned on
//! the status the caller observed, so two concurrent callbacks for the same
//! job can never both apply. Callers check the transition table in
//! `courier_core::job_status` before calling in here.

use courier_core::job_kind::JobKind;
use courier_core::job_status::JobStatus;
use courier_core::types::DbId;
use sqlx::PgPool;

use crate::models::job::{Job, JobListQuery};
use crate::models::resource::{NewResource, Resource};
use crate::repositories::ResourceRepo;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_kind, status_id, payload, derived_resource_id, error_message, \
    created_at, updated_at";

/// Provides persistence operations for jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job in `pending`.
    pub async fn create(
        pool: &PgPool,
        kind: JobKind,
        payload: &serde_json::Value,
    ) -> Result<Job, sqlx::Error> {
        let query = format!(
            "INSERT INTO jobs (job_kind, status_id, payload) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(kind.as_str())
            .bind(JobStatus::Pending.id())
            .bind(payload)
            .fetch_one(pool)
            .await
    }

    /// Find a job by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List jobs newest first with optional kind/status filters.
    pub async fn list(pool: &PgPool, params: &JobListQuery) -> Result<Vec<Job>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM jobs \
             WHERE ($1::TEXT IS NULL OR job_kind = $1) \
               AND ($2::SMALLINT IS NULL OR status_id = $2) \
             ORDER BY created_at DESC, id DESC \
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(params.kind.map(JobKind::as_str))
            .bind(params.status.map(JobStatus::id))
            .bind(params.limit())
            .bind(params.offset())
            .fetch_all(pool)
            .await
    }

    /// Move a job from `from` to `to` if it is still in `from`.
    ///
    /// `error_message` is stored as given; pass `None` unless `to` is
    /// `Failed`. Returns `None` when the job was not in `from` (or does not
    /// exist). Use [`JobRepo::complete`] for the `Done` transition.
    pub async fn transition(
        pool: &PgPool,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> Result<Option<Job>, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET status_id = $3, error_message = $4 \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(from.id())
            .bind(to.id())
            .bind(error_message)
            .fetch_optional(pool)
            .await
    }

    /// Atomically create the derived resource and move the job to `Done`.
    ///
    /// The job row is locked with `FOR UPDATE` while still `InProgress`, so a
    /// concurrent completion waits and then finds the job already `Done`.
    /// Returns `None` (and writes nothing) when the job is not `InProgress`.
    pub async fn complete(
        pool: &PgPool,
        id: DbId,
        resource: &NewResource,
    ) -> Result<Option<(Job, Resource)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let locked: Option<DbId> =
            sqlx::query_scalar("SELECT id FROM jobs WHERE id = $1 AND status_id = $2 FOR UPDATE")
                .bind(id)
                .bind(JobStatus::InProgress.id())
                .fetch_optional(&mut *tx)
                .await?;

        if locked.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let created = ResourceRepo::insert(&mut tx, id, resource).await?;

        let query = format!(
            "UPDATE jobs SET status_id = $3, derived_resource_id = $4 \
             WHERE id = $1 AND status_id = $2 \
             RETURNING {COLUMNS}"
        );
        let job = sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .bind(JobStatus::InProgress.id())
            .bind(JobStatus::Done.id())
            .bind(created.id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some((job, created)))
    }
}
