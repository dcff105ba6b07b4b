//! Repository for the `resources` table.

use courier_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::resource::{NewResource, Resource};

/// Column list for `resources` queries.
const COLUMNS: &str = "id, job_id, resource_kind, name, attributes, created_at";

pub struct ResourceRepo;

impl ResourceRepo {
    /// Insert a resource for `job_id`. Meant to run inside the job's
    /// completion transaction.
    pub async fn insert(
        conn: &mut PgConnection,
        job_id: DbId,
        input: &NewResource,
    ) -> Result<Resource, sqlx::Error> {
        let query = format!(
            "INSERT INTO resources (job_id, resource_kind, name, attributes) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Resource>(&query)
            .bind(job_id)
            .bind(&input.resource_kind)
            .bind(&input.name)
            .bind(&input.attributes)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Resource>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM resources WHERE id = $1");
        sqlx::query_as::<_, Resource>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }
}
