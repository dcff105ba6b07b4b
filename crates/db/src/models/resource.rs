//! Resources materialised when a job completes successfully.

use courier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `resources` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Resource {
    pub id: DbId,
    pub job_id: DbId,
    pub resource_kind: String,
    pub name: String,
    pub attributes: serde_json::Value,
    pub created_at: Timestamp,
}

/// Input for creating a resource alongside a job's `done` transition.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub resource_kind: String,
    pub name: String,
    pub attributes: serde_json::Value,
}
