//! Storage seams used by the dispatcher, webhook receiver and results worker.
//!
//! [`PgStore`] is the production implementation over [`crate::repositories`].
//! With the `test-support` feature, [`crate::memory::MemoryStore`] provides an
//! in-process implementation with the same compare-and-set semantics.

use async_trait::async_trait;
use courier_core::job_kind::JobKind;
use courier_core::job_status::JobStatus;
use courier_core::results::ResultEntry;
use courier_core::types::DbId;

use crate::models::conversation::{Conversation, Message};
use crate::models::job::{Job, JobListQuery};
use crate::models::resource::{NewResource, Resource};
use crate::repositories::{ConversationRepo, JobRepo, MessageRepo, ResourceRepo};
use crate::DbPool;

/// Result of appending worker output to a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    /// Every entry was stored, in order.
    Appended {
        conversation: Conversation,
        messages: Vec<Message>,
    },
    /// The primary entry's result key was already stored; nothing was written.
    Duplicate,
}

/// Job persistence with compare-and-set status updates.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_pending(
        &self,
        kind: JobKind,
        payload: &serde_json::Value,
    ) -> Result<Job, sqlx::Error>;

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, sqlx::Error>;

    async fn list_jobs(&self, params: &JobListQuery) -> Result<Vec<Job>, sqlx::Error>;

    /// Move `id` from `from` to `to` if it is still in `from`; `None` otherwise.
    async fn transition(
        &self,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> Result<Option<Job>, sqlx::Error>;

    /// Create the derived resource and move `id` from `InProgress` to `Done`
    /// in one atomic step; `None` if the job was not `InProgress`.
    async fn complete(
        &self,
        id: DbId,
        resource: &NewResource,
    ) -> Result<Option<(Job, Resource)>, sqlx::Error>;

    async fn find_resource(&self, id: DbId) -> Result<Option<Resource>, sqlx::Error>;

    /// Confirm the backing store is reachable.
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Conversation lookup and append-only message persistence.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn find_conversation(&self, id: DbId) -> Result<Option<Conversation>, sqlx::Error>;

    /// Append `entries` in order, in one transaction.
    async fn append_messages(
        &self,
        conversation_id: DbId,
        entries: &[ResultEntry],
    ) -> Result<AppendOutcome, sqlx::Error>;
}

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl JobStore for PgStore {
    async fn create_pending(
        &self,
        kind: JobKind,
        payload: &serde_json::Value,
    ) -> Result<Job, sqlx::Error> {
        JobRepo::create(&self.pool, kind, payload).await
    }

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        JobRepo::find_by_id(&self.pool, id).await
    }

    async fn list_jobs(&self, params: &JobListQuery) -> Result<Vec<Job>, sqlx::Error> {
        JobRepo::list(&self.pool, params).await
    }

    async fn transition(
        &self,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> Result<Option<Job>, sqlx::Error> {
        JobRepo::transition(&self.pool, id, from, to, error_message).await
    }

    async fn complete(
        &self,
        id: DbId,
        resource: &NewResource,
    ) -> Result<Option<(Job, Resource)>, sqlx::Error> {
        JobRepo::complete(&self.pool, id, resource).await
    }

    async fn find_resource(&self, id: DbId) -> Result<Option<Resource>, sqlx::Error> {
        ResourceRepo::find_by_id(&self.pool, id).await
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        crate::health_check(&self.pool).await
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn find_conversation(&self, id: DbId) -> Result<Option<Conversation>, sqlx::Error> {
        ConversationRepo::find_by_id(&self.pool, id).await
    }

    async fn append_messages(
        &self,
        conversation_id: DbId,
        entries: &[ResultEntry],
    ) -> Result<AppendOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut messages = Vec::with_capacity(entries.len());

        for entry in entries {
            match MessageRepo::insert(&mut tx, conversation_id, entry).await? {
                Some(message) => messages.push(message),
                None => {
                    tx.rollback().await?;
                    tracing::info!(
                        conversation_id,
                        result_key = entry.result_key.as_deref().unwrap_or_default(),
                        "Result already stored, skipping",
                    );
                    return Ok(AppendOutcome::Duplicate);
                }
            }
        }

        let conversation = ConversationRepo::touch(&mut tx, conversation_id).await?;
        tx.commit().await?;

        Ok(AppendOutcome::Appended {
            conversation,
            messages,
        })
    }
}
