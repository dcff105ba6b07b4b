//! In-process store for tests.
//!
//! Mirrors the compare-and-set and dedup behavior of [`crate::PgStore`]
//! without a database. Setting [`MemoryStore::fail_writes`] makes every
//! write return a transient pool error; [`MemoryStore::fail_completions`]
//! does the same for `complete` only.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use courier_core::job_kind::JobKind;
use courier_core::job_status::JobStatus;
use courier_core::results::ResultEntry;
use courier_core::types::DbId;
use tokio::sync::Mutex;

use crate::models::conversation::{Conversation, Message};
use crate::models::job::{Job, JobListQuery};
use crate::models::resource::{NewResource, Resource};
use crate::store::{AppendOutcome, ConversationStore, JobStore};

#[derive(Default)]
struct State {
    next_id: DbId,
    jobs: HashMap<DbId, Job>,
    resources: HashMap<DbId, Resource>,
    conversations: HashMap<DbId, Conversation>,
    messages: Vec<Message>,
}

impl State {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    fail_writes: AtomicBool,
    fail_completions: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (`true`) or succeed again (`false`).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `complete` calls fail while other writes succeed.
    pub fn fail_completions(&self, fail: bool) {
        self.fail_completions.store(fail, Ordering::SeqCst);
    }

    /// Insert a conversation, as the serving tier would.
    pub async fn seed_conversation(&self, title: &str) -> Conversation {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let conversation = Conversation {
            id: state.next_id(),
            title: title.to_string(),
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        };
        state
            .conversations
            .insert(conversation.id, conversation.clone());
        conversation
    }

    /// Messages of a conversation, in insertion order.
    pub async fn messages_for(&self, conversation_id: DbId) -> Vec<Message> {
        let state = self.state.lock().await;
        state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Number of resources created so far.
    pub async fn resource_count(&self) -> usize {
        self.state.lock().await.resources.len()
    }

    fn check_writable(&self) -> Result<(), sqlx::Error> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_pending(
        &self,
        kind: JobKind,
        payload: &serde_json::Value,
    ) -> Result<Job, sqlx::Error> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let job = Job {
            id: state.next_id(),
            job_kind: kind,
            status: JobStatus::Pending,
            payload: payload.clone(),
            derived_resource_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        state.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, sqlx::Error> {
        Ok(self.state.lock().await.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, params: &JobListQuery) -> Result<Vec<Job>, sqlx::Error> {
        let state = self.state.lock().await;
        let mut jobs: Vec<Job> = state
            .jobs
            .values()
            .filter(|j| params.kind.is_none_or(|k| j.job_kind == k))
            .filter(|j| params.status.is_none_or(|s| j.status == s))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(jobs
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.limit() as usize)
            .collect())
    }

    async fn transition(
        &self,
        id: DbId,
        from: JobStatus,
        to: JobStatus,
        error_message: Option<&str>,
    ) -> Result<Option<Job>, sqlx::Error> {
        self.check_writable()?;
        let mut state = self.state.lock().await;
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != from {
            return Ok(None);
        }
        job.status = to;
        job.error_message = error_message.map(str::to_string);
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn complete(
        &self,
        id: DbId,
        resource: &NewResource,
    ) -> Result<Option<(Job, Resource)>, sqlx::Error> {
        self.check_writable()?;
        if self.fail_completions.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut state = self.state.lock().await;
        let in_progress = state
            .jobs
            .get(&id)
            .is_some_and(|j| j.status == JobStatus::InProgress);
        if !in_progress {
            return Ok(None);
        }

        let created = Resource {
            id: state.next_id(),
            job_id: id,
            resource_kind: resource.resource_kind.clone(),
            name: resource.name.clone(),
            attributes: resource.attributes.clone(),
            created_at: Utc::now(),
        };
        state.resources.insert(created.id, created.clone());

        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };
        job.status = JobStatus::Done;
        job.derived_resource_id = Some(created.id);
        job.updated_at = Utc::now();
        Ok(Some((job.clone(), created)))
    }

    async fn find_resource(&self, id: DbId) -> Result<Option<Resource>, sqlx::Error> {
        Ok(self.state.lock().await.resources.get(&id).cloned())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        self.check_writable()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn find_conversation(&self, id: DbId) -> Result<Option<Conversation>, sqlx::Error> {
        Ok(self.state.lock().await.conversations.get(&id).cloned())
    }

    async fn append_messages(
        &self,
        conversation_id: DbId,
        entries: &[ResultEntry],
    ) -> Result<AppendOutcome, sqlx::Error> {
        self.check_writable()?;
        let mut state = self.state.lock().await;

        let duplicate = entries.iter().any(|entry| {
            entry.result_key.as_ref().is_some_and(|key| {
                state.messages.iter().any(|m| {
                    m.conversation_id == conversation_id && m.result_key.as_ref() == Some(key)
                })
            })
        });
        if duplicate {
            return Ok(AppendOutcome::Duplicate);
        }

        // Mirrors the foreign key on messages.conversation_id.
        if !state.conversations.contains_key(&conversation_id) {
            return Err(sqlx::Error::RowNotFound);
        }

        let now = Utc::now();
        let mut messages = Vec::with_capacity(entries.len());
        for entry in entries {
            let message = Message {
                id: state.next_id(),
                conversation_id,
                role: entry.role.to_string(),
                content: entry.content.clone(),
                result_key: entry.result_key.clone(),
                created_at: now,
            };
            state.messages.push(message.clone());
            messages.push(message);
        }

        let Some(conversation) = state.conversations.get_mut(&conversation_id) else {
            return Err(sqlx::Error::RowNotFound);
        };
        conversation.updated_at = now;
        Ok(AppendOutcome::Appended {
            conversation: conversation.clone(),
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use courier_core::results::ResultMessage;
    use serde_json::json;

    use super::*;

    fn entries(result_id: Option<&str>) -> Vec<ResultEntry> {
        ResultMessage {
            conversation_id: 0,
            result: "hi".to_string(),
            result_base_model: Some("base hi".to_string()),
            result_id: result_id.map(str::to_string),
        }
        .entries()
    }

    #[tokio::test]
    async fn transition_is_compare_and_set() {
        let store = MemoryStore::new();
        let job = store
            .create_pending(JobKind::Install, &json!({ "name": "m" }))
            .await
            .unwrap();

        let moved = store
            .transition(job.id, JobStatus::Pending, JobStatus::InProgress, None)
            .await
            .unwrap();
        assert_eq!(moved.unwrap().status, JobStatus::InProgress);

        let stale = store
            .transition(job.id, JobStatus::Pending, JobStatus::Failed, Some("late"))
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn complete_requires_in_progress_and_links_resource() {
        let store = MemoryStore::new();
        let job = store
            .create_pending(JobKind::FineTune, &json!({}))
            .await
            .unwrap();
        let resource = NewResource {
            resource_kind: "fine_tuned_model".to_string(),
            name: "ft".to_string(),
            attributes: json!({}),
        };

        assert!(store.complete(job.id, &resource).await.unwrap().is_none());
        assert_eq!(store.resource_count().await, 0);

        store
            .transition(job.id, JobStatus::Pending, JobStatus::InProgress, None)
            .await
            .unwrap();
        let (done, created) = store.complete(job.id, &resource).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Done);
        assert_eq!(done.derived_resource_id, Some(created.id));

        assert!(store.complete(job.id, &resource).await.unwrap().is_none());
        assert_eq!(store.resource_count().await, 1);
    }

    #[tokio::test]
    async fn append_dedups_on_result_key() {
        let store = MemoryStore::new();
        let conversation = store.seed_conversation("c").await;

        let first = store
            .append_messages(conversation.id, &entries(Some("r1")))
            .await
            .unwrap();
        assert!(matches!(first, AppendOutcome::Appended { ref messages, .. } if messages.len() == 2));

        let again = store
            .append_messages(conversation.id, &entries(Some("r1")))
            .await
            .unwrap();
        assert_eq!(again, AppendOutcome::Duplicate);
        assert_eq!(store.messages_for(conversation.id).await.len(), 2);
    }

    #[tokio::test]
    async fn append_without_key_always_inserts() {
        let store = MemoryStore::new();
        let conversation = store.seed_conversation("c").await;
        store
            .append_messages(conversation.id, &entries(None))
            .await
            .unwrap();
        store
            .append_messages(conversation.id, &entries(None))
            .await
            .unwrap();
        assert_eq!(store.messages_for(conversation.id).await.len(), 4);
    }

    #[tokio::test]
    async fn fail_completions_only_affects_complete() {
        let store = MemoryStore::new();
        let job = store
            .create_pending(JobKind::FineTune, &json!({}))
            .await
            .unwrap();
        store.fail_completions(true);

        store
            .transition(job.id, JobStatus::Pending, JobStatus::InProgress, None)
            .await
            .unwrap();
        let resource = NewResource {
            resource_kind: "fine_tuned_model".to_string(),
            name: "ft".to_string(),
            attributes: json!({}),
        };
        assert!(store.complete(job.id, &resource).await.is_err());
        assert_eq!(store.resource_count().await, 0);
    }

    #[tokio::test]
    async fn fail_writes_returns_errors() {
        let store = MemoryStore::new();
        store.fail_writes(true);
        assert!(store
            .create_pending(JobKind::Install, &json!({}))
            .await
            .is_err());
    }
}
