//! Events delivered to topic subscribers.

use chrono::{DateTime, Utc};
use courier_core::job_kind::JobKind;
use courier_core::job_status::JobStatus;
use courier_core::topics;
use courier_core::types::DbId;
use courier_db::models::conversation::{Conversation, Message};
use courier_db::models::job::Job;
use serde::{Deserialize, Serialize};

/// An event published on a topic.
///
/// Serialised with a `type` tag so WebSocket clients can dispatch on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastEvent {
    /// New messages appended to a conversation by the results worker.
    ConversationMessages {
        conversation_id: DbId,
        conversation_status: String,
        messages: Vec<Message>,
    },
    /// A job changed status.
    JobStatus {
        job_id: DbId,
        job_kind: JobKind,
        status: JobStatus,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        derived_resource_id: Option<DbId>,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error_message: Option<String>,
        timestamp: DateTime<Utc>,
    },
}

impl BroadcastEvent {
    /// Event for messages just appended to `conversation`.
    pub fn conversation_messages(conversation: &Conversation, messages: Vec<Message>) -> Self {
        Self::ConversationMessages {
            conversation_id: conversation.id,
            conversation_status: conversation.status.clone(),
            messages,
        }
    }

    /// Event for the current status of `job`.
    pub fn job_status(job: &Job) -> Self {
        Self::JobStatus {
            job_id: job.id,
            job_kind: job.job_kind,
            status: job.status,
            derived_resource_id: job.derived_resource_id,
            error_message: job.error_message.clone(),
            timestamp: job.updated_at,
        }
    }

    /// The topic this event belongs on.
    pub fn topic(&self) -> String {
        match self {
            Self::ConversationMessages {
                conversation_id, ..
            } => topics::conversation_topic(*conversation_id),
            Self::JobStatus { job_kind, .. } => topics::job_status_topic(*job_kind),
        }
    }
}

/// A topic and its event, as carried across process boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicEvent {
    pub topic: String,
    pub event: BroadcastEvent,
}

impl TopicEvent {
    pub fn new(topic: impl Into<String>, event: BroadcastEvent) -> Self {
        Self {
            topic: topic.into(),
            event,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus) -> Job {
        let now = Utc::now();
        Job {
            id: 5,
            job_kind: JobKind::FineTune,
            status,
            payload: serde_json::json!({}),
            derived_resource_id: None,
            error_message: Some("boom".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn job_status_event_targets_kind_topic() {
        let event = BroadcastEvent::job_status(&job(JobStatus::Failed));
        assert_eq!(event.topic(), "job_status_fine_tune");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "job_status");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error_message"], "boom");
        assert!(value.get("derived_resource_id").is_none());
    }

    #[test]
    fn conversation_event_targets_conversation_topic() {
        let now = Utc::now();
        let conversation = Conversation {
            id: 7,
            title: "t".to_string(),
            status: "active".to_string(),
            created_at: now,
            updated_at: now,
        };
        let event = BroadcastEvent::conversation_messages(&conversation, Vec::new());
        assert_eq!(event.topic(), "conversation_7");
        assert_eq!(
            serde_json::to_value(&event).unwrap()["type"],
            "conversation_messages"
        );
    }
}
