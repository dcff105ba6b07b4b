//! Per-delivery processing of inference results.
//!
//! The handler never acknowledges anything itself. It persists the messages,
//! broadcasts them, and reports what happened as a [`HandleOutcome`].

use std::sync::Arc;

use courier_core::results::ResultMessage;
use courier_core::topics;
use courier_core::types::DbId;
use courier_db::{AppendOutcome, ConversationStore};
use courier_events::{BroadcastEvent, EventSink};

/// What happened to one results message.
#[derive(Debug, Clone, PartialEq)]
pub enum HandleOutcome {
    /// Messages were stored and one broadcast event was published.
    Processed {
        conversation_id: DbId,
        message_ids: Vec<DbId>,
    },
    /// The result key was already stored; nothing was written or broadcast.
    Duplicate { conversation_id: DbId },
    /// The message could not be processed.
    Rejected(RejectReason),
}

/// Why a message was not processed.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The body is not a valid results message. Never retried.
    Malformed(String),
    /// The referenced conversation does not exist. Never retried.
    UnknownConversation(DbId),
    /// Storage failure or timeout. Retried up to the configured limit.
    Transient(String),
}

pub struct ResultHandler {
    conversations: Arc<dyn ConversationStore>,
    events: Arc<dyn EventSink>,
}

impl ResultHandler {
    pub fn new(conversations: Arc<dyn ConversationStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            conversations,
            events,
        }
    }

    /// Parse and process a raw delivery body.
    pub async fn handle(&self, body: &[u8]) -> HandleOutcome {
        match serde_json::from_slice::<ResultMessage>(body) {
            Ok(message) => self.process(message).await,
            Err(e) => {
                tracing::error!(error = %e, bytes = body.len(), "Unparseable results message");
                HandleOutcome::Rejected(RejectReason::Malformed(e.to_string()))
            }
        }
    }

    /// Persist `message` and broadcast the new messages on the conversation
    /// topic.
    pub async fn process(&self, message: ResultMessage) -> HandleOutcome {
        let conversation_id = message.conversation_id;

        match self.conversations.find_conversation(conversation_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!(conversation_id, "Result for unknown conversation");
                return HandleOutcome::Rejected(RejectReason::UnknownConversation(conversation_id));
            }
            Err(e) => {
                tracing::error!(conversation_id, error = %e, "Conversation lookup failed");
                return HandleOutcome::Rejected(RejectReason::Transient(e.to_string()));
            }
        }

        let entries = message.entries();
        let appended = match self
            .conversations
            .append_messages(conversation_id, &entries)
            .await
        {
            Ok(appended) => appended,
            Err(e) => {
                tracing::error!(conversation_id, error = %e, "Failed to persist result");
                return HandleOutcome::Rejected(RejectReason::Transient(e.to_string()));
            }
        };

        match appended {
            AppendOutcome::Appended {
                conversation,
                messages,
            } => {
                let message_ids: Vec<DbId> = messages.iter().map(|m| m.id).collect();
                let topic = topics::conversation_topic(conversation_id);
                self.events.publish(
                    &topic,
                    BroadcastEvent::conversation_messages(&conversation, messages),
                );
                tracing::info!(conversation_id, ?message_ids, "Result persisted and broadcast");
                HandleOutcome::Processed {
                    conversation_id,
                    message_ids,
                }
            }
            AppendOutcome::Duplicate => {
                tracing::info!(
                    conversation_id,
                    result_id = message.result_id.as_deref().unwrap_or_default(),
                    "Duplicate result delivery",
                );
                HandleOutcome::Duplicate { conversation_id }
            }
        }
    }
}
