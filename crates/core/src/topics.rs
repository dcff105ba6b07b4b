//! Broadcast topic names.
//!
//! Two topic shapes exist: one per conversation, and one aggregate status
//! topic per job kind for dashboard-style subscribers.

use crate::job_kind::JobKind;
use crate::types::DbId;

const CONVERSATION_PREFIX: &str = "conversation_";
const JOB_STATUS_PREFIX: &str = "job_status_";

/// Topic scoped to a single conversation, e.g. `conversation_7`.
pub fn conversation_topic(conversation_id: DbId) -> String {
    format!("{CONVERSATION_PREFIX}{conversation_id}")
}

/// Aggregate status topic for every job of `kind`, e.g. `job_status_fine_tune`.
pub fn job_status_topic(kind: JobKind) -> String {
    format!("{JOB_STATUS_PREFIX}{kind}")
}

/// Whether `topic` names something a subscriber may listen to.
pub fn is_known_topic(topic: &str) -> bool {
    if let Some(id) = topic.strip_prefix(CONVERSATION_PREFIX) {
        return id.parse::<DbId>().is_ok_and(|id| id > 0);
    }
    if let Some(kind) = topic.strip_prefix(JOB_STATUS_PREFIX) {
        return kind.parse::<JobKind>().is_ok();
    }
    false
}
