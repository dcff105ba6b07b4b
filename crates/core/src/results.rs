//! Wire format of inference results consumed from the results queue.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Role of the primary assistant reply.
pub const ROLE_ASSISTANT: &str = "assistant";

/// Role of the optional baseline-model comparison reply.
pub const ROLE_ASSISTANT_BASE_MODEL: &str = "assistant_base_model";

/// Suffix appended to `result_id` to key the baseline-model message.
const BASE_MODEL_KEY_SUFFIX: &str = ":base_model";

/// A result published by an inference worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    pub conversation_id: DbId,
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_base_model: Option<String>,
    /// Worker-assigned idempotency key. Results without one are never
    /// deduplicated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
}

/// A message to append to a conversation, derived from a [`ResultMessage`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEntry {
    pub role: &'static str,
    pub content: String,
    pub result_key: Option<String>,
}

impl ResultMessage {
    /// The entries to persist, primary result first.
    pub fn entries(&self) -> Vec<ResultEntry> {
        let key = self
            .result_id
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        let mut entries = vec![ResultEntry {
            role: ROLE_ASSISTANT,
            content: self.result.clone(),
            result_key: key.map(str::to_string),
        }];

        if let Some(base) = &self.result_base_model {
            entries.push(ResultEntry {
                role: ROLE_ASSISTANT_BASE_MODEL,
                content: base.clone(),
                result_key: key.map(|k| format!("{k}{BASE_MODEL_KEY_SUFFIX}")),
            });
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_result() {
        let msg: ResultMessage =
            serde_json::from_str(r#"{"conversation_id": 7, "result": "Hello"}"#).unwrap();
        assert_eq!(msg.conversation_id, 7);
        assert_eq!(msg.result, "Hello");
        assert!(msg.result_base_model.is_none());

        let entries = msg.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].role, ROLE_ASSISTANT);
        assert_eq!(entries[0].content, "Hello");
        assert!(entries[0].result_key.is_none());
    }

    #[test]
    fn base_model_result_follows_primary() {
        let msg = ResultMessage {
            conversation_id: 1,
            result: "tuned".into(),
            result_base_model: Some("base".into()),
            result_id: Some("r-1".into()),
        };
        let entries = msg.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, ROLE_ASSISTANT);
        assert_eq!(entries[1].role, ROLE_ASSISTANT_BASE_MODEL);
        assert_eq!(entries[1].content, "base");
        assert_eq!(entries[0].result_key.as_deref(), Some("r-1"));
        assert_eq!(entries[1].result_key.as_deref(), Some("r-1:base_model"));
    }

    #[test]
    fn blank_result_id_is_ignored() {
        let msg = ResultMessage {
            conversation_id: 1,
            result: "x".into(),
            result_base_model: None,
            result_id: Some("  ".into()),
        };
        assert!(msg.entries()[0].result_key.is_none());
    }

    #[test]
    fn rejects_missing_conversation_id() {
        assert!(serde_json::from_str::<ResultMessage>(r#"{"result": "Hello"}"#).is_err());
    }
}
