//! Job kind discriminator.
//!
//! Each kind maps to exactly one worker contract: a durable dispatch queue
//! for `install` and `fine_tune`, and a synchronous HTTP call for
//! `ingestion`. The kind also decides which derived resource a successful
//! job materialises.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Resource kind created when an install job completes.
pub const RESOURCE_KIND_MODEL: &str = "model";

/// Resource kind created when a fine-tune job completes.
pub const RESOURCE_KIND_FINE_TUNED_MODEL: &str = "fine_tuned_model";

/// Resource kind created when an ingestion job completes.
pub const RESOURCE_KIND_KNOWLEDGE_BASE: &str = "knowledge_base";

/// The kind of long-running work a job represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Install a model from a source path.
    Install,
    /// Fine-tune a base model on a dataset.
    FineTune,
    /// Ingest documents into the retrieval-augmentation service.
    Ingestion,
}

impl JobKind {
    /// Every kind, in declaration order.
    pub const ALL: [JobKind; 3] = [JobKind::Install, JobKind::FineTune, JobKind::Ingestion];

    /// Wire and database name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Install => "install",
            JobKind::FineTune => "fine_tune",
            JobKind::Ingestion => "ingestion",
        }
    }

    /// Whether the kind is dispatched through a broker queue.
    ///
    /// Ingestion jobs are proxied synchronously and never touch the broker.
    pub fn is_queued(self) -> bool {
        !matches!(self, JobKind::Ingestion)
    }

    /// Whether external workers report completion through the status webhook.
    pub fn accepts_webhooks(self) -> bool {
        self.is_queued()
    }

    /// Kind of the resource materialised when a job of this kind succeeds.
    pub fn resource_kind(self) -> &'static str {
        match self {
            JobKind::Install => RESOURCE_KIND_MODEL,
            JobKind::FineTune => RESOURCE_KIND_FINE_TUNED_MODEL,
            JobKind::Ingestion => RESOURCE_KIND_KNOWLEDGE_BASE,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown job kind '{s}'")))
    }
}

impl TryFrom<String> for JobKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_wire_name() {
        for kind in JobKind::ALL {
            assert_eq!(kind.as_str().parse::<JobKind>().unwrap(), kind);
        }
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = "training".parse::<JobKind>().unwrap_err();
        assert!(err.to_string().contains("training"));
    }

    #[test]
    fn only_ingestion_bypasses_the_broker() {
        assert!(JobKind::Install.is_queued());
        assert!(JobKind::FineTune.is_queued());
        assert!(!JobKind::Ingestion.is_queued());
        assert!(!JobKind::Ingestion.accepts_webhooks());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&JobKind::FineTune).unwrap();
        assert_eq!(json, "\"fine_tune\"");
    }
}
