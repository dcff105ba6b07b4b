//! Kind-specific job payloads and their validation.
//!
//! A payload is validated before any job row is created or any message is
//! published. Validation normalises the payload into the exact JSON object
//! that is stored on the job and sent to the worker.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::job_kind::JobKind;
use crate::types::DbId;

/// Maximum length of a human-readable resource name.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum number of file references in a single ingestion job.
pub const MAX_FILE_REFERENCES: usize = 500;

/// Keys the dispatcher adds to every queue message. Payloads may not use them.
pub const RESERVED_KEYS: [&str; 2] = ["job_id", "signature"];

/// Work item for installing a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstallPayload {
    pub name: String,
    pub source_path: String,
    pub clinician_type_id: DbId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Work item for fine-tuning a base model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FineTunePayload {
    pub name: String,
    pub base_model_id: DbId,
    pub dataset_path: String,
    pub clinician_type_id: DbId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Work item for the ingestion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestionPayload {
    pub file_references: Vec<String>,
    pub clinician_type_id: DbId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Validate a raw payload for `kind` and return its normalised JSON form.
pub fn validate_payload(
    kind: JobKind,
    raw: &serde_json::Value,
) -> Result<serde_json::Value, CoreError> {
    if !raw.is_object() {
        return Err(CoreError::Validation(
            "Job payload must be a JSON object".to_string(),
        ));
    }

    let normalized = match kind {
        JobKind::Install => {
            let p: InstallPayload = parse(raw)?;
            validate_name(&p.name)?;
            require_non_empty("source_path", &p.source_path)?;
            require_positive("clinician_type_id", p.clinician_type_id)?;
            to_value(&p)?
        }
        JobKind::FineTune => {
            let p: FineTunePayload = parse(raw)?;
            validate_name(&p.name)?;
            require_positive("base_model_id", p.base_model_id)?;
            require_non_empty("dataset_path", &p.dataset_path)?;
            require_positive("clinician_type_id", p.clinician_type_id)?;
            to_value(&p)?
        }
        JobKind::Ingestion => {
            let p: IngestionPayload = parse(raw)?;
            validate_file_references(&p.file_references)?;
            require_positive("clinician_type_id", p.clinician_type_id)?;
            if let Some(name) = &p.name {
                validate_name(name)?;
            }
            to_value(&p)?
        }
    };

    Ok(normalized)
}

/// Resource name for a completed job: the payload `name`, or a generated one.
pub fn resource_name(kind: JobKind, job_id: DbId, payload: &serde_json::Value) -> String {
    payload
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| format!("{kind}-{job_id}"))
}

/// Merge worker-reported `details` over the job payload.
///
/// Worker keys win on collision. Non-object details are stored under
/// `"details"`.
pub fn merge_attributes(
    payload: &serde_json::Value,
    details: Option<&serde_json::Value>,
) -> serde_json::Value {
    let mut merged = payload.as_object().cloned().unwrap_or_default();
    match details {
        Some(serde_json::Value::Object(map)) => {
            for (k, v) in map {
                merged.insert(k.clone(), v.clone());
            }
        }
        Some(serde_json::Value::Null) | None => {}
        Some(other) => {
            merged.insert("details".to_string(), other.clone());
        }
    }
    serde_json::Value::Object(merged)
}

fn parse<T: serde::de::DeserializeOwned>(raw: &serde_json::Value) -> Result<T, CoreError> {
    for key in RESERVED_KEYS {
        if raw.get(key).is_some() {
            return Err(CoreError::Validation(format!(
                "'{key}' is reserved and may not appear in a job payload"
            )));
        }
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| CoreError::Validation(format!("Invalid job payload: {e}")))
}

fn to_value<T: Serialize>(payload: &T) -> Result<serde_json::Value, CoreError> {
    serde_json::to_value(payload).map_err(|e| CoreError::Internal(e.to_string()))
}

fn validate_name(name: &str) -> Result<(), CoreError> {
    require_non_empty("name", name)?;
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "name must not exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_file_references(refs: &[String]) -> Result<(), CoreError> {
    if refs.is_empty() {
        return Err(CoreError::Validation(
            "file_references must not be empty".to_string(),
        ));
    }
    if refs.len() > MAX_FILE_REFERENCES {
        return Err(CoreError::Validation(format!(
            "At most {MAX_FILE_REFERENCES} file references may be ingested at once"
        )));
    }
    for (i, r) in refs.iter().enumerate() {
        if r.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "File reference at index {i} must not be empty"
            )));
        }
    }
    Ok(())
}

fn require_non_empty(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_positive(field: &str, value: DbId) -> Result<(), CoreError> {
    if value <= 0 {
        return Err(CoreError::Validation(format!(
            "{field} must be a positive id"
        )));
    }
    Ok(())
}
