//! HMAC-SHA256 signing for work items and webhook bodies.
//!
//! [`Signer`] holds the shared secret injected from configuration. It is
//! immutable after construction and cheap to share behind an `Arc`.
//!
//! Work items are signed over their canonical JSON form (object keys sorted
//! recursively) including `job_id` and without the `signature` key. A worker
//! verifies a message by removing `signature`, re-canonicalising, and
//! checking the signature; [`verify_work_item`] implements that contract.
//!
//! Status webhooks are signed over [`status_webhook_input`], which binds the
//! body to the job kind and id in the request path. A signed report for one
//! job does not verify for any other.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CoreError;
use crate::types::DbId;

type HmacSha256 = Hmac<Sha256>;

/// Key under which the hex signature travels inside a work item.
pub const SIGNATURE_KEY: &str = "signature";

/// Key under which the job id travels inside a work item.
pub const JOB_ID_KEY: &str = "job_id";

/// HTTP header carrying the hex signature of a webhook body.
pub const SIGNATURE_HEADER: &str = "x-courier-signature";

/// Computes and verifies message-authentication codes with a shared secret.
#[derive(Clone)]
pub struct Signer {
    secret: Vec<u8>,
}

impl Signer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Lowercase hex HMAC-SHA256 over exactly `payload`.
    pub fn sign(&self, payload: &[u8]) -> String {
        hex::encode(self.mac(payload).finalize().into_bytes())
    }

    /// Check `signature` (hex) against `payload`.
    ///
    /// Comparison is constant-time. Malformed hex is a mismatch, not an error.
    pub fn verify(&self, payload: &[u8], signature: &str) -> bool {
        let Ok(expected) = hex::decode(signature.trim()) else {
            return false;
        };
        self.mac(payload).verify_slice(&expected).is_ok()
    }

    fn mac(&self, payload: &[u8]) -> HmacSha256 {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC accepts any key length");
        mac.update(payload);
        mac
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer").field("secret", &"<redacted>").finish()
    }
}

/// Serialise `value` with object keys sorted at every depth.
///
/// The output does not depend on the map ordering `serde_json` was built with.
pub fn canonical_json(value: &serde_json::Value) -> Vec<u8> {
    // Serialising a `Value` cannot fail: keys are always strings.
    serde_json::to_vec(&sorted(value)).unwrap_or_default()
}

fn sorted(value: &serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = serde_json::Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key]));
            }
            serde_json::Value::Object(out)
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(sorted).collect())
        }
        other => other.clone(),
    }
}

/// Bytes a status webhook signature covers: `"{kind}/{job_id}\n"` followed
/// by the raw request body.
pub fn status_webhook_input(kind: &str, job_id: DbId, body: &[u8]) -> Vec<u8> {
    let mut input = format!("{kind}/{job_id}\n").into_bytes();
    input.extend_from_slice(body);
    input
}

/// Build the signed queue message for a job: `{payload..., job_id, signature}`.
pub fn sign_work_item(
    signer: &Signer,
    job_id: DbId,
    payload: &serde_json::Value,
) -> Result<Vec<u8>, CoreError> {
    let serde_json::Value::Object(fields) = payload else {
        return Err(CoreError::Validation(
            "Job payload must be a JSON object".to_string(),
        ));
    };

    let mut message = fields.clone();
    message.insert(JOB_ID_KEY.to_string(), serde_json::Value::from(job_id));
    let signature = signer.sign(&canonical_json(&serde_json::Value::Object(message.clone())));

    message.insert(
        SIGNATURE_KEY.to_string(),
        serde_json::Value::String(signature),
    );
    Ok(canonical_json(&serde_json::Value::Object(message)))
}

/// Verify a signed queue message the way a worker does.
pub fn verify_work_item(signer: &Signer, message: &[u8]) -> bool {
    let Ok(serde_json::Value::Object(mut fields)) = serde_json::from_slice(message) else {
        return false;
    };
    let Some(serde_json::Value::String(signature)) = fields.remove(SIGNATURE_KEY) else {
        return false;
    };
    if !fields.contains_key(JOB_ID_KEY) {
        return false;
    }
    signer.verify(&canonical_json(&serde_json::Value::Object(fields)), &signature)
}
