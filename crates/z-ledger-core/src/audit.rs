//! Audit log entries and payload redaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AuditId;

/// Replacement for secret values.
pub const REDACTED: &str = "***REDACTED***";

/// Strings longer than this under a binary-looking key are replaced.
pub const MAX_INLINE_DATA_LEN: usize = 100;

const SECRET_KEYS: &[&str] = &[
    "pin",
    "password",
    "token",
    "secret",
    "otp",
    "api_key",
    "apikey",
    "private_key",
    "privatekey",
    "credit_card",
    "creditcard",
];

const BINARY_KEYS: &[&str] = &["image", "file", "data", "avatar", "attachment", "base64"];

/// Outcome of an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    /// Operation succeeded.
    Success,
    /// Operation failed.
    Failed,
}

/// One immutable audit log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Entry id (ULID, time-ordered).
    pub id: AuditId,
    /// Who did it: user id, admin id or service name.
    pub actor: String,
    /// What they did, e.g. `credits.transfer`.
    pub action: String,
    /// Resource type, e.g. `withdrawal`.
    pub resource: String,
    /// Resource id, if known.
    pub resource_id: Option<String>,
    /// Redacted request payload.
    pub payload: Value,
    /// Outcome.
    pub outcome: AuditOutcome,
    /// Failure reason.
    pub error: Option<String>,
    /// When the operation finished.
    pub created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry, redacting `payload`.
    #[must_use]
    pub fn new(
        actor: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
        resource_id: Option<String>,
        payload: &Value,
        error: Option<String>,
    ) -> Self {
        Self {
            id: AuditId::generate(),
            actor: actor.into(),
            action: action.into(),
            resource: resource.into(),
            resource_id,
            payload: redact_payload(payload),
            outcome: if error.is_some() {
                AuditOutcome::Failed
            } else {
                AuditOutcome::Success
            },
            error,
            created_at: Utc::now(),
        }
    }
}

// Prefix/suffix match so `currentPin` and `pinCode` hit but `shipping` does not.
fn key_matches(key: &str, needles: &[&str]) -> bool {
    let key = key.to_ascii_lowercase();
    needles
        .iter()
        .any(|needle| key.starts_with(needle) || key.ends_with(needle))
}

/// Copy of `payload` with secrets and large binary blobs replaced.
///
/// Amounts and other plain fields are kept. Nested objects and arrays are
/// walked recursively.
#[must_use]
pub fn redact_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| (key.clone(), redact_field(key, value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_payload).collect()),
        other => other.clone(),
    }
}

fn redact_field(key: &str, value: &Value) -> Value {
    if key_matches(key, SECRET_KEYS) && !value.is_null() {
        return Value::String(REDACTED.to_string());
    }
    match value {
        Value::String(s) if s.len() > MAX_INLINE_DATA_LEN && key_matches(key, BINARY_KEYS) => {
            Value::String(format!("[BASE64_DATA_{}_BYTES]", s.len()))
        }
        other => redact_payload(other),
    }
}
