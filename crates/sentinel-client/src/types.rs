//! Public types for the Sentinel API.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// How the backend handles a detected leak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Mask leaked values in the response.
    #[default]
    Default,
    /// Refuse the response when a leak is detected (enforced server-side).
    BlockOnLeak,
}

impl Policy {
    /// Every policy the backend accepts, in display order.
    pub const ALL: [Self; 2] = [Self::Default, Self::BlockOnLeak];

    /// Wire value sent in the `policy` field.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::BlockOnLeak => "block-on-leak",
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Default => "Default (mask leaks)",
            Self::BlockOnLeak => "Block on leak",
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not a known [`Policy`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown policy \"{0}\" (expected \"default\" or \"block-on-leak\")")]
pub struct UnknownPolicy(pub String);

impl FromStr for Policy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPolicy(s.to_owned()))
    }
}

/// Body of `POST /v1/inference`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceRequest {
    /// Client-chosen id correlating calls from one session.
    pub session_id: String,
    /// The prompt, possibly containing sensitive data.
    pub input_text: String,
    /// Leak-handling policy.
    pub policy: Policy,
}

/// Sanitized model output returned by `POST /v1/inference`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Sanitized response text.
    pub response: String,
    /// Vault entry holding the token mapping for this call. Empty strings
    /// are treated as absent.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub secret_id: Option<String>,
    /// Whether the backend caught sensitive content in the model output.
    #[serde(default)]
    pub leak_detected: bool,
}

/// One replaced substring in a vault entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// Detector label, e.g. `SSN` or `EMAIL`.
    pub label: String,
    /// The sensitive value that was replaced.
    pub original: String,
    /// The synthetic stand-in.
    pub synthetic: String,
}

/// Vault entry returned by `GET /v1/secret/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretMapping {
    /// Vault entry id.
    pub secret_id: String,
    /// Session that produced the entry.
    pub session_id: String,
    /// Subject of the token that created the entry.
    pub owner_id: String,
    /// Creation time. Naive timestamps are read as UTC.
    #[serde(deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
    /// Opaque detector output.
    #[serde(default)]
    pub detector_metadata: serde_json::Map<String, serde_json::Value>,
    /// Placeholder token → replaced value.
    #[serde(default)]
    pub mapping: BTreeMap<String, TokenEntry>,
}

impl SecretMapping {
    /// Detector labels listed under `detector_metadata.labels`, if any.
    pub fn labels(&self) -> Vec<&str> {
        self.detector_metadata
            .get("labels")
            .and_then(serde_json::Value::as_array)
            .map(|labels| labels.iter().filter_map(serde_json::Value::as_str).collect())
            .unwrap_or_default()
    }
}

/// Health check result.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the API answered with a success status.
    pub ok: bool,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u128,
    /// The `status` field reported by the server, or the failure reason.
    pub detail: String,
}

// --- Internal API response types ---

#[derive(Deserialize)]
pub(crate) struct HealthBody {
    pub status: Option<String>,
}

/// Error body of the form `{"detail": "..."}` or
/// `{"detail": [{"msg": "...", ...}, ...]}`.
#[derive(Deserialize)]
pub(crate) struct ApiErrorBody {
    pub detail: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub(crate) fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(serde_json::Value::as_str))
                    .collect();
                (!msgs.is_empty()).then(|| msgs.join("; "))
            }
            _ => None,
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid ISO-8601 timestamp: {raw}"))
    })
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
