//! License records, key normalization and the reconcile/evaluate core
//!
//! Two record shapes live here:
//! - [`LicenseRecord`]: a raw candidate read from one source. The JSON object
//!   is kept exactly as received so the canonical mapping can hand it back
//!   unchanged.
//! - [`License`]: a validated record produced by batch normalization and
//!   written back to the stores.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::time::parse_timestamp_value;

pub mod batch;
pub mod reconcile;
pub mod validate;

pub use batch::normalize_batch;
pub use reconcile::{merge, CanonicalMap, SourceCollection, SourceKind};
pub use validate::{evaluate, Evaluation, LicenseState, MessageLocale, Messages, VerifyResponse};

/// Normalize a license key for comparison: trim surrounding whitespace, uppercase.
pub fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}

/// A raw license record as stored by one source
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseRecord {
    normalized_key: String,
    fields: Map<String, Value>,
}

impl LicenseRecord {
    /// Build a record from an arbitrary JSON value.
    ///
    /// Returns `None` when the value is not an object, has no key, or the key
    /// is empty after normalization.
    pub fn from_value(value: &Value) -> Option<Self> {
        let fields = value.as_object()?;
        let raw_key = key_text(fields.get("key")?)?;
        let normalized_key = normalize_key(&raw_key);
        if normalized_key.is_empty() {
            return None;
        }
        Some(Self {
            normalized_key,
            fields: fields.clone(),
        })
    }

    pub fn normalized_key(&self) -> &str {
        &self.normalized_key
    }

    /// Key as stored, original casing and whitespace
    pub fn key(&self) -> String {
        self.fields
            .get("key")
            .and_then(key_text)
            .unwrap_or_default()
    }

    /// Expiry value as stored (usually an ISO-8601 string)
    pub fn expiry(&self) -> Option<&Value> {
        self.fields.get("expiry").filter(|v| !v.is_null())
    }

    pub fn expiry_at(&self) -> Option<DateTime<Utc>> {
        self.expiry().and_then(parse_timestamp_value)
    }

    pub fn note(&self) -> String {
        match self.fields.get("note") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    /// Recency signal for reconciliation; missing or unparseable reads as the epoch.
    pub fn updated_millis(&self) -> i64 {
        self.fields
            .get("updated")
            .and_then(parse_timestamp_value)
            .map(|ts| ts.timestamp_millis())
            .unwrap_or(0)
    }

    pub fn as_json(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Keys arrive as strings, occasionally as numbers from hand-edited files.
fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(number_text(n)),
        _ => None,
    }
}

/// Integral floats print without a fraction (`1.0` reads as `"1"`), the way
/// browser-side tooling renders them.
fn number_text(n: &serde_json::Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f == 0.0 => "0".to_string(),
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{:.0}", f),
        _ => n.to_string(),
    }
}

/// A validated license ready to be persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub key: String,
    pub expiry: String,
    #[serde(default)]
    pub note: String,
    pub created: String,
    pub updated: String,
}
