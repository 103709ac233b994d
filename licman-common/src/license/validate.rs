//! License status evaluation
//!
//! Status derivation (first match wins):
//! - `expiry - now <= 0` → expired
//! - whole days remaining <= 7 → expiring
//! - otherwise → valid
//!
//! Clients only see `"active"` for both valid and expiring licenses; the
//! difference is carried by the human-readable message.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use super::normalize_key;
use super::reconcile::CanonicalMap;
use crate::time::format_timestamp;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Licenses with this many whole days left (or fewer) are flagged as expiring
pub const EXPIRING_THRESHOLD_DAYS: i64 = 7;

/// Internal license state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LicenseState {
    Valid,
    Expiring,
    Expired,
    NotFound,
}

impl LicenseState {
    pub fn is_valid(&self) -> bool {
        matches!(self, LicenseState::Valid | LicenseState::Expiring)
    }

    /// Status string reported to clients
    pub fn reported_status(&self) -> &'static str {
        if self.is_valid() {
            "active"
        } else {
            // Absent keys reuse the expired tag
            "expired"
        }
    }
}

/// Supported message languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLocale {
    #[default]
    En,
    Vi,
}

impl FromStr for MessageLocale {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "en" => Ok(MessageLocale::En),
            "vi" => Ok(MessageLocale::Vi),
            other => Err(crate::Error::Config(format!("Unsupported locale: {}", other))),
        }
    }
}

/// Human-readable status messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Messages {
    pub valid: &'static str,
    pub expiring: &'static str,
    pub expired: &'static str,
    pub not_found: &'static str,
}

impl Messages {
    pub fn for_locale(locale: MessageLocale) -> Self {
        match locale {
            MessageLocale::En => Self {
                valid: "License is valid",
                expiring: "License is expiring soon",
                expired: "License has expired",
                not_found: "License not found",
            },
            MessageLocale::Vi => Self {
                valid: "License hợp lệ",
                expiring: "License sắp hết hạn",
                expired: "License đã hết hạn",
                not_found: "License không tồn tại",
            },
        }
    }

    pub fn for_state(&self, state: LicenseState) -> &'static str {
        match state {
            LicenseState::Valid => self.valid,
            LicenseState::Expiring => self.expiring,
            LicenseState::Expired => self.expired,
            LicenseState::NotFound => self.not_found,
        }
    }
}

impl Default for Messages {
    fn default() -> Self {
        Self::for_locale(MessageLocale::default())
    }
}

/// Result of evaluating one key against the canonical mapping
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub state: LicenseState,
    /// Stored key (original casing), or the normalized query when not found
    pub key: String,
    pub expiry: Option<Value>,
    pub days_remaining: i64,
    pub note: String,
    pub evaluated_at: DateTime<Utc>,
}

impl Evaluation {
    pub fn is_valid(&self) -> bool {
        self.state.is_valid()
    }

    pub fn to_response(&self, messages: &Messages) -> VerifyResponse {
        VerifyResponse {
            valid: self.is_valid(),
            key: self.key.clone(),
            expiry: self.expiry.clone(),
            status: self.state.reported_status().to_string(),
            message: messages.for_state(self.state).to_string(),
            days_remaining: self.days_remaining,
            note: self.note.clone(),
            timestamp: format_timestamp(&self.evaluated_at),
        }
    }
}

/// Verification response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub valid: bool,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<Value>,
    pub status: String,
    pub message: String,
    pub days_remaining: i64,
    #[serde(default)]
    pub note: String,
    pub timestamp: String,
}

/// Evaluate a query key against the canonical mapping at instant `now`.
pub fn evaluate(map: &CanonicalMap, query_key: &str, now: DateTime<Utc>) -> Evaluation {
    let normalized = normalize_key(query_key);

    let Some(record) = map.get(&normalized) else {
        return Evaluation {
            state: LicenseState::NotFound,
            key: normalized,
            expiry: None,
            days_remaining: 0,
            note: String::new(),
            evaluated_at: now,
        };
    };

    let (state, days_remaining) = match record.expiry_at() {
        Some(expiry) => classify(expiry, now),
        None => {
            tracing::warn!(key = %normalized, "License has no parseable expiry, treating as expired");
            (LicenseState::Expired, 0)
        }
    };

    Evaluation {
        state,
        key: record.key(),
        expiry: record.expiry().cloned(),
        days_remaining,
        note: record.note(),
        evaluated_at: now,
    }
}

/// Derive state and floor-divided whole days from the time left until `expiry`
fn classify(expiry: DateTime<Utc>, now: DateTime<Utc>) -> (LicenseState, i64) {
    let diff_ms = expiry.signed_duration_since(now).num_milliseconds();
    let days_remaining = diff_ms.div_euclid(MILLIS_PER_DAY);

    let state = if diff_ms <= 0 {
        LicenseState::Expired
    } else if days_remaining <= EXPIRING_THRESHOLD_DAYS {
        LicenseState::Expiring
    } else {
        LicenseState::Valid
    };
    (state, days_remaining)
}
