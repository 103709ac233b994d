//! Batch normalization applied before a submitted collection is persisted
//!
//! Unlike reconciliation, duplicates are resolved by submission order: the
//! caller is expected to send an already curated list, so the first
//! occurrence of a key is kept.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

use super::{normalize_key, License};
use crate::time::{format_timestamp, parse_timestamp, parse_timestamp_value};
use crate::{Error, Result};

/// Validate, normalize and deduplicate a submitted batch.
///
/// Records need a non-empty string `key` and a parseable `expiry`. Fails with
/// [`Error::ValidationFailed`] when the input had records but none survived.
pub fn normalize_batch(records: &[Value], now: DateTime<Utc>) -> Result<Vec<License>> {
    let now_text = format_timestamp(&now);
    let mut seen = HashSet::new();
    let mut licenses = Vec::with_capacity(records.len());

    for (index, raw) in records.iter().enumerate() {
        let Some(license) = normalize_record(raw, &now_text) else {
            tracing::debug!(index, "Dropping invalid license record from batch");
            continue;
        };
        if !seen.insert(license.key.clone()) {
            tracing::debug!(index, key = %license.key, "Dropping duplicate license key from batch");
            continue;
        }
        licenses.push(license);
    }

    if licenses.is_empty() && !records.is_empty() {
        return Err(Error::ValidationFailed(format!(
            "none of the {} submitted licenses has a key and a valid expiry",
            records.len()
        )));
    }

    Ok(licenses)
}

fn normalize_record(raw: &Value, now_text: &str) -> Option<License> {
    let fields = raw.as_object()?;

    let key = normalize_key(fields.get("key")?.as_str()?);
    if key.is_empty() {
        return None;
    }

    let expiry = fields.get("expiry")?.as_str()?;
    parse_timestamp(expiry)?;

    let note = fields
        .get("note")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(License {
        key,
        expiry: expiry.trim().to_string(),
        note,
        created: timestamp_or(fields.get("created"), now_text),
        updated: timestamp_or(fields.get("updated"), now_text),
    })
}

/// Keep a parseable timestamp as submitted (strings) or reformatted (epoch millis)
fn timestamp_or(value: Option<&Value>, fallback: &str) -> String {
    match value {
        Some(Value::String(s)) if parse_timestamp(s).is_some() => s.trim().to_string(),
        Some(other) => parse_timestamp_value(other)
            .map(|ts| format_timestamp(&ts))
            .unwrap_or_else(|| fallback.to_string()),
        None => fallback.to_string(),
    }
}
