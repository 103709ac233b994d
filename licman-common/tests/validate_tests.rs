//! Integration tests for license status evaluation
//!
//! Tests cover:
//! - Not-found keys
//! - Expired / expiring / valid boundaries
//! - Unparseable expiry handling
//! - Response shape (reported status, key casing, note default)

use chrono::{DateTime, Duration, TimeZone, Utc};
use licman_common::license::{
    evaluate, merge, CanonicalMap, LicenseState, MessageLocale, Messages, SourceCollection,
    SourceKind,
};
use licman_common::time::format_timestamp;
use serde_json::{json, Value};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
}

fn map_of(records: Vec<Value>) -> CanonicalMap {
    merge(&[SourceCollection::new(SourceKind::File, records)])
}

fn expiring_in(delta: Duration) -> Value {
    json!(format_timestamp(&(now() + delta)))
}

#[test]
fn test_absent_key_is_expired_with_zero_days() {
    let map = map_of(vec![json!({"key": "OTHER", "expiry": "2099-01-01"})]);
    let evaluation = evaluate(&map, " missing-key ", now());

    assert_eq!(evaluation.state, LicenseState::NotFound);
    let response = evaluation.to_response(&Messages::default());
    assert!(!response.valid);
    assert_eq!(response.status, "expired");
    assert_eq!(response.days_remaining, 0);
    assert_eq!(response.key, "MISSING-KEY");
    assert_eq!(response.message, "License not found");
    assert!(response.expiry.is_none());
}

#[test]
fn test_expiry_equal_to_now_is_expired() {
    let map = map_of(vec![json!({"key": "K", "expiry": expiring_in(Duration::zero())})]);
    let evaluation = evaluate(&map, "k", now());

    assert_eq!(evaluation.state, LicenseState::Expired);
    assert!(!evaluation.is_valid());
    assert_eq!(evaluation.days_remaining, 0);
}

#[test]
fn test_exactly_seven_days_is_expiring() {
    let map = map_of(vec![json!({"key": "K", "expiry": expiring_in(Duration::days(7))})]);
    let evaluation = evaluate(&map, "K", now());

    assert_eq!(evaluation.state, LicenseState::Expiring);
    assert_eq!(evaluation.days_remaining, 7);

    let response = evaluation.to_response(&Messages::default());
    assert!(response.valid);
    assert_eq!(response.status, "active");
    assert_eq!(response.message, "License is expiring soon");
}

#[test]
fn test_eight_days_is_valid() {
    let map = map_of(vec![json!({"key": "K", "expiry": expiring_in(Duration::days(8))})]);
    let evaluation = evaluate(&map, "K", now());

    assert_eq!(evaluation.state, LicenseState::Valid);
    assert_eq!(evaluation.days_remaining, 8);
    let response = evaluation.to_response(&Messages::default());
    assert_eq!(response.status, "active");
    assert_eq!(response.message, "License is valid");
}

#[test]
fn test_days_remaining_uses_floor_not_round() {
    let delta = Duration::days(6) + Duration::hours(22);
    let map = map_of(vec![json!({"key": "K", "expiry": expiring_in(delta)})]);

    assert_eq!(evaluate(&map, "K", now()).days_remaining, 6);
}

#[test]
fn test_past_expiry_reports_negative_days() {
    let map = map_of(vec![json!({"key": "K", "expiry": "2025-05-30T09:30:00Z"})]);
    let response = evaluate(&map, "K", now()).to_response(&Messages::default());

    assert!(!response.valid);
    assert_eq!(response.status, "expired");
    assert_eq!(response.days_remaining, -2);
    assert_eq!(response.message, "License has expired");
}

#[test]
fn test_unparseable_expiry_is_expired() {
    let map = map_of(vec![
        json!({"key": "BAD", "expiry": "someday"}),
        json!({"key": "NONE"}),
    ]);

    for key in ["BAD", "NONE"] {
        let evaluation = evaluate(&map, key, now());
        assert_eq!(evaluation.state, LicenseState::Expired, "key {}", key);
        assert_eq!(evaluation.days_remaining, 0);
    }
}

#[test]
fn test_response_carries_stored_fields() {
    let map = map_of(vec![json!({
        "key": "MixedCase-01",
        "expiry": "2099-12-31",
        "note": "Studio licence"
    })]);
    let response = evaluate(&map, "mixedcase-01", now()).to_response(&Messages::default());

    assert_eq!(response.key, "MixedCase-01");
    assert_eq!(response.expiry, Some(json!("2099-12-31")));
    assert_eq!(response.note, "Studio licence");
    assert_eq!(response.timestamp, "2025-06-01T09:30:00.000Z");
}

#[test]
fn test_vietnamese_messages() {
    let map = map_of(vec![json!({"key": "K", "expiry": "2099-01-01"})]);
    let messages = Messages::for_locale(MessageLocale::Vi);

    let found = evaluate(&map, "K", now()).to_response(&messages);
    assert_eq!(found.message, "License hợp lệ");

    let missing = evaluate(&map, "X", now()).to_response(&messages);
    assert_eq!(missing.message, "License không tồn tại");
}

#[test]
fn test_response_json_field_names() {
    let map = map_of(vec![json!({"key": "K", "expiry": "2099-01-01"})]);
    let body = serde_json::to_value(evaluate(&map, "K", now()).to_response(&Messages::default()))
        .unwrap();

    for field in [
        "valid",
        "key",
        "expiry",
        "status",
        "message",
        "days_remaining",
        "note",
        "timestamp",
    ] {
        assert!(body.get(field).is_some(), "missing field {}", field);
    }
}
