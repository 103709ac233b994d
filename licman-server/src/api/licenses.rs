//! License listing and verification
//!
//! - `GET /licenses` returns the raw collection from the best available store
//! - `GET /licenses?verify=<key>` and `GET /verify?verify=<key>` evaluate one key

use axum::{
    extract::{Query, State},
    http::{header, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use licman_common::license::{evaluate, merge, VerifyResponse};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::error::ApiError;
use crate::AppState;

const NO_CACHE_HEADERS: [(HeaderName, &str); 4] = [
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate, max-age=0"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
];

/// Query parameters for license routes
#[derive(Debug, Default, Deserialize)]
pub struct LicenseQuery {
    /// Key to verify
    pub verify: Option<String>,
}

/// GET /licenses
///
/// Lists licenses, or verifies one key when `verify` is present.
pub async fn list_or_verify(
    State(state): State<AppState>,
    Query(query): Query<LicenseQuery>,
) -> Result<Response, ApiError> {
    match query.verify {
        Some(key) => Ok(verify_key(&state, &key).await?.into_response()),
        None => Ok(list_licenses(&state).await),
    }
}

/// GET /verify
pub async fn verify_license(
    State(state): State<AppState>,
    Query(query): Query<LicenseQuery>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let key = query.verify.unwrap_or_default();
    verify_key(&state, &key).await
}

async fn verify_key(state: &AppState, key: &str) -> Result<Json<VerifyResponse>, ApiError> {
    if key.trim().is_empty() {
        return Err(ApiError::MissingLicenseKey);
    }

    let sources = state.readers.read_all().await;
    let counts: Vec<String> = sources
        .iter()
        .map(|s| format!("{}={}", s.kind, s.len()))
        .collect();
    debug!(sources = %counts.join(","), "Read license sources");

    let map = merge(&sources);
    let evaluation = evaluate(&map, key, licman_common::time::now());

    info!(
        key = %evaluation.key,
        state = ?evaluation.state,
        days_remaining = evaluation.days_remaining,
        "License verified"
    );

    Ok(Json(evaluation.to_response(&state.messages)))
}

async fn list_licenses(state: &AppState) -> Response {
    let licenses = state.readers.best_available().await;
    info!(count = licenses.len(), "Listing licenses");

    let mut response = Json(Value::Array(licenses)).into_response();
    let headers = response.headers_mut();
    for (name, value) in NO_CACHE_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    response
}
