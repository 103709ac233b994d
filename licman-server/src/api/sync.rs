//! Batch submission (`POST /sync`)
//!
//! **Persistence order:**
//! 1. Cache, when configured
//! 2. Remote repository, when writable (read version, conditional write)
//! 3. Local license file
//! 4. Nothing writable: echo the normalized JSON for a manual commit
//!
//! Conflicts and rate limits stop the chain and go back to the caller; other
//! store failures fall through to the next target.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use licman_common::license::normalize_batch;
use licman_common::time::{format_timestamp, now};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::error::{ApiError, INVALID_BODY_MESSAGE};
use crate::stores::{conditional_write, StoreError, Stores};
use crate::AppState;

/// Sync response
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
    /// Where the batch ended up: "cache", "remote", "file" or "manual"
    pub target: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub licenses: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_content: Option<String>,
}

impl SyncResponse {
    fn stored(target: &'static str, message: impl Into<String>, count: usize) -> Self {
        Self {
            success: true,
            message: message.into(),
            count,
            target,
            licenses: None,
            json_content: None,
        }
    }
}

/// Extract the `licenses` array from a request body
pub(crate) fn licenses_array(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(Vec<Value>, Value), ApiError> {
    let Json(body) = payload.map_err(|e| {
        warn!(error = %e, "Rejected request body");
        ApiError::InvalidBody(INVALID_BODY_MESSAGE.to_string())
    })?;
    match body.get("licenses") {
        Some(Value::Array(records)) => Ok((records.clone(), body)),
        _ => Err(ApiError::InvalidBody(INVALID_BODY_MESSAGE.to_string())),
    }
}

/// POST /sync
pub async fn sync_licenses(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SyncResponse>, ApiError> {
    let (records, _) = licenses_array(payload)?;

    let batch = normalize_batch(&records, now())?;
    let count = batch.len();
    info!(submitted = records.len(), accepted = count, "Sync batch normalized");

    let value = serde_json::to_value(&batch)?;
    let response = persist(&state.stores, &value, count).await?;
    info!(destination = response.target, count, "Sync completed");
    Ok(Json(response))
}

async fn persist(stores: &Stores, value: &Value, count: usize) -> Result<SyncResponse, ApiError> {
    if let Some(cache) = &stores.cache {
        match cache.set(&stores.cache_key, value).await {
            Ok(()) => {
                return Ok(SyncResponse::stored("cache", "Licenses synced to cache", count));
            }
            Err(e) => fall_through("cache", e)?,
        }
    }

    let pretty = serde_json::to_string_pretty(value)?;

    if let Some(remote) = stores.writable_remote() {
        let message = format!("Sync licenses - {}", format_timestamp(&now()));
        let attempt = conditional_write(remote.as_ref(), &stores.remote_path, &pretty, &message);
        match attempt.await {
            Ok(commit) => {
                info!(commit = %commit.commit_sha, "Sync written to remote repository");
                return Ok(SyncResponse::stored(
                    "remote",
                    "Licenses synced to remote repository",
                    count,
                ));
            }
            Err(e) => fall_through("remote", e)?,
        }
    }

    match stores.file.write(&pretty).await {
        Ok(()) => Ok(SyncResponse::stored(
            "file",
            format!("Licenses synced to {}", stores.file.location()),
            count,
        )),
        Err(e) => {
            warn!(error = %e, "Cannot write license file, returning content for manual commit");
            Ok(SyncResponse {
                success: true,
                message: "Please commit licenses.json to Git".to_string(),
                count,
                target: "manual",
                licenses: Some(value.clone()),
                json_content: Some(pretty),
            })
        }
    }
}

/// Conflicts and rate limits must reach the caller; everything else moves on.
fn fall_through(target: &str, err: StoreError) -> Result<(), ApiError> {
    match err {
        StoreError::Conflict(_) | StoreError::RateLimited { .. } => Err(err.into()),
        other => {
            warn!(destination = target, error = %other, "Sync target failed, trying next");
            Ok(())
        }
    }
}
