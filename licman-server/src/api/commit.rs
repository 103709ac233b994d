//! Direct repository commit (`POST /commit`)
//!
//! Writes the submitted array to the remote repository as-is, without
//! normalization.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use licman_common::time::{format_timestamp, now};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use super::error::ApiError;
use super::sync::licenses_array;
use crate::stores::conditional_write;
use crate::AppState;

/// Commit response
#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub success: bool,
    pub message: String,
    pub count: usize,
    pub commit: CommitSummary,
}

#[derive(Debug, Serialize)]
pub struct CommitSummary {
    pub sha: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// POST /commit
pub async fn commit_licenses(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<CommitResponse>, ApiError> {
    let (records, body) = licenses_array(payload)?;

    let remote = state
        .stores
        .writable_remote()
        .ok_or_else(|| ApiError::NotConfigured("GitHub token not configured".to_string()))?;

    let message = body
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("Auto-update licenses.json - {}", format_timestamp(&now())));

    let content = serde_json::to_string_pretty(&records)?;
    let commit = conditional_write(remote.as_ref(), &state.stores.remote_path, &content, &message).await?;

    info!(count = records.len(), commit = %commit.commit_sha, "Licenses committed to remote repository");

    Ok(Json(CommitResponse {
        success: true,
        message: "licenses.json committed to GitHub successfully".to_string(),
        count: records.len(),
        commit: CommitSummary {
            sha: commit.commit_sha,
            message,
            url: commit.url,
        },
    }))
}
