//! GitHub repository client
//!
//! Reads go through the contents API when a token is configured (it returns
//! the blob SHA needed for conditional writes) and fall back to the raw
//! content host otherwise. Writes always use the contents API.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use licman_common::config::RemoteConfig;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{CommitInfo, RemoteDocument, RemoteDocumentStore, StoreError};

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Contents API file response (only the fields we use)
#[derive(Debug, Deserialize)]
struct ContentsResponse {
    content: Option<String>,
    sha: String,
}

#[derive(Debug, Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutContentsResponse {
    content: PutContent,
    commit: PutCommit,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PutCommit {
    sha: String,
    html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubErrorBody {
    message: Option<String>,
}

/// Remote document store backed by one GitHub repository branch
pub struct GitHubStore {
    http_client: reqwest::Client,
    owner: String,
    repo: String,
    branch: String,
    token: Option<String>,
    api_base: String,
    raw_base: String,
    api_timeout: Duration,
    raw_timeout: Duration,
}

impl GitHubStore {
    pub fn new(config: &RemoteConfig) -> Result<Self, StoreError> {
        let (owner, repo) = match (&config.owner, &config.repo) {
            (Some(owner), Some(repo)) if config.is_enabled() => (owner.clone(), repo.clone()),
            _ => {
                return Err(StoreError::NotConfigured(
                    "remote repository owner/name not set".to_string(),
                ))
            }
        };

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http_client,
            owner,
            repo,
            branch: config.branch.clone(),
            token: config.token.clone().filter(|t| !t.trim().is_empty()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            raw_base: config.raw_base.trim_end_matches('/').to_string(),
            api_timeout: Duration::from_millis(config.api_timeout_ms),
            raw_timeout: Duration::from_millis(config.read_timeout_ms),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base, self.owner, self.repo, path
        )
    }

    fn raw_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.raw_base, self.owner, self.repo, self.branch, path
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// Read through the contents API (returns the blob SHA)
    async fn get_via_api(&self, path: &str) -> Result<Option<RemoteDocument>, StoreError> {
        let response = self
            .authorized(self.http_client.get(self.contents_url(path)))
            .query(&[("ref", self.branch.as_str())])
            .header(ACCEPT, GITHUB_ACCEPT)
            .timeout(self.api_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: ContentsResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.without_url().to_string()))?;
        let content = decode_content(body.content.as_deref().unwrap_or_default())?;

        Ok(Some(RemoteDocument {
            content,
            version: Some(body.sha),
        }))
    }

    /// Read through the raw content host (no version available)
    async fn get_via_raw(&self, path: &str) -> Result<Option<RemoteDocument>, StoreError> {
        let response = self
            .http_client
            .get(self.raw_url(path))
            .header(CACHE_CONTROL, "no-cache")
            .timeout(self.raw_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        Ok(Some(RemoteDocument {
            content: response.text().await?,
            version: None,
        }))
    }
}

#[async_trait]
impl RemoteDocumentStore for GitHubStore {
    async fn get(&self, path: &str) -> Result<Option<RemoteDocument>, StoreError> {
        if self.token.is_some() {
            match self.get_via_api(path).await {
                Ok(document) => return Ok(document),
                Err(e) => {
                    tracing::info!(error = %e, "GitHub contents API read failed, trying raw URL");
                }
            }
        }
        self.get_via_raw(path).await
    }

    async fn put(
        &self,
        path: &str,
        content: &str,
        version: Option<&str>,
        message: &str,
    ) -> Result<CommitInfo, StoreError> {
        if self.token.is_none() {
            return Err(StoreError::NotConfigured("GitHub token not configured".to_string()));
        }

        let request = PutContentsRequest {
            message,
            content: STANDARD.encode(content.as_bytes()),
            branch: &self.branch,
            sha: version,
        };

        let response = self
            .authorized(self.http_client.put(self.contents_url(path)))
            .header(ACCEPT, GITHUB_ACCEPT)
            .timeout(self.api_timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: PutContentsResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Parse(e.without_url().to_string()))?;

        tracing::info!(commit = %body.commit.sha, path, "Committed document to GitHub");

        Ok(CommitInfo {
            version: body.content.sha,
            commit_sha: body.commit.sha,
            url: body.commit.html_url,
        })
    }

    fn can_write(&self) -> bool {
        self.token.is_some()
    }
}

/// The contents API wraps base64 at 60 columns
fn decode_content(encoded: &str) -> Result<String, StoreError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| StoreError::Parse(format!("invalid base64 content: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| StoreError::Parse(format!("content is not UTF-8: {}", e)))
}

/// Map a non-success GitHub response onto the store error taxonomy
async fn error_from_response(response: Response) -> StoreError {
    let status = response.status();
    let headers = response.headers().clone();
    let header_str = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let exhausted = header_str("x-ratelimit-remaining").as_deref() == Some("0");
    if status == StatusCode::TOO_MANY_REQUESTS || (status == StatusCode::FORBIDDEN && exhausted) {
        let retry_after_secs = header_str("retry-after")
            .and_then(|v| v.parse::<u64>().ok())
            .or_else(|| {
                header_str("x-ratelimit-reset")
                    .and_then(|v| v.parse::<i64>().ok())
                    .map(|reset| (reset - chrono::Utc::now().timestamp()).max(1) as u64)
            })
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        return StoreError::RateLimited { retry_after_secs };
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GitHubErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or(text);

    match status {
        StatusCode::NOT_FOUND => StoreError::NotFound(message),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => StoreError::Conflict(message),
        _ => StoreError::Upstream {
            status: status.as_u16(),
            message,
        },
    }
}
