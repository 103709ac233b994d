//! External collaborators: remote document store, key-value cache, local file
//!
//! Handlers and source readers only see the traits; concrete backends are
//! chosen from configuration at start-up.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

pub mod file;
pub mod github;
pub mod kv;

pub use file::FsFileStore;
pub use github::GitHubStore;
pub use kv::{MemoryCache, RestKvCache};

/// Collaborator errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    /// Version precondition failed (concurrent write)
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Upstream error {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        // Drop the URL so query strings never end up in logs
        StoreError::Transport(err.without_url().to_string())
    }
}

/// A document read from the remote store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDocument {
    pub content: String,
    /// Version identifier for conditional writes; `None` when the read path
    /// cannot provide one
    pub version: Option<String>,
}

/// Result of a successful remote write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// New document version
    pub version: String,
    pub commit_sha: String,
    pub url: Option<String>,
}

/// Version-controlled document store
#[async_trait]
pub trait RemoteDocumentStore: Send + Sync {
    /// Read a document; `Ok(None)` when it does not exist
    async fn get(&self, path: &str) -> Result<Option<RemoteDocument>, StoreError>;

    /// Write a document. Omitting `version` means "create".
    async fn put(
        &self,
        path: &str,
        content: &str,
        version: Option<&str>,
        message: &str,
    ) -> Result<CommitInfo, StoreError>;

    /// Whether credentials for writing are available
    fn can_write(&self) -> bool {
        true
    }
}

/// Key-value cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError>;
}

/// The local license file
#[async_trait]
pub trait LocalFileStore: Send + Sync {
    async fn exists(&self) -> bool;
    async fn read(&self) -> Result<String, StoreError>;
    async fn write(&self, content: &str) -> Result<(), StoreError>;
    /// Human-readable location for messages
    fn location(&self) -> String;
}

/// Collaborator handles shared by readers and handlers
#[derive(Clone)]
pub struct Stores {
    pub file: Arc<dyn LocalFileStore>,
    pub remote: Option<Arc<dyn RemoteDocumentStore>>,
    pub cache: Option<Arc<dyn CacheStore>>,
    /// Document path inside the remote repository
    pub remote_path: String,
    pub cache_key: String,
}

impl Stores {
    /// Remote store, only when it accepts writes
    pub fn writable_remote(&self) -> Option<&Arc<dyn RemoteDocumentStore>> {
        self.remote.as_ref().filter(|remote| remote.can_write())
    }
}

/// Read the current version, then write conditionally on it.
///
/// A missing document is created. A failed version read (other than rate
/// limiting) is logged and the write proceeds unconditioned; the store then
/// rejects it as a conflict if the document does exist.
pub async fn conditional_write(
    remote: &dyn RemoteDocumentStore,
    path: &str,
    content: &str,
    message: &str,
) -> Result<CommitInfo, StoreError> {
    let version = match remote.get(path).await {
        Ok(document) => document.and_then(|d| d.version),
        Err(e @ StoreError::RateLimited { .. }) => return Err(e),
        Err(e) => {
            tracing::info!(error = %e, path, "Could not read current version, writing without one");
            None
        }
    };
    remote.put(path, content, version.as_deref(), message).await
}
