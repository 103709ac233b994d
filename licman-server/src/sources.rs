//! Source readers
//!
//! One reader per origin (static snapshot, local file, remote repository,
//! cache). Each reader returns `Result` internally; [`bounded`] applies the
//! per-origin timeout and turns any failure into an empty collection, so the
//! reconciler only ever sees collections.

use licman_common::config::Config;
use licman_common::license::{SourceCollection, SourceKind};
use serde_json::Value;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::stores::{StoreError, Stores};

/// Why a source contributed nothing
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source not configured")]
    NotConfigured,

    #[error("no data")]
    Empty,

    #[error("document is not a JSON array")]
    NotArray,

    #[error("invalid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Bundled fallback collection, loaded once at start-up
#[derive(Debug, Clone, Default)]
pub struct StaticSnapshot {
    records: Arc<Vec<Value>>,
}

impl StaticSnapshot {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records: Arc::new(records),
        }
    }

    /// Load the snapshot from disk; a missing or malformed file yields an empty snapshot.
    pub fn load(path: &Path) -> Self {
        let records = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| parse_collection(&text).map_err(|e| e.to_string()));

        match records {
            Ok(records) => {
                info!(path = %path.display(), count = records.len(), "Loaded static license snapshot");
                Self::new(records)
            }
            Err(reason) => {
                warn!(path = %path.display(), %reason, "Static license snapshot unavailable, starting empty");
                Self::default()
            }
        }
    }

    pub fn records(&self) -> &[Value] {
        &self.records
    }
}

/// Per-origin read timeouts
#[derive(Debug, Clone, Copy)]
pub struct SourceTimeouts {
    pub file: Duration,
    pub remote: Duration,
    pub cache: Duration,
}

impl SourceTimeouts {
    pub fn from_config(config: &Config) -> Self {
        // The remote store may try the contents API before the raw URL
        let remote = config.remote.read_timeout_ms + config.remote.api_timeout_ms;
        Self {
            file: Duration::from_millis(config.sources.file_timeout_ms),
            remote: Duration::from_millis(remote),
            cache: Duration::from_millis(config.cache.timeout_ms),
        }
    }
}

impl Default for SourceTimeouts {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Reads every origin for one verification request
pub struct SourceReaders {
    stores: Stores,
    snapshot: StaticSnapshot,
    timeouts: SourceTimeouts,
}

impl SourceReaders {
    pub fn new(stores: Stores, snapshot: StaticSnapshot, timeouts: SourceTimeouts) -> Self {
        Self {
            stores,
            snapshot,
            timeouts,
        }
    }

    /// Read all four origins concurrently; never fails.
    ///
    /// Returned in merge precedence order.
    pub async fn read_all(&self) -> Vec<SourceCollection> {
        let static_source = SourceCollection::new(SourceKind::Static, self.snapshot.records().to_vec());

        let (file, remote, cache) = tokio::join!(
            bounded(SourceKind::File, self.timeouts.file, self.read_file()),
            bounded(SourceKind::Remote, self.timeouts.remote, self.read_remote()),
            bounded(SourceKind::Cache, self.timeouts.cache, self.read_cache()),
        );

        vec![static_source, file, remote, cache]
    }

    /// Best single collection for listing: cache, then remote, then empty.
    pub async fn best_available(&self) -> Vec<Value> {
        let cache = bounded(SourceKind::Cache, self.timeouts.cache, self.read_cache()).await;
        if !cache.is_empty() {
            return cache.records;
        }
        bounded(SourceKind::Remote, self.timeouts.remote, self.read_remote())
            .await
            .records
    }

    async fn read_file(&self) -> Result<Vec<Value>, SourceError> {
        if !self.stores.file.exists().await {
            return Err(SourceError::Empty);
        }
        let text = self.stores.file.read().await?;
        parse_collection(&text)
    }

    async fn read_remote(&self) -> Result<Vec<Value>, SourceError> {
        let remote = self.stores.remote.as_ref().ok_or(SourceError::NotConfigured)?;
        let document = remote
            .get(&self.stores.remote_path)
            .await?
            .ok_or(SourceError::Empty)?;
        parse_collection(&document.content)
    }

    async fn read_cache(&self) -> Result<Vec<Value>, SourceError> {
        let cache = self.stores.cache.as_ref().ok_or(SourceError::NotConfigured)?;
        match cache.get(&self.stores.cache_key).await? {
            Some(Value::Array(records)) => Ok(records),
            Some(_) => Err(SourceError::NotArray),
            None => Err(SourceError::Empty),
        }
    }
}

/// Run one reader under its timeout and absorb every failure into an empty collection
pub async fn bounded<F>(kind: SourceKind, timeout: Duration, read: F) -> SourceCollection
where
    F: Future<Output = Result<Vec<Value>, SourceError>>,
{
    match tokio::time::timeout(timeout, read).await {
        Ok(Ok(records)) => {
            debug!(source = %kind, count = records.len(), "Loaded licenses");
            SourceCollection::new(kind, records)
        }
        Ok(Err(SourceError::NotConfigured)) => SourceCollection::empty(kind),
        Ok(Err(e)) => {
            info!(source = %kind, reason = %e, "Source unavailable, treating as empty");
            SourceCollection::empty(kind)
        }
        Err(_) => {
            warn!(source = %kind, timeout_ms = timeout.as_millis() as u64, "Source read timed out");
            SourceCollection::empty(kind)
        }
    }
}

/// Parse a JSON document that must be an array of records
pub fn parse_collection(text: &str) -> Result<Vec<Value>, SourceError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(records) => Ok(records),
        _ => Err(SourceError::NotArray),
    }
}
