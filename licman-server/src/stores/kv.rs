//! Key-value cache backends
//!
//! `RestKvCache` talks to a Redis REST endpoint (Vercel KV / Upstash API
//! shape): `GET {url}/get/{key}` and `POST {url}/set/{key}`, both answering
//! `{"result": ...}`. Values are stored as JSON text.

use async_trait::async_trait;
use licman_common::config::CacheConfig;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;

use super::{CacheStore, StoreError};

#[derive(Debug, Deserialize)]
struct RestResult {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

/// REST key-value cache client
pub struct RestKvCache {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestKvCache {
    pub fn new(config: &CacheConfig) -> Result<Self, StoreError> {
        let (url, token) = match (&config.url, &config.token) {
            (Some(url), Some(token)) if config.is_enabled() => (url.clone(), token.clone()),
            _ => return Err(StoreError::NotConfigured("cache url/token not set".to_string())),
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            http_client,
            base_url: url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn call(&self, request: reqwest::RequestBuilder) -> Result<Value, StoreError> {
        let response = request
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(1);
            return Err(StoreError::RateLimited { retry_after_secs });
        }

        let text = response.text().await?;
        let body: RestResult = serde_json::from_str(&text)
            .map_err(|e| StoreError::Parse(format!("cache response: {}", e)))?;

        if let Some(error) = body.error {
            return Err(StoreError::Upstream {
                status: status.as_u16(),
                message: error,
            });
        }
        if !status.is_success() {
            return Err(StoreError::Upstream {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(body.result)
    }
}

#[async_trait]
impl CacheStore for RestKvCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let url = format!("{}/get/{}", self.base_url, key);
        let result = self.call(self.http_client.get(url)).await?;
        Ok(decode_cached(result))
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let url = format!("{}/set/{}", self.base_url, key);
        let body = serde_json::to_string(value)
            .map_err(|e| StoreError::Parse(e.to_string()))?;
        self.call(self.http_client.post(url).body(body)).await?;
        Ok(())
    }
}

/// Cached values come back as JSON text; anything else is returned as-is
fn decode_cached(result: Value) -> Option<Value> {
    match result {
        Value::Null => None,
        Value::String(text) => Some(serde_json::from_str(&text).unwrap_or(Value::String(text))),
        other => Some(other),
    }
}

/// In-process cache
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}
