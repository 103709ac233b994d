//! licman-server library - license verification and sync service
//!
//! Reconciles license records from a bundled snapshot, a local file, a
//! remote repository and a key-value cache, and exposes verification,
//! listing and batch submission over HTTP.

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use licman_common::config::Config;
use licman_common::license::Messages;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub mod api;
pub mod sources;
pub mod stores;

use sources::{SourceReaders, SourceTimeouts, StaticSnapshot};
use stores::{
    CacheStore, FsFileStore, GitHubStore, RemoteDocumentStore, RestKvCache, StoreError, Stores,
};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub readers: Arc<SourceReaders>,
    pub messages: Messages,
}

impl AppState {
    /// Create new application state
    pub fn new(
        stores: Stores,
        snapshot: StaticSnapshot,
        timeouts: SourceTimeouts,
        messages: Messages,
    ) -> Self {
        let readers = Arc::new(SourceReaders::new(stores.clone(), snapshot, timeouts));
        Self {
            stores,
            readers,
            messages,
        }
    }

    /// Wire up the configured backends
    ///
    /// Unconfigured remote or cache backends are simply absent; a backend
    /// that is configured but cannot be constructed is an error.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let file = Arc::new(FsFileStore::new(config.sources.file_path.clone()));

        let remote: Option<Arc<dyn RemoteDocumentStore>> = match GitHubStore::new(&config.remote) {
            Ok(store) => {
                if !config.remote.can_write() {
                    warn!("Remote repository configured without token: read-only");
                }
                Some(Arc::new(store))
            }
            Err(StoreError::NotConfigured(reason)) => {
                info!(%reason, "Remote repository disabled");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let cache: Option<Arc<dyn CacheStore>> = match RestKvCache::new(&config.cache) {
            Ok(cache) => Some(Arc::new(cache)),
            Err(StoreError::NotConfigured(reason)) => {
                info!(%reason, "Cache disabled");
                None
            }
            Err(e) => return Err(e.into()),
        };

        let stores = Stores {
            file,
            remote,
            cache,
            remote_path: config.remote.path.clone(),
            cache_key: config.cache.key.clone(),
        };

        Ok(Self::new(
            stores,
            StaticSnapshot::load(config.sources.static_path()),
            SourceTimeouts::from_config(config),
            Messages::for_locale(config.messages.locale),
        ))
    }
}

/// Build application router
///
/// Every license route is also served under `/api`.
pub fn build_router(state: AppState) -> Router {
    let license_routes = Router::new()
        .route("/licenses", get(api::list_or_verify))
        .route("/verify", get(api::verify_license))
        .route("/sync", post(api::sync_licenses))
        .route("/commit", post(api::commit_licenses));

    let api_aliases = license_routes
        .clone()
        .route("/github-commit", post(api::commit_licenses));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(license_routes)
        .nest("/api", api_aliases)
        .merge(api::health_routes())
        .layer(CatchPanicLayer::custom(api::error::panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
