//! Configuration loading
//!
//! Settings are resolved in this priority order:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: defaults are used and a warning is
//! logged. A TOML file that exists but does not parse is.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::license::MessageLocale;
use crate::{Error, Result};

/// Environment variables consulted by [`Config::apply_env_overrides`]
pub mod env {
    pub const PORT: &str = "LICMAN_PORT";
    pub const BIND: &str = "LICMAN_BIND";
    pub const LOCALE: &str = "LICMAN_LOCALE";
    pub const LOG_LEVEL: &str = "LICMAN_LOG_LEVEL";
    pub const REPO_OWNER: &str = "GITHUB_REPO_OWNER";
    pub const REPO_NAME: &str = "GITHUB_REPO_NAME";
    pub const REPO_BRANCH: &str = "GITHUB_REPO_BRANCH";
    pub const GITHUB_TOKEN: &str = "GITHUB_TOKEN";
    pub const KV_URL: &str = "KV_REST_API_URL";
    pub const KV_TOKEN: &str = "KV_REST_API_TOKEN";
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub sources: SourcesConfig,
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub messages: MessagesConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Local license files
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// Local copy, re-read on every verification
    pub file_path: PathBuf,
    /// Bundled fallback, read once at start-up (defaults to `file_path`)
    pub static_path: Option<PathBuf>,
    pub file_timeout_ms: u64,
}

impl SourcesConfig {
    pub fn static_path(&self) -> &Path {
        self.static_path.as_deref().unwrap_or(&self.file_path)
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from("licenses.json"),
            static_path: None,
            file_timeout_ms: 2000,
        }
    }
}

/// Remote repository (GitHub) settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub branch: String,
    pub path: String,
    pub token: Option<String>,
    pub api_base: String,
    pub raw_base: String,
    pub read_timeout_ms: u64,
    pub api_timeout_ms: u64,
    pub user_agent: String,
}

impl RemoteConfig {
    /// Remote reads need an owner and a repository name
    pub fn is_enabled(&self) -> bool {
        non_empty(&self.owner) && non_empty(&self.repo)
    }

    /// Commits additionally need a token
    pub fn can_write(&self) -> bool {
        self.is_enabled() && non_empty(&self.token)
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            owner: None,
            repo: None,
            branch: "main".to_string(),
            path: "licenses.json".to_string(),
            token: None,
            api_base: "https://api.github.com".to_string(),
            raw_base: "https://raw.githubusercontent.com".to_string(),
            read_timeout_ms: 7000,
            api_timeout_ms: 5000,
            user_agent: "License-Manager-Pro".to_string(),
        }
    }
}

/// REST key-value cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub key: String,
    pub timeout_ms: u64,
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        non_empty(&self.url) && non_empty(&self.token)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            token: None,
            key: "licenses".to_string(),
            timeout_ms: 3000,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "licman_server=info,licman_common=info,tower_http=info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub locale: MessageLocale,
}

impl Config {
    /// Load configuration from TOML (explicit path or default locations),
    /// then apply environment overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let (config, source) = Self::load_with_source(explicit_path)?;
        log_source(source.as_deref());
        Ok(config)
    }

    /// Same as [`Config::load`] without logging; also returns the TOML file
    /// that was read, if any.
    ///
    /// Lets the binary load its log level before a subscriber exists and
    /// report the source once one does (see [`log_source`]).
    pub fn load_with_source(explicit_path: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let source = match explicit_path {
            Some(path) => Some(path.to_path_buf()),
            None => locate_config_file(),
        };
        let mut config = match &source {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        Ok((config, source))
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Overlay environment variables on top of file/default values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(port) = env_var(env::PORT) {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("{} is not a valid port: {}", env::PORT, port)))?;
        }
        if let Some(bind) = env_var(env::BIND) {
            self.server.bind = bind;
        }
        if let Some(locale) = env_var(env::LOCALE) {
            self.messages.locale = locale.parse()?;
        }
        if let Some(level) = env_var(env::LOG_LEVEL) {
            self.logging.level = level;
        }

        override_opt(&mut self.remote.owner, env::REPO_OWNER);
        override_opt(&mut self.remote.repo, env::REPO_NAME);
        if let Some(branch) = env_var(env::REPO_BRANCH) {
            self.remote.branch = branch;
        }
        override_opt(&mut self.remote.token, env::GITHUB_TOKEN);

        override_opt(&mut self.cache.url, env::KV_URL);
        override_opt(&mut self.cache.token, env::KV_TOKEN);
        Ok(())
    }
}

/// Report where configuration came from
pub fn log_source(source: Option<&Path>) {
    match source {
        Some(path) => info!("Loaded configuration from {}", path.display()),
        None => warn!("No config file found, using compiled defaults"),
    }
}

/// Find the first existing config file in the platform locations
pub fn locate_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("licman").join("config.toml"));
    let system_config = PathBuf::from("/etc/licman/config.toml");

    user_config
        .into_iter()
        .chain(std::iter::once(system_config))
        .find(|path| path.exists())
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn override_opt(slot: &mut Option<String>, name: &str) {
    if let Some(value) = env_var(name) {
        *slot = Some(value);
    }
}

fn non_empty(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}
