//! Unit tests for configuration loading and priority order
//!
//! Tests cover:
//! - Compiled defaults
//! - TOML parsing with partial sections
//! - Environment overrides on top of TOML values
//! - Missing/invalid config file handling
//!
//! Note: Uses serial_test crate to prevent ENV variable race conditions.
//! Tests that touch GITHUB_* / KV_* / LICMAN_* variables are marked #[serial].

use licman_common::config::{env as vars, Config};
use licman_common::license::MessageLocale;
use serial_test::serial;
use std::env;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn clear_env() {
    for name in [
        vars::PORT,
        vars::BIND,
        vars::LOCALE,
        vars::LOG_LEVEL,
        vars::REPO_OWNER,
        vars::REPO_NAME,
        vars::REPO_BRANCH,
        vars::GITHUB_TOKEN,
        vars::KV_URL,
        vars::KV_TOKEN,
    ] {
        env::remove_var(name);
    }
}

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Should create temp file");
    file.write_all(content.as_bytes()).expect("Should write config");
    file
}

#[test]
fn test_compiled_defaults() {
    let config = Config::default();

    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.bind, "0.0.0.0");
    assert_eq!(config.sources.file_path, PathBuf::from("licenses.json"));
    assert_eq!(config.sources.static_path(), config.sources.file_path.as_path());
    assert_eq!(config.remote.branch, "main");
    assert_eq!(config.remote.path, "licenses.json");
    assert_eq!(config.remote.read_timeout_ms, 7000);
    assert_eq!(config.cache.key, "licenses");
    assert_eq!(config.messages.locale, MessageLocale::En);

    // Nothing external is enabled without explicit settings
    assert!(!config.remote.is_enabled());
    assert!(!config.remote.can_write());
    assert!(!config.cache.is_enabled());
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = Config::from_toml_str(
        r#"
        [server]
        port = 8080

        [remote]
        owner = "acme"
        repo = "licenses"

        [messages]
        locale = "vi"
        "#,
    )
    .expect("Should parse partial config");

    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.bind, "0.0.0.0");
    assert!(config.remote.is_enabled());
    assert!(!config.remote.can_write());
    assert_eq!(config.remote.branch, "main");
    assert_eq!(config.messages.locale, MessageLocale::Vi);
}

#[test]
fn test_static_path_override() {
    let config = Config::from_toml_str(
        r#"
        [sources]
        file_path = "/srv/licenses.json"
        static_path = "/opt/licman/bundled.json"
        "#,
    )
    .unwrap();

    assert_eq!(
        config.sources.static_path(),
        PathBuf::from("/opt/licman/bundled.json").as_path()
    );
}

#[test]
fn test_invalid_toml_is_config_error() {
    let err = Config::from_toml_str("[server]\nport = \"not a number\"").unwrap_err();
    assert!(err.to_string().starts_with("Configuration error"));
}

#[test]
#[serial]
fn test_explicit_missing_file_is_error() {
    clear_env();
    let result = Config::load(Some(PathBuf::from("/nonexistent/licman.toml").as_path()));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_env_overrides_toml() {
    clear_env();
    let file = write_config(
        r#"
        [server]
        port = 4000

        [remote]
        owner = "from-file"
        repo = "repo"
        "#,
    );

    env::set_var(vars::PORT, "5000");
    env::set_var(vars::REPO_OWNER, "from-env");
    env::set_var(vars::GITHUB_TOKEN, "ghp_test");
    env::set_var(vars::KV_URL, "https://kv.example.com");
    env::set_var(vars::KV_TOKEN, "kv-token");

    let config = Config::load(Some(file.path())).expect("Should load config");

    assert_eq!(config.server.port, 5000);
    assert_eq!(config.remote.owner.as_deref(), Some("from-env"));
    assert_eq!(config.remote.repo.as_deref(), Some("repo"));
    assert!(config.remote.can_write());
    assert!(config.cache.is_enabled());

    clear_env();
}

#[test]
#[serial]
fn test_load_with_source_reports_file() {
    clear_env();
    let file = write_config("[server]\nport = 4100\n");

    let (config, source) = Config::load_with_source(Some(file.path())).expect("Should load config");
    assert_eq!(config.server.port, 4100);
    assert_eq!(source.as_deref(), Some(file.path()));

    clear_env();
}

#[test]
#[serial]
fn test_blank_env_values_are_ignored() {
    clear_env();
    let file = write_config("[remote]\nowner = \"acme\"\nrepo = \"r\"\n");
    env::set_var(vars::REPO_OWNER, "   ");

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.remote.owner.as_deref(), Some("acme"));

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_port_is_error() {
    clear_env();
    let file = write_config("");
    env::set_var(vars::PORT, "http");

    let result = Config::load(Some(file.path()));
    assert!(result.is_err());

    clear_env();
}

#[test]
#[serial]
fn test_invalid_env_locale_is_error() {
    clear_env();
    let file = write_config("");
    env::set_var(vars::LOCALE, "klingon");

    assert!(Config::load(Some(file.path())).is_err());

    clear_env();
}
