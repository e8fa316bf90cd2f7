//! Configuration management for the Rubric service.
//!
//! The service reads an optional configuration file at `~/.rubric/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (RUBRIC_* prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `RUBRIC_BIND_ADDRESS` → network.bind
//! - `RUBRIC_PORT` → network.port
//! - `RUBRIC_LOG_LEVEL` → observability.log_level
//! - `RUBRIC_LOG_FORMAT` → observability.log_format
//! - `RUBRIC_UPLOAD_DIR` → storage.upload_dir
//! - `RUBRIC_OUTPUT_DIR` → storage.output_dir
//! - `RUBRIC_STORE_CONFIG` → store (JSON blob, see [`RemoteStoreConfig`])

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable holding the remote store configuration as JSON.
pub const STORE_CONFIG_ENV: &str = "RUBRIC_STORE_CONFIG";

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".rubric"),
        |dirs| dirs.home_dir().join(".rubric"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Listener configuration.
///
/// Default is `127.0.0.1:8000` (local only).
/// Set `bind` to `0.0.0.0` to allow remote access.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8000
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Local filesystem locations used by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory uploaded documents are written into.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Directory generated documents are written into before download.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

// ============================================================================
// Summary Configuration
// ============================================================================

/// Background summary settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Number of words kept when summarizing uploaded material.
    #[serde(default = "default_word_limit")]
    pub word_limit: usize,

    /// Number of summary characters quoted in chat responses.
    #[serde(default = "default_chat_preview_chars")]
    pub chat_preview_chars: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            word_limit: default_word_limit(),
            chat_preview_chars: default_chat_preview_chars(),
        }
    }
}

fn default_word_limit() -> usize {
    50
}

fn default_chat_preview_chars() -> usize {
    30
}

// ============================================================================
// Limits Configuration
// ============================================================================

/// Request size limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum accepted request body for uploads, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets clamped to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Remote Store Configuration
// ============================================================================

/// Remote store backend type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Realtime-database style REST API.
    #[default]
    Rest,
    /// Redis server (requires the `redis-backend` feature).
    Redis,
    /// In-process store, nothing survives a restart.
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rest => write!(f, "rest"),
            Self::Redis => write!(f, "redis"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

/// Remote key-value store configuration.
///
/// Supplied as a JSON blob through `RUBRIC_STORE_CONFIG`. A missing or
/// malformed blob falls back to [`RemoteStoreConfig::default`], which points
/// at the default project database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteStoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Base URL of the REST database.
    #[serde(default = "default_database_url", alias = "databaseURL")]
    pub database_url: String,

    /// Optional auth token appended as `?auth=` to REST calls.
    #[serde(default)]
    pub auth: Option<String>,

    /// Redis URL (redis://host:port), used by the redis backend.
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Prefix prepended to every key, e.g. `"classroom-a/"`.
    #[serde(default)]
    pub key_prefix: String,

    /// Request timeout in seconds.
    #[serde(default = "default_store_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RemoteStoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_url: default_database_url(),
            auth: None,
            redis_url: None,
            key_prefix: String::new(),
            timeout_secs: default_store_timeout_secs(),
        }
    }
}

fn default_database_url() -> String {
    "https://rubric-web-app-default-rtdb.firebaseio.com".into()
}

fn default_store_timeout_secs() -> u64 {
    5
}

impl RemoteStoreConfig {
    /// Parse the store configuration blob. An absent or blank blob is the
    /// default project configuration.
    pub fn from_blob(raw: Option<&str>) -> serde_json::Result<Self> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => serde_json::from_str(raw),
            None => Ok(Self::default()),
        }
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the Rubric service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub summary: SummaryConfig,

    #[serde(default)]
    pub limits: LimitsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Remote store configuration. Normally supplied via `RUBRIC_STORE_CONFIG`.
    #[serde(default)]
    pub store: RemoteStoreConfig,

    /// Problems found while loading, logged by the caller once logging is up.
    #[serde(skip)]
    pub load_warnings: Vec<String>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("RUBRIC_BIND_ADDRESS") {
            self.network.bind = bind;
        }
        if let Some(port) = lookup("RUBRIC_PORT") {
            match port.parse() {
                Ok(p) => self.network.port = p,
                Err(_) => self
                    .load_warnings
                    .push(format!("Ignoring invalid RUBRIC_PORT {port:?}")),
            }
        }

        if let Some(level) = lookup("RUBRIC_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("RUBRIC_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Some(dir) = lookup("RUBRIC_UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("RUBRIC_OUTPUT_DIR") {
            self.storage.output_dir = PathBuf::from(dir);
        }

        if let Some(blob) = lookup(STORE_CONFIG_ENV) {
            self.store = match RemoteStoreConfig::from_blob(Some(&blob)) {
                Ok(store) => store,
                Err(e) => {
                    self.load_warnings.push(format!(
                        "Malformed {STORE_CONFIG_ENV} ({e}), using default project"
                    ));
                    RemoteStoreConfig::default()
                }
            };
        }
    }

    /// Socket address string the HTTP listener binds to.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind, self.network.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.listen_addr(), "127.0.0.1:8000");
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.summary.word_limit, 50);
        assert_eq!(config.summary.chat_preview_chars, 30);
        assert_eq!(config.observability.log_level, "info");
        assert_eq!(config.store.backend, StoreBackend::Rest);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"network": {"port": 9100}, "summary": {"word_limit": 10}}"#)
                .unwrap();
        assert_eq!(config.network.port, 9100);
        assert_eq!(config.network.bind, "127.0.0.1");
        assert_eq!(config.summary.word_limit, 10);
        assert_eq!(config.summary.chat_preview_chars, 30);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"storage": {"upload_dir": "/srv/uploads"}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage.upload_dir, PathBuf::from("/srv/uploads"));
        assert_eq!(config.storage.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_load_from_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[
            ("RUBRIC_BIND_ADDRESS", "0.0.0.0"),
            ("RUBRIC_PORT", "9000"),
            ("RUBRIC_LOG_LEVEL", "debug"),
            ("RUBRIC_UPLOAD_DIR", "/tmp/up"),
            (
                STORE_CONFIG_ENV,
                r#"{"backend": "memory", "keyPrefix": "test/"}"#,
            ),
        ]));

        assert_eq!(config.listen_addr(), "0.0.0.0:9000");
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.storage.upload_dir, PathBuf::from("/tmp/up"));
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.key_prefix, "test/");
        assert!(config.load_warnings.is_empty());
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let mut config = Config::default();
        config.apply_overrides(lookup_from(&[("RUBRIC_PORT", "eighty")]));
        assert_eq!(config.network.port, 8000);
        assert_eq!(config.load_warnings.len(), 1);
        assert!(config.load_warnings[0].contains("RUBRIC_PORT"));
    }

    #[test]
    fn test_store_config_missing_uses_default_project() {
        assert_eq!(
            RemoteStoreConfig::from_blob(None).unwrap(),
            RemoteStoreConfig::default()
        );
        assert_eq!(
            RemoteStoreConfig::from_blob(Some("   ")).unwrap(),
            RemoteStoreConfig::default()
        );
    }

    #[test]
    fn test_store_config_malformed_uses_default_project() {
        assert!(RemoteStoreConfig::from_blob(Some("{\"backend\": ")).is_err());

        let mut config = Config::default();
        config.store.key_prefix = "stale/".into();
        config.apply_overrides(lookup_from(&[(STORE_CONFIG_ENV, "{\"backend\": ")]));

        assert_eq!(config.store, RemoteStoreConfig::default());
        assert_eq!(config.load_warnings.len(), 1);
        assert!(config.load_warnings[0].contains(STORE_CONFIG_ENV));
    }

    #[test]
    fn test_store_config_accepts_project_blob() {
        let config = RemoteStoreConfig::from_blob(Some(
            r#"{
                "apiKey": "ignored",
                "databaseURL": "https://example-rtdb.firebaseio.com",
                "auth": "secret"
            }"#,
        ))
        .unwrap();
        assert_eq!(config.backend, StoreBackend::Rest);
        assert_eq!(config.database_url, "https://example-rtdb.firebaseio.com");
        assert_eq!(config.auth.as_deref(), Some("secret"));
        assert_eq!(config.timeout_secs, 5);
    }
}
