//! Configuration management for the Tutor client.
//!
//! Configuration lives in a single file at `~/.tutor/config.json`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (`TUTOR_*` prefix)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `TUTOR_BASE_URL` → backend.base_url
//! - `TUTOR_TIMEOUT_SECS` → backend.timeout_secs
//! - `TUTOR_MAX_ATTEMPTS` → backend.max_attempts
//! - `TUTOR_BACKOFF_MS` → backend.backoff_ms
//! - `TUTOR_RETRY_POLICY` → backend.retry_policy (`transient_only`, `all_failures`)
//! - `TUTOR_STORAGE_PATH` → storage.path
//! - `TUTOR_LOG_LEVEL` → observability.log_level
//! - `TUTOR_LOG_FORMAT` → observability.log_format

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".tutor"),
        |dirs| dirs.home_dir().join(".tutor"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Root
// ============================================================================

/// Root configuration for the Tutor client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TutorConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub image: ImageConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl TutorConfig {
    /// Load configuration from the default path, falling back to defaults.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
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

    /// Load configuration (explicit path or default) with environment overrides applied.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `TUTOR_*` environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("TUTOR_BASE_URL") {
            self.backend.base_url = url;
        }
        if let Some(raw) = lookup("TUTOR_TIMEOUT_SECS") {
            match raw.parse() {
                Ok(secs) => self.backend.timeout_secs = secs,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid TUTOR_TIMEOUT_SECS"),
            }
        }
        if let Some(raw) = lookup("TUTOR_MAX_ATTEMPTS") {
            match raw.parse() {
                Ok(attempts) => self.backend.max_attempts = attempts,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid TUTOR_MAX_ATTEMPTS"),
            }
        }
        if let Some(raw) = lookup("TUTOR_BACKOFF_MS") {
            match raw.parse() {
                Ok(ms) => self.backend.backoff_ms = ms,
                Err(_) => tracing::warn!(value = %raw, "Ignoring invalid TUTOR_BACKOFF_MS"),
            }
        }
        if let Some(raw) = lookup("TUTOR_RETRY_POLICY") {
            match raw.parse() {
                Ok(policy) => self.backend.retry_policy = policy,
                Err(e) => tracing::warn!(value = %raw, error = %e, "Ignoring invalid TUTOR_RETRY_POLICY"),
            }
        }
        if let Some(path) = lookup("TUTOR_STORAGE_PATH") {
            self.storage.path = Some(path);
        }
        if let Some(level) = lookup("TUTOR_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("TUTOR_LOG_FORMAT") {
            self.observability.log_format = format;
        }
    }
}

// ============================================================================
// Backend
// ============================================================================

/// Which failed attempts the dispatcher may retry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Retry transport errors, timeouts, 5xx, 408 and 429. Other 4xx fail at once.
    #[default]
    TransientOnly,
    /// Retry every failure including client errors.
    AllFailures,
}

impl RetryPolicy {
    /// Whether a non-2xx response with this status may be retried.
    pub fn retries_status(self, status: u16) -> bool {
        match self {
            Self::AllFailures => true,
            Self::TransientOnly => status >= 500 || status == 408 || status == 429,
        }
    }
}

impl FromStr for RetryPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "transient_only" | "transient" => Ok(Self::TransientOnly),
            "all_failures" | "all" => Ok(Self::AllFailures),
            other => Err(format!("Unknown retry policy: {other}")),
        }
    }
}

/// Backend service connection and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the assistant backend (endpoints are appended as `/api/...`)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-attempt deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per dispatch, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff in milliseconds; attempt `n` waits `n * backoff_ms`
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,

    #[serde(default)]
    pub retry_policy: RetryPolicy,
}

impl BackendConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
            retry_policy: RetryPolicy::default(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:5000".into()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    1000
}

// ============================================================================
// Storage
// ============================================================================

/// Key-value backend for conversation logs and API keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// SQLite database file
    #[default]
    Sqlite,
    /// Process memory only; nothing survives the session
    Memory,
}

/// Persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Database path (for `SQLite`); `~` is expanded
    #[serde(default)]
    pub path: Option<String>,
}

impl StorageConfig {
    /// Resolve the database path, defaulting to `~/.tutor/tutor.db`.
    pub fn resolved_path(&self) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(shellexpand::tilde(path).into_owned()),
            None => config_dir().join("tutor.db"),
        }
    }
}

// ============================================================================
// History / images / observability
// ============================================================================

/// Conversation history settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Maximum turns kept per subject (two turns per exchange)
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Suffix appended to user turns that carried an image
    #[serde(default = "default_image_marker")]
    pub image_marker: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            image_marker: default_image_marker(),
        }
    }
}

fn default_max_turns() -> usize {
    40
}

fn default_image_marker() -> String {
    " [with image]".into()
}

/// Image attachment limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_max_image_bytes")]
    pub max_bytes: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_image_bytes(),
        }
    }
}

fn default_max_image_bytes() -> u64 {
    5 * 1024 * 1024
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use test_case::test_case;

    #[test]
    fn defaults_match_client_contract() {
        let config = TutorConfig::default();
        assert_eq!(config.backend.max_attempts, 3);
        assert_eq!(config.backend.attempt_timeout(), Duration::from_secs(30));
        assert_eq!(config.backend.base_delay(), Duration::from_secs(1));
        assert_eq!(config.backend.retry_policy, RetryPolicy::TransientOnly);
        assert_eq!(config.history.max_turns, 40);
        assert_eq!(config.history.image_marker, " [with image]");
        assert_eq!(config.image.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"backend": {"base_url": "http://tutor.local", "retry_policy": "all_failures"},
                "observability": {"format": "json"}}"#,
        )
        .unwrap();

        let config = TutorConfig::load_from(&path).unwrap();
        assert_eq!(config.backend.base_url, "http://tutor.local");
        assert_eq!(config.backend.retry_policy, RetryPolicy::AllFailures);
        assert_eq!(config.backend.max_attempts, 3);
        assert_eq!(config.observability.log_format, "json");
        assert_eq!(config.observability.log_level, "info");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let err = TutorConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config"));
    }

    #[test]
    fn env_overrides_apply_and_skip_garbage() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("TUTOR_BASE_URL", "http://10.0.0.2:8000"),
            ("TUTOR_MAX_ATTEMPTS", "5"),
            ("TUTOR_TIMEOUT_SECS", "soon"),
            ("TUTOR_RETRY_POLICY", "all"),
            ("TUTOR_STORAGE_PATH", "/tmp/tutor.db"),
        ]);
        let mut config = TutorConfig::default();
        config.apply_overrides_from(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.backend.base_url, "http://10.0.0.2:8000");
        assert_eq!(config.backend.max_attempts, 5);
        assert_eq!(config.backend.timeout_secs, 30);
        assert_eq!(config.backend.retry_policy, RetryPolicy::AllFailures);
        assert_eq!(config.storage.resolved_path(), PathBuf::from("/tmp/tutor.db"));
    }

    #[test_case(RetryPolicy::TransientOnly, 500, true ; "server error is transient")]
    #[test_case(RetryPolicy::TransientOnly, 503, true ; "unavailable is transient")]
    #[test_case(RetryPolicy::TransientOnly, 429, true ; "rate limit is transient")]
    #[test_case(RetryPolicy::TransientOnly, 408, true ; "request timeout is transient")]
    #[test_case(RetryPolicy::TransientOnly, 400, false ; "bad request is final")]
    #[test_case(RetryPolicy::TransientOnly, 404, false ; "not found is final")]
    #[test_case(RetryPolicy::AllFailures, 400, true ; "all failures retries client errors")]
    fn retry_policy_classifies_status(policy: RetryPolicy, status: u16, expected: bool) {
        assert_eq!(policy.retries_status(status), expected);
    }

    #[test]
    fn retry_policy_parses_aliases() {
        assert_eq!(
            "transient-only".parse::<RetryPolicy>().unwrap(),
            RetryPolicy::TransientOnly
        );
        assert_eq!(
            "ALL_FAILURES".parse::<RetryPolicy>().unwrap(),
            RetryPolicy::AllFailures
        );
        assert!("sometimes".parse::<RetryPolicy>().is_err());
    }
}
