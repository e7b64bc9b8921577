//! Queue configuration, loaded from TOML.
//!
//! ```toml
//! start_paused = false
//! retry_dispatch = "immediate"   # or "requeue"
//! event_capacity = 256
//!
//! [auto_retry]
//! max_retries = 3
//! base_delay_ms = 2000
//! multiplier = 2.0
//!
//! [default_destination]
//! folder = "uploads"
//!
//! [http]
//! endpoint = "https://cms.example.com/api/media"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::Destination;
use crate::queue::{AutoRetryPolicy, RetryDispatch};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Build the queue paused (nothing is sent until `resume`).
    pub start_paused: bool,
    pub retry_dispatch: RetryDispatch,
    /// Buffer of the event broadcast channel.
    pub event_capacity: usize,
    pub auto_retry: AutoRetryConfig,
    pub default_destination: Destination,
    pub http: Option<HttpConfig>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            start_paused: false,
            retry_dispatch: RetryDispatch::default(),
            event_capacity: 256,
            auto_retry: AutoRetryConfig::default(),
            default_destination: Destination::default(),
            http: None,
        }
    }
}

impl QueueConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}

/// Automatic retry of transport failures. `max_retries = 0` turns it off.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AutoRetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
}

impl Default for AutoRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay_ms: 2_000,
            multiplier: 2.0,
        }
    }
}

impl AutoRetryConfig {
    pub fn policy(&self) -> AutoRetryPolicy {
        AutoRetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.base_delay_ms),
            self.multiplier,
        )
    }
}

/// Settings for `HttpTransport`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HttpConfig {
    pub endpoint: String,
    #[serde(default = "default_file_field")]
    pub file_field: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extra request headers (e.g. an API token issued elsewhere).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_file_field() -> String {
    "file".to_string()
}

fn default_chunk_size() -> usize {
    64 * 1024
}

fn default_timeout_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = QueueConfig::from_toml_str("").unwrap();
        assert_eq!(config, QueueConfig::default());
        assert_eq!(config.retry_dispatch, RetryDispatch::Immediate);
        assert_eq!(config.auto_retry.policy(), AutoRetryPolicy::new(0, Duration::from_secs(2), 2.0));
    }

    #[test]
    fn full_config_parses() {
        let config = QueueConfig::from_toml_str(
            r#"
            start_paused = true
            retry_dispatch = "requeue"

            [auto_retry]
            max_retries = 3
            base_delay_ms = 500

            [default_destination]
            folder = "banners"
            metadata = { alt = "hero image" }

            [http]
            endpoint = "https://cms.example.com/api/media"
            headers = { "x-api-key" = "secret" }
            "#,
        )
        .unwrap();

        assert!(config.start_paused);
        assert_eq!(config.retry_dispatch, RetryDispatch::Requeue);
        assert_eq!(config.auto_retry.max_retries, 3);
        assert_eq!(config.auto_retry.multiplier, 2.0);
        assert_eq!(config.default_destination.folder.as_deref(), Some("banners"));
        assert_eq!(
            config.default_destination.metadata.get("alt").map(String::as_str),
            Some("hero image")
        );

        let http = config.http.unwrap();
        assert_eq!(http.file_field, "file");
        assert_eq!(http.chunk_size, 64 * 1024);
        assert_eq!(http.timeout_secs, 300);
        assert_eq!(http.headers.len(), 1);
    }

    #[test]
    fn unknown_dispatch_mode_is_an_error() {
        let err = QueueConfig::from_toml_str(r#"retry_dispatch = "parallel""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = QueueConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferry.toml");
        std::fs::write(&path, "event_capacity = 8\n").unwrap();

        let config = QueueConfig::load(&path).unwrap();
        assert_eq!(config.event_capacity, 8);
    }
}
