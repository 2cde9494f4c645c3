//! Configuration loading for rentx.
//!
//! Configuration is loaded from a TOML file (default: `rentx.toml`).
//! Every section and field is optional.

use rentx_core::RetryPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Remote gateway configuration.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Local store configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Synchronizer configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote gateway configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the RentX API (default: http://localhost:3333).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds (default: 10).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Local store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file, relative paths resolve against the data directory
    /// (default: rentx.db).
    #[serde(default = "default_database_path")]
    pub database: PathBuf,
}

/// Synchronizer configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Delay before the first retry after a failed cycle (default: 2).
    #[serde(default = "default_retry_base_secs")]
    pub retry_base_secs: u64,
    /// Cap on the exponential retry delay (default: 30).
    #[serde(default = "default_retry_max_secs")]
    pub retry_max_secs: u64,
    /// Upper bound on random jitter added to retries (default: 1000).
    #[serde(default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,
    /// Run a cycle whenever connectivity becomes `connected` (default: true).
    #[serde(default = "default_sync_on_connect")]
    pub sync_on_connect: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `RUST_LOG` (default: info).
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:3333".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_database_path() -> PathBuf {
    PathBuf::from("rentx.db")
}

fn default_retry_base_secs() -> u64 {
    2
}

fn default_retry_max_secs() -> u64 {
    30
}

fn default_retry_jitter_ms() -> u64 {
    1000
}

fn default_sync_on_connect() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: default_database_path(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            retry_base_secs: default_retry_base_secs(),
            retry_max_secs: default_retry_max_secs(),
            retry_jitter_ms: default_retry_jitter_ms(),
            sync_on_connect: default_sync_on_connect(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl RemoteConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl StorageConfig {
    /// Database path resolved against `data_dir`.
    pub fn database_path(&self, data_dir: &Path) -> PathBuf {
        if self.database.is_absolute() {
            self.database.clone()
        } else {
            data_dir.join(&self.database)
        }
    }
}

impl SyncConfig {
    /// Retry policy for failed cycles.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base: Duration::from_secs(self.retry_base_secs),
            max: Duration::from_secs(self.retry_max_secs),
            jitter: Duration::from_millis(self.retry_jitter_ms),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load configuration from `path`, or defaults if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.remote.base_url, "http://localhost:3333");
        assert_eq!(config.remote.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.storage.database, PathBuf::from("rentx.db"));
        assert!(config.sync.sync_on_connect);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[remote]
base_url = "https://api.rentx.app"
request_timeout_secs = 3

[storage]
database = "/data/rentx.db"

[sync]
retry_base_secs = 1
retry_max_secs = 60
sync_on_connect = false

[logging]
filter = "rentx_client=debug"
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.remote.base_url, "https://api.rentx.app");
        assert_eq!(config.remote.request_timeout_secs, 3);
        assert_eq!(config.storage.database, PathBuf::from("/data/rentx.db"));
        assert_eq!(config.sync.retry_base_secs, 1);
        assert!(!config.sync.sync_on_connect);
        assert_eq!(config.logging.filter, "rentx_client=debug");
    }

    #[test]
    fn config_missing_sections_use_defaults() {
        let config: Config = toml::from_str("[remote]\n").unwrap();
        assert_eq!(config.remote.base_url, "http://localhost:3333");
        assert_eq!(config.sync.retry_max_secs, 30);
        assert_eq!(config.sync.retry_jitter_ms, 1000);
    }

    #[test]
    fn relative_database_resolves_against_data_dir() {
        let storage = StorageConfig::default();
        assert_eq!(
            storage.database_path(Path::new("/var/lib/rentx")),
            PathBuf::from("/var/lib/rentx/rentx.db")
        );

        let absolute = StorageConfig {
            database: PathBuf::from("/tmp/other.db"),
        };
        assert_eq!(
            absolute.database_path(Path::new("/var/lib/rentx")),
            PathBuf::from("/tmp/other.db")
        );
    }

    #[test]
    fn retry_policy_from_config() {
        let policy = SyncConfig::default().retry_policy();
        assert_eq!(policy.base, Duration::from_secs(2));
        assert_eq!(policy.max, Duration::from_secs(30));
        assert_eq!(policy.jitter, Duration::from_millis(1000));
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.remote.request_timeout_secs, 10);
    }

    #[test]
    fn unparsable_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rentx.toml");
        std::fs::write(&path, "[remote\nbase_url = 1").unwrap();
        assert!(matches!(
            Config::load_or_default(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
