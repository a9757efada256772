//! # Sync Configuration
//!
//! Configuration for the replication engine, loaded from a TOML file with
//! environment-variable overrides and serde defaults.
//!
//! ## Configuration File Format
//! ```toml
//! # sync.toml
//! enabled = true
//!
//! [local]
//! path = "./quadtech.db"
//!
//! [remote]
//! path = "/mnt/cloud/quadtech-remote.db"
//! connect_timeout_secs = 60
//! command_timeout_secs = 300
//!
//! [schedule]
//! poll_interval_secs = 30    # connectivity check cadence
//! stale_after_secs = 300     # force a sync when the last one is older
//! max_retries = 3            # per-table copy attempts
//! initial_backoff_ms = 2000  # first retry delay, doubles per attempt
//! ```
//!
//! ## Environment Overrides
//! `QUADTECH_LOCAL_DB` and `QUADTECH_REMOTE_DB` override the two paths,
//! which is how the synctool binary is usually pointed at databases.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Endpoints
// =============================================================================

/// The local database file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalEndpoint {
    #[serde(default = "default_local_path")]
    pub path: PathBuf,
}

fn default_local_path() -> PathBuf {
    PathBuf::from("./quadtech.db")
}

impl Default for LocalEndpoint {
    fn default() -> Self {
        LocalEndpoint {
            path: default_local_path(),
        }
    }
}

/// The remote database copy. Timeouts are generous: the remote is
/// expected to sit on slow storage or a network mount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    pub path: PathBuf,

    /// Connection acquire timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Busy-wait limit per statement, in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    60
}

fn default_command_timeout() -> u64 {
    300
}

impl RemoteEndpoint {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

// =============================================================================
// Schedule
// =============================================================================

/// When the auto-sync agent checks and triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Connectivity check cadence.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// A sync is forced when the last one is older than this, even with
    /// an empty queue.
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: u64,

    /// Per-table copy attempts before the table is skipped.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First retry delay; doubles each attempt.
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_stale_after() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    2_000
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            poll_interval_secs: default_poll_interval(),
            stale_after_secs: default_stale_after(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
        }
    }
}

impl ScheduleConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

// =============================================================================
// Sync Config
// =============================================================================

/// Top-level sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Master switch for the auto-sync agent.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub local: LocalEndpoint,

    pub remote: RemoteEndpoint,

    #[serde(default)]
    pub schedule: ScheduleConfig,
}

fn default_enabled() -> bool {
    true
}

impl SyncConfig {
    /// Builds a config pointing at explicit paths, with default schedule.
    pub fn with_paths(local: impl Into<PathBuf>, remote: impl Into<PathBuf>) -> Self {
        SyncConfig {
            enabled: true,
            local: LocalEndpoint { path: local.into() },
            remote: RemoteEndpoint {
                path: remote.into(),
                connect_timeout_secs: default_connect_timeout(),
                command_timeout_secs: default_command_timeout(),
            },
            schedule: ScheduleConfig::default(),
        }
    }

    /// Loads configuration from a TOML file and applies environment
    /// overrides.
    pub fn load(path: &Path) -> SyncResult<Self> {
        debug!(path = %path.display(), "Loading sync config");

        let text = std::fs::read_to_string(path)?;
        let mut config: SyncConfig = toml::from_str(&text)?;
        config.apply_env_overrides();
        config.validate()?;

        info!(
            local = %config.local.path.display(),
            remote = %config.remote.path.display(),
            "Sync config loaded"
        );
        Ok(config)
    }

    /// The default config file location
    /// (`<config dir>/quadtech/sync.toml`), if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "quadtech", "quadtech")
            .map(|dirs| dirs.config_dir().join("sync.toml"))
    }

    /// Saves the configuration as TOML.
    pub fn save(&self, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Applies `QUADTECH_LOCAL_DB` / `QUADTECH_REMOTE_DB` overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("QUADTECH_LOCAL_DB") {
            self.local.path = PathBuf::from(path);
        }
        if let Ok(path) = std::env::var("QUADTECH_REMOTE_DB") {
            self.remote.path = PathBuf::from(path);
        }
    }

    /// Sanity-checks the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        if self.local.path.as_os_str().is_empty() {
            return Err(SyncError::InvalidConfig("local path is empty".into()));
        }
        if self.remote.path.as_os_str().is_empty() {
            return Err(SyncError::InvalidConfig("remote path is empty".into()));
        }
        if self.local.path == self.remote.path {
            return Err(SyncError::InvalidConfig(
                "local and remote paths are the same database".into(),
            ));
        }
        if self.schedule.poll_interval_secs == 0 {
            return Err(SyncError::InvalidConfig("poll interval must be > 0".into()));
        }
        if self.schedule.max_retries == 0 {
            return Err(SyncError::InvalidConfig("max retries must be > 0".into()));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config: SyncConfig = toml::from_str(
            r#"
            [remote]
            path = "/mnt/cloud/quadtech-remote.db"
            "#,
        )
        .unwrap();

        assert!(config.enabled);
        assert_eq!(config.local.path, PathBuf::from("./quadtech.db"));
        assert_eq!(config.remote.connect_timeout_secs, 60);
        assert_eq!(config.remote.command_timeout_secs, 300);
        assert_eq!(config.schedule.poll_interval_secs, 30);
        assert_eq!(config.schedule.stale_after_secs, 300);
        assert_eq!(config.schedule.max_retries, 3);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let config: SyncConfig = toml::from_str(
            r#"
            enabled = false

            [local]
            path = "/data/shop.db"

            [remote]
            path = "/mnt/cloud/shop.db"
            connect_timeout_secs = 10
            command_timeout_secs = 30

            [schedule]
            poll_interval_secs = 5
            stale_after_secs = 60
            max_retries = 5
            initial_backoff_ms = 500
            "#,
        )
        .unwrap();

        assert!(!config.enabled);
        assert_eq!(config.schedule.initial_backoff(), Duration::from_millis(500));
        assert_eq!(config.remote.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_validate_rejects_same_paths() {
        let config = SyncConfig::with_paths("/data/shop.db", "/data/shop.db");
        assert!(matches!(
            config.validate(),
            Err(SyncError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = SyncConfig::with_paths("./a.db", "./b.db");
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: SyncConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.local.path, config.local.path);
        assert_eq!(parsed.remote.path, config.remote.path);
    }
}
