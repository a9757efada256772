//! # Connectivity Monitor
//!
//! Answers one question: is the remote database reachable right now?
//! Each probe opens nothing new - it runs `SELECT 1` over the remote pool,
//! times it, and records the outcome both in memory and (best-effort) in
//! the local `connectivity_log` table.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::RemoteEndpoint;
use crate::error::{SyncError, SyncResult};

/// Opens a pool against the remote database copy.
///
/// The file must already exist with its schema provisioned - the
/// replicator never creates the remote.
pub async fn connect_remote(endpoint: &RemoteEndpoint) -> SyncResult<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(&endpoint.path)
        .create_if_missing(false)
        .busy_timeout(endpoint.command_timeout());

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .acquire_timeout(endpoint.connect_timeout())
        .connect_with(options)
        .await
        .map_err(|e| SyncError::ConnectionFailed {
            side: "remote",
            message: e.to_string(),
        })?;

    Ok(pool)
}

// =============================================================================
// Status
// =============================================================================

/// Snapshot of the last connectivity probe.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityStatus {
    pub is_online: bool,
    pub last_check: Option<DateTime<Utc>>,
    pub response_time: Option<Duration>,
    pub last_error: Option<String>,
}

// =============================================================================
// Monitor
// =============================================================================

/// Probes the remote and keeps the latest status.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    remote: SqlitePool,
    /// Local pool for the best-effort connectivity_log rows.
    local: SqlitePool,
    status: Arc<RwLock<ConnectivityStatus>>,
}

impl ConnectivityMonitor {
    pub fn new(remote: SqlitePool, local: SqlitePool) -> Self {
        ConnectivityMonitor {
            remote,
            local,
            status: Arc::new(RwLock::new(ConnectivityStatus::default())),
        }
    }

    /// Returns the latest status snapshot.
    pub async fn status(&self) -> ConnectivityStatus {
        self.status.read().await.clone()
    }

    /// Probes the remote with `SELECT 1`, updating the status and writing
    /// a connectivity_log row. Returns whether the remote is reachable.
    pub async fn check(&self) -> bool {
        let started = Instant::now();
        let now = Utc::now();

        let result = sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&self.remote)
            .await;

        let (is_online, response_time, error) = match result {
            Ok(_) => {
                let elapsed = started.elapsed();
                debug!(elapsed_ms = elapsed.as_millis() as u64, "Remote reachable");
                (true, Some(elapsed), None)
            }
            Err(e) => {
                debug!(error = %e, "Remote unreachable");
                (false, None, Some(e.to_string()))
            }
        };

        {
            let mut status = self.status.write().await;
            status.is_online = is_online;
            status.last_check = Some(now);
            status.response_time = response_time;
            status.last_error = error.clone();
        }

        self.log_probe(is_online, response_time, error.as_deref())
            .await;

        is_online
    }

    /// Best-effort probe log into the local database.
    async fn log_probe(
        &self,
        is_online: bool,
        response_time: Option<Duration>,
        error_message: Option<&str>,
    ) {
        let result = sqlx::query(
            "INSERT INTO connectivity_log (is_online, response_time_ms, error_message, checked_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(is_online)
        .bind(response_time.map(|d| d.as_millis() as i64))
        .bind(error_message)
        .bind(Utc::now())
        .execute(&self.local)
        .await;

        if let Err(e) = result {
            warn!(?e, "Failed to write connectivity log");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quadtech_db::{Database, DbConfig};

    #[tokio::test]
    async fn test_check_reachable_remote() {
        let local = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Database::new(DbConfig::in_memory()).await.unwrap();

        let monitor = ConnectivityMonitor::new(remote.pool().clone(), local.pool().clone());
        assert!(monitor.check().await);

        let status = monitor.status().await;
        assert!(status.is_online);
        assert!(status.last_check.is_some());
        assert!(status.response_time.is_some());
        assert!(status.last_error.is_none());

        // The probe left a log row locally
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM connectivity_log")
            .fetch_one(local.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_check_unreachable_remote() {
        let local = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Database::new(DbConfig::in_memory()).await.unwrap();

        // Closing the remote pool makes every probe fail
        remote.close().await;

        let monitor = ConnectivityMonitor::new(remote.pool().clone(), local.pool().clone());
        assert!(!monitor.check().await);

        let status = monitor.status().await;
        assert!(!status.is_online);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_connect_remote_missing_file() {
        let endpoint = RemoteEndpoint {
            path: "/nonexistent/dir/remote.db".into(),
            connect_timeout_secs: 1,
            command_timeout_secs: 1,
        };
        let result = connect_remote(&endpoint).await;
        assert!(matches!(
            result,
            Err(SyncError::ConnectionFailed { side: "remote", .. })
        ));
    }
}
