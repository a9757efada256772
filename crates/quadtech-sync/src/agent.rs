//! # Auto-Sync Agent
//!
//! Background loop that decides when to replicate.
//!
//! ## Trigger Rule
//! ```text
//! every poll_interval (default 30 s):
//!     remote reachable?
//!       no  → wait for the next tick
//!       yes → sync when pending queue work exists
//!             OR the last sync is older than stale_after (default 5 min)
//!             OR no sync has run yet
//! ```
//!
//! One sync at a time: a re-entrancy guard refuses overlapping runs.
//! After a successful run the pending queue entries are marked synced -
//! the full-database copy has already carried their records across.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use quadtech_core::SyncQueueItem;
use quadtech_db::Database;

use crate::config::ScheduleConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::{SyncError, SyncResult};
use crate::replicator::{Replicator, SyncReport};

/// How many queue entries are settled after each run.
const QUEUE_BATCH_SIZE: u32 = 100;

// =============================================================================
// Status
// =============================================================================

/// Snapshot of the agent's state for status displays.
#[derive(Debug, Clone, Default)]
pub struct AgentStatus {
    pub enabled: bool,
    pub is_syncing: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_run_successful: Option<bool>,
    pub last_error: Option<String>,
    pub pending_count: i64,
}

// =============================================================================
// Agent
// =============================================================================

enum Command {
    SyncNow,
    SetEnabled(bool),
}

/// Background agent that watches connectivity and the sync queue.
pub struct AutoSyncAgent {
    db: Database,
    replicator: Replicator,
    monitor: ConnectivityMonitor,
    schedule: ScheduleConfig,
    status: Arc<RwLock<AgentStatus>>,
    command_rx: mpsc::Receiver<Command>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling a running agent.
#[derive(Clone)]
pub struct AutoSyncHandle {
    status: Arc<RwLock<AgentStatus>>,
    command_tx: mpsc::Sender<Command>,
    shutdown_tx: mpsc::Sender<()>,
}

impl AutoSyncHandle {
    /// Current agent status.
    pub async fn status(&self) -> AgentStatus {
        self.status.read().await.clone()
    }

    /// Requests an immediate sync, regardless of staleness.
    pub async fn sync_now(&self) -> SyncResult<()> {
        self.command_tx
            .send(Command::SyncNow)
            .await
            .map_err(|_| SyncError::ShuttingDown)
    }

    /// Enables or disables automatic syncing. A disabled agent keeps
    /// polling but never triggers.
    pub async fn set_enabled(&self, enabled: bool) -> SyncResult<()> {
        self.command_tx
            .send(Command::SetEnabled(enabled))
            .await
            .map_err(|_| SyncError::ShuttingDown)
    }

    /// Signals the agent to shut down.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl AutoSyncAgent {
    /// Creates the agent and spawns its loop, returning the handle.
    ///
    /// The caller supplies both pools: the local application database and
    /// an open pool on the remote copy.
    pub fn spawn(
        db: Database,
        remote: sqlx::SqlitePool,
        schedule: ScheduleConfig,
        enabled: bool,
    ) -> AutoSyncHandle {
        let (command_tx, command_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let status = Arc::new(RwLock::new(AgentStatus {
            enabled,
            ..Default::default()
        }));

        let agent = AutoSyncAgent {
            replicator: Replicator::new(db.pool().clone(), remote.clone(), schedule.clone()),
            monitor: ConnectivityMonitor::new(remote, db.pool().clone()),
            db,
            schedule,
            status: status.clone(),
            command_rx,
            shutdown_rx,
        };

        tokio::spawn(agent.run());

        AutoSyncHandle {
            status,
            command_tx,
            shutdown_tx,
        }
    }

    /// Main loop: poll tick, explicit commands, shutdown.
    async fn run(mut self) {
        info!(
            poll_secs = self.schedule.poll_interval_secs,
            stale_secs = self.schedule.stale_after_secs,
            "Auto-sync agent started"
        );

        let mut interval = tokio::time::interval(self.schedule.poll_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; consume it
        // so the agent doesn't sync at startup before the app settles.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.poll_once().await {
                        error!(?e, "Auto-sync poll failed");
                    }
                }

                Some(command) = self.command_rx.recv() => {
                    match command {
                        Command::SyncNow => {
                            if let Err(e) = self.sync_once().await {
                                warn!(?e, "Requested sync failed");
                            }
                        }
                        Command::SetEnabled(enabled) => {
                            info!(enabled = enabled, "Auto-sync toggled");
                            self.status.write().await.enabled = enabled;
                        }
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Auto-sync agent shutting down");
                    break;
                }
            }
        }

        info!("Auto-sync agent stopped");
    }

    /// One scheduled poll: connectivity first, then the trigger rule.
    async fn poll_once(&self) -> SyncResult<()> {
        if !self.status.read().await.enabled {
            return Ok(());
        }

        if !self.monitor.check().await {
            debug!("Remote offline, skipping poll");
            return Ok(());
        }

        let pending = self.db.sync_queue().pending_count().await?;
        {
            let mut status = self.status.write().await;
            status.pending_count = pending;
        }

        let last_sync = self.status.read().await.last_sync;
        let stale = match last_sync {
            None => true,
            Some(at) => {
                let age = Utc::now() - at;
                age.to_std().unwrap_or_default() > self.schedule.stale_after()
            }
        };

        if pending > 0 || stale {
            debug!(pending = pending, stale = stale, "Triggering sync");
            self.sync_once().await?;
        }

        Ok(())
    }

    /// Runs one replication pass and settles the queue.
    async fn sync_once(&self) -> SyncResult<()> {
        // Re-entrancy guard.
        {
            let mut status = self.status.write().await;
            if status.is_syncing {
                return Err(SyncError::AlreadySyncing);
            }
            status.is_syncing = true;
        }

        let result = self.replicator.sync_all().await;

        let mut status = self.status.write().await;
        status.is_syncing = false;

        match result {
            Ok(report) => {
                status.last_sync = Some(report.finished_at);
                status.last_run_successful = Some(report.is_success());
                status.last_error = None;
                drop(status);

                self.settle_queue(&report).await;
                Ok(())
            }
            Err(e) => {
                status.last_run_successful = Some(false);
                status.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Marks pending queue entries according to the run outcome. The
    /// full-database copy already carried their records; the queue only
    /// tracks that a sync has covered them.
    async fn settle_queue(&self, report: &SyncReport) {
        let queue = self.db.sync_queue();

        let pending: Vec<SyncQueueItem> = match queue.pending(QUEUE_BATCH_SIZE).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!(?e, "Failed to read pending queue entries");
                return;
            }
        };

        for item in pending {
            if let Err(e) = queue.mark_syncing(item.id).await {
                warn!(?e, id = item.id, "Failed to mark queue entry syncing");
                continue;
            }

            let result = if report.is_success() {
                queue.mark_synced(item.id).await
            } else {
                queue.mark_failed(item.id, "replication reported failures").await
            };

            if let Err(e) = result {
                warn!(?e, id = item.id, "Failed to settle queue entry");
            }
        }

        if let Ok(count) = queue.pending_count().await {
            self.status.write().await.pending_count = count;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use quadtech_core::SyncOperation;
    use quadtech_db::DbConfig;
    use std::time::Duration;

    async fn wait_for<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..100 {
            if condition().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not met within timeout");
    }

    #[tokio::test]
    async fn test_sync_now_settles_queue() {
        let local = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Database::new(DbConfig::in_memory()).await.unwrap();

        local
            .sync_queue()
            .enqueue("products", SyncOperation::Insert, 1, None)
            .await
            .unwrap();

        let schedule = ScheduleConfig {
            poll_interval_secs: 3600, // ticks never fire during the test
            initial_backoff_ms: 1,
            ..Default::default()
        };
        let handle = AutoSyncAgent::spawn(local.clone(), remote.pool().clone(), schedule, true);

        handle.sync_now().await.unwrap();

        let queue = local.sync_queue();
        wait_for(|| {
            let queue = queue.clone();
            async move { queue.pending_count().await.unwrap() == 0 }
        })
        .await;

        let status = handle.status().await;
        assert!(status.last_sync.is_some());
        assert_eq!(status.last_run_successful, Some(true));
        assert!(!status.is_syncing);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_disabled_agent_skips_polls() {
        let local = Database::new(DbConfig::in_memory()).await.unwrap();
        let remote = Database::new(DbConfig::in_memory()).await.unwrap();

        let schedule = ScheduleConfig {
            poll_interval_secs: 3600,
            ..Default::default()
        };
        let handle = AutoSyncAgent::spawn(local.clone(), remote.pool().clone(), schedule, false);

        let status = handle.status().await;
        assert!(!status.enabled);
        assert!(status.last_sync.is_none());

        handle.set_enabled(true).await.unwrap();
        wait_for(|| {
            let handle = handle.clone();
            async move { handle.status().await.enabled }
        })
        .await;

        handle.shutdown().await;
    }
}
