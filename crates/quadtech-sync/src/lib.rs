//! # quadtech-sync: Replication Engine for QuadTech
//!
//! Best-effort, table-by-table replication of the local database to a
//! remote copy, plus the background agent that decides when to run it.
//!
//! ## What this is (and isn't)
//!
//! The replicator is a linear copy loop: for every table in a fixed,
//! foreign-key-ordered list it upserts each local row into the remote by
//! primary key. Failures are retried a bounded number of times with
//! exponential backoff and otherwise logged and skipped. There is no
//! conflict resolution - the local copy wins by overwriting the remote
//! row - and no ordering guarantee beyond the table list itself.
//!
//! ## Modules
//!
//! - [`config`] - TOML configuration with env overrides
//! - [`connectivity`] - remote reachability probe and status
//! - [`replicator`] - the table-by-table copy loop
//! - [`agent`] - background auto-sync loop over the sync queue
//! - [`error`] - error types with retryability classification

pub mod agent;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod replicator;

pub use agent::{AutoSyncAgent, AutoSyncHandle, AgentStatus};
pub use config::{RemoteEndpoint, ScheduleConfig, SyncConfig};
pub use connectivity::{connect_remote, ConnectivityMonitor, ConnectivityStatus};
pub use error::{SyncError, SyncResult};
pub use replicator::{Replicator, SyncReport, TableOutcome, TableStatus, REPLICATED_TABLES};
