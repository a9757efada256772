//! # Sync Tool
//!
//! One-shot replication of the local database to the remote copy.
//!
//! ## Usage
//! ```bash
//! # With a config file
//! cargo run -p quadtech-sync --bin synctool -- --config ./sync.toml
//!
//! # With explicit paths
//! cargo run -p quadtech-sync --bin synctool -- \
//!     --local ./quadtech.db --remote /mnt/cloud/quadtech-remote.db
//! ```
//!
//! Exits non-zero when any table fails to copy.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use quadtech_db::{Database, DbConfig};
use quadtech_sync::{connect_remote, Replicator, SyncConfig};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("synctool: {message}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "Syncing {} -> {}",
        config.local.path.display(),
        config.remote.path.display()
    );

    let local = match Database::new(DbConfig::new(&config.local.path)).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("synctool: cannot open local database: {e}");
            return ExitCode::FAILURE;
        }
    };

    let remote = match connect_remote(&config.remote).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("synctool: cannot reach remote database: {e}");
            return ExitCode::FAILURE;
        }
    };

    let replicator = Replicator::new(local.pool().clone(), remote, config.schedule.clone());
    let report = match replicator.sync_all().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("synctool: sync failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    for line in report.summary_lines() {
        println!("  {line}");
    }
    println!(
        "Done: {} inserted, {} updated across {} tables ({} ms)",
        report.total_inserted(),
        report.total_updated(),
        report.tables.len(),
        (report.finished_at - report.started_at).num_milliseconds()
    );

    local.close().await;

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        eprintln!("synctool: some tables failed to copy");
        ExitCode::FAILURE
    }
}

/// Resolves configuration from `--config`, explicit `--local`/`--remote`
/// paths, the default config location, or environment variables.
fn load_config() -> Result<SyncConfig, String> {
    let args: Vec<String> = env::args().collect();

    if let Some(path) = flag_value(&args, "--config") {
        return SyncConfig::load(&PathBuf::from(path)).map_err(|e| e.to_string());
    }

    if let (Some(local), Some(remote)) =
        (flag_value(&args, "--local"), flag_value(&args, "--remote"))
    {
        let mut config = SyncConfig::with_paths(local, remote);
        config.apply_env_overrides();
        config.validate().map_err(|e| e.to_string())?;
        return Ok(config);
    }

    if let Some(default) = SyncConfig::default_path() {
        if default.exists() {
            return SyncConfig::load(&default).map_err(|e| e.to_string());
        }
    }

    Err("no configuration: pass --config <file> or --local <db> --remote <db>".to_string())
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
