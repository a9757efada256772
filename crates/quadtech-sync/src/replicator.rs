//! # Database Replicator
//!
//! Table-by-table copy of the local database into the remote copy.
//!
//! ## Copy Loop
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  for table in REPLICATED_TABLES (foreign-key order):                │
//! │                                                                     │
//! │    retry up to max_retries with exponential backoff:                │
//! │      1. table exists on both sides? (skip with warning if not)      │
//! │      2. intersect local/remote column sets (case-insensitive)       │
//! │      3. discover the integer primary key (PRAGMA table_info)        │
//! │      4. for each local row:                                         │
//! │           exists-by-PK on remote?                                   │
//! │             yes → UPDATE the shared non-PK columns                  │
//! │             no  → INSERT the shared columns (explicit PK)           │
//! │                                                                     │
//! │  post-pass: reseed remote sqlite_sequence to MAX(pk) per table      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This is deliberately a linear, best-effort loop: the local copy wins
//! by overwriting the remote row, rows are transported dynamically
//! (NULL/INTEGER/REAL/TEXT/BLOB) so schema drift in either direction
//! degrades to a column-intersection warning instead of a failure, and a
//! table that keeps failing is reported and skipped, never fatal.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, TypeInfo, ValueRef};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ScheduleConfig;
use crate::error::{SyncError, SyncResult};

/// Tables to replicate, in foreign-key dependency order: parents before
/// children so remote foreign keys hold during the copy.
pub const REPLICATED_TABLES: &[&str] = &[
    "roles",
    "users",
    "brands",
    "categories",
    "taxes",
    "products",
    "suppliers",
    "customers",
    "purchase_orders",
    "purchase_order_items",
    "stock_in",
    "stock_in_items",
    "sales_orders",
    "sales_order_items",
    "stock_out",
    "stock_out_items",
];

// =============================================================================
// Report Types
// =============================================================================

/// Per-table result of a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    /// Copied cleanly.
    Synced,
    /// Not copied; schema mismatch or missing table.
    Skipped(String),
    /// Gave up after retries.
    Failed(String),
}

/// Outcome of one table's copy.
#[derive(Debug, Clone)]
pub struct TableOutcome {
    pub table: String,
    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub status: TableStatus,
}

/// Result of a full sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tables: Vec<TableOutcome>,
}

impl SyncReport {
    /// Rows newly inserted on the remote.
    pub fn total_inserted(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_inserted).sum()
    }

    /// Existing remote rows overwritten from the local copy.
    pub fn total_updated(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_updated).sum()
    }

    /// True when no table gave up.
    pub fn is_success(&self) -> bool {
        !self
            .tables
            .iter()
            .any(|t| matches!(t.status, TableStatus::Failed(_)))
    }

    /// True when any table was skipped or failed.
    pub fn has_warnings(&self) -> bool {
        self.tables
            .iter()
            .any(|t| !matches!(t.status, TableStatus::Synced))
    }

    /// Human-readable per-table lines for CLI output.
    pub fn summary_lines(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| match &t.status {
                TableStatus::Synced => format!(
                    "ok   {}: {} inserted, {} updated",
                    t.table, t.rows_inserted, t.rows_updated
                ),
                TableStatus::Skipped(reason) => format!("skip {}: {}", t.table, reason),
                TableStatus::Failed(error) => format!("FAIL {}: {}", t.table, error),
            })
            .collect()
    }
}

// =============================================================================
// Dynamic Value Transport
// =============================================================================

/// A value read from one database and bound into the other. SQLite's five
/// storage classes cover every column we replicate.
#[derive(Debug, Clone)]
enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Reads a column value by index, preserving its storage class.
fn read_value(row: &SqliteRow, idx: usize) -> SyncResult<SqlValue> {
    let raw = row.try_get_raw(idx)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }

    let type_name = raw.type_info().name().to_uppercase();
    let value = if type_name.contains("INT") || type_name.contains("BOOL") {
        SqlValue::Integer(row.try_get(idx)?)
    } else if type_name.contains("REAL") || type_name.contains("FLOA") || type_name.contains("DOUB")
    {
        SqlValue::Real(row.try_get(idx)?)
    } else if type_name.contains("BLOB") {
        SqlValue::Blob(row.try_get(idx)?)
    } else {
        SqlValue::Text(row.try_get(idx)?)
    };

    Ok(value)
}

/// Binds a transported value onto a query.
fn bind_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    value: &SqlValue,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<i64>),
        SqlValue::Integer(i) => query.bind(*i),
        SqlValue::Real(f) => query.bind(*f),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Blob(b) => query.bind(b.clone()),
    }
}

// =============================================================================
// Schema Introspection
// =============================================================================

async fn table_exists(pool: &SqlitePool, table: &str) -> SyncResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(table)
            .fetch_one(pool)
            .await?;

    Ok(count > 0)
}

/// Column names in declaration order, plus the single-column integer
/// primary key if the table has one.
async fn table_schema(pool: &SqlitePool, table: &str) -> SyncResult<(Vec<String>, Option<String>)> {
    // PRAGMA cannot take bound parameters; table names come from the
    // fixed REPLICATED_TABLES list.
    let rows = sqlx::query(&format!("PRAGMA table_info(\"{table}\")"))
        .fetch_all(pool)
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    let mut pk_columns = Vec::new();
    for row in &rows {
        let name: String = row.try_get("name")?;
        let pk: i64 = row.try_get("pk")?;
        if pk > 0 {
            pk_columns.push(name.clone());
        }
        columns.push(name);
    }

    // Composite keys fall back to plain inserts, same as no key.
    let pk = if pk_columns.len() == 1 {
        pk_columns.pop()
    } else {
        None
    };

    Ok((columns, pk))
}

fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

// =============================================================================
// Replicator
// =============================================================================

/// Copies the local database into the remote, table by table.
#[derive(Clone)]
pub struct Replicator {
    local: SqlitePool,
    remote: SqlitePool,
    schedule: ScheduleConfig,
}

impl Replicator {
    pub fn new(local: SqlitePool, remote: SqlitePool, schedule: ScheduleConfig) -> Self {
        Replicator {
            local,
            remote,
            schedule,
        }
    }

    /// Runs a full sync: every table in [`REPLICATED_TABLES`], each with
    /// bounded retry, then the sequence reseed post-pass.
    pub async fn sync_all(&self) -> SyncResult<SyncReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting sync run");

        // Both sides must answer before a row moves.
        self.probe(&self.local, "local").await?;
        self.probe(&self.remote, "remote").await?;

        let mut tables = Vec::with_capacity(REPLICATED_TABLES.len());
        for table in REPLICATED_TABLES {
            let outcome = self.sync_table_with_retry(table).await;
            tables.push(outcome);
        }

        self.reseed_sequences().await;

        let report = SyncReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            tables,
        };

        info!(
            run_id = %run_id,
            inserted = report.total_inserted(),
            updated = report.total_updated(),
            warnings = report.has_warnings(),
            "Sync run finished"
        );

        Ok(report)
    }

    async fn probe(&self, pool: &SqlitePool, side: &'static str) -> SyncResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(pool)
            .await
            .map_err(|e| SyncError::ConnectionFailed {
                side,
                message: e.to_string(),
            })?;
        Ok(())
    }

    /// Copies one table, retrying transient failures with exponential
    /// backoff. Schema mismatches skip the table; persistent errors fail
    /// it. Neither aborts the run.
    async fn sync_table_with_retry(&self, table: &str) -> TableOutcome {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.schedule.initial_backoff(),
            max_interval: Duration::from_secs(60),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut attempt = 1;
        loop {
            match self.copy_table(table).await {
                Ok((inserted, updated)) => {
                    debug!(table = table, inserted, updated, "Table synced");
                    return TableOutcome {
                        table: table.to_string(),
                        rows_inserted: inserted,
                        rows_updated: updated,
                        status: TableStatus::Synced,
                    };
                }
                Err(e) if e.is_schema_error() => {
                    warn!(table = table, error = %e, "Skipping table");
                    return TableOutcome {
                        table: table.to_string(),
                        rows_inserted: 0,
                        rows_updated: 0,
                        status: TableStatus::Skipped(e.to_string()),
                    };
                }
                Err(e) if e.is_retryable() && attempt < self.schedule.max_retries => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| self.schedule.initial_backoff());
                    warn!(
                        table = table,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Table copy failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(table = table, error = %e, "Table copy gave up");
                    return TableOutcome {
                        table: table.to_string(),
                        rows_inserted: 0,
                        rows_updated: 0,
                        status: TableStatus::Failed(e.to_string()),
                    };
                }
            }
        }
    }

    /// One pass over one table. Returns (inserted, updated) row counts.
    async fn copy_table(&self, table: &str) -> SyncResult<(u64, u64)> {
        if !table_exists(&self.local, table).await? {
            return Err(SyncError::TableMissing {
                table: table.to_string(),
                side: "local",
            });
        }
        if !table_exists(&self.remote, table).await? {
            return Err(SyncError::TableMissing {
                table: table.to_string(),
                side: "remote",
            });
        }

        let (local_columns, _) = table_schema(&self.local, table).await?;
        let (remote_columns, remote_pk) = table_schema(&self.remote, table).await?;

        // Copy only what both sides understand.
        let columns: Vec<String> = local_columns
            .iter()
            .filter(|c| remote_columns.iter().any(|r| r.eq_ignore_ascii_case(c)))
            .cloned()
            .collect();

        if columns.is_empty() {
            return Err(SyncError::NoMatchingColumns {
                table: table.to_string(),
            });
        }

        let missing: Vec<&String> = local_columns
            .iter()
            .filter(|c| !remote_columns.iter().any(|r| r.eq_ignore_ascii_case(c)))
            .collect();
        if !missing.is_empty() {
            warn!(table = table, ?missing, "Columns missing on remote, copying the rest");
        }

        let pk = remote_pk.filter(|pk| columns.iter().any(|c| c.eq_ignore_ascii_case(pk)));

        // Pull all local rows for the shared columns.
        let column_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let rows = sqlx::query(&format!("SELECT {column_list} FROM {}", quote_ident(table)))
            .fetch_all(&self.local)
            .await?;

        let mut inserted = 0u64;
        let mut updated = 0u64;

        for row in &rows {
            let mut values = Vec::with_capacity(row.columns().len());
            for idx in 0..row.columns().len() {
                values.push(read_value(row, idx)?);
            }

            if let Some(pk_name) = &pk {
                let pk_idx = columns
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(pk_name))
                    .expect("pk filtered against columns");
                let pk_value = values[pk_idx].clone();

                let exists: i64 = {
                    let sql = format!(
                        "SELECT COUNT(*) FROM {} WHERE {} = ?1",
                        quote_ident(table),
                        quote_ident(pk_name)
                    );
                    let query = sqlx::query_scalar(&sql);
                    match &pk_value {
                        SqlValue::Integer(i) => query.bind(*i).fetch_one(&self.remote).await?,
                        SqlValue::Text(s) => {
                            query.bind(s.clone()).fetch_one(&self.remote).await?
                        }
                        _ => 0,
                    }
                };

                if exists > 0 {
                    // Overwrite the remote row: local copy wins.
                    let update_cols: Vec<(usize, &String)> = columns
                        .iter()
                        .enumerate()
                        .filter(|(_, c)| !c.eq_ignore_ascii_case(pk_name))
                        .collect();
                    if update_cols.is_empty() {
                        continue;
                    }

                    let set_clause = update_cols
                        .iter()
                        .enumerate()
                        .map(|(i, (_, c))| format!("{} = ?{}", quote_ident(c), i + 1))
                        .collect::<Vec<_>>()
                        .join(", ");
                    let sql = format!(
                        "UPDATE {} SET {} WHERE {} = ?{}",
                        quote_ident(table),
                        set_clause,
                        quote_ident(pk_name),
                        update_cols.len() + 1
                    );

                    let mut query = sqlx::query(&sql);
                    for (idx, _) in &update_cols {
                        query = bind_value(query, &values[*idx]);
                    }
                    query = bind_value(query, &pk_value);
                    query.execute(&self.remote).await?;

                    updated += 1;
                    continue;
                }
            }

            // Fresh row: explicit insert including the primary key, so
            // local and remote ids stay aligned.
            let placeholders = (1..=columns.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {} ({column_list}) VALUES ({placeholders})",
                quote_ident(table)
            );

            let mut query = sqlx::query(&sql);
            for value in &values {
                query = bind_value(query, value);
            }
            query.execute(&self.remote).await?;

            inserted += 1;
        }

        Ok((inserted, updated))
    }

    /// Post-pass: align the remote autoincrement counters with the copied
    /// data so locally-unknown inserts on the remote don't collide.
    /// Best-effort; tables without a sequence row are simply skipped.
    async fn reseed_sequences(&self) {
        for table in REPLICATED_TABLES {
            let pk = match table_schema(&self.remote, table).await {
                Ok((_, Some(pk))) => pk,
                _ => continue,
            };

            let sql = format!(
                "UPDATE sqlite_sequence
                 SET seq = (SELECT COALESCE(MAX({}), 0) FROM {})
                 WHERE name = '{table}'",
                quote_ident(&pk),
                quote_ident(table)
            );

            if let Err(e) = sqlx::query(&sql).execute(&self.remote).await {
                debug!(table = table, ?e, "Sequence reseed skipped");
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
