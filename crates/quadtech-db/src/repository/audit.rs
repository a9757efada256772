//! # Audit Log Repository
//!
//! Records who did what. Recording is best-effort: a failed audit write is
//! logged and swallowed so it can never break the business operation it
//! describes.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::DbResult;
use quadtech_core::AuditLogEntry;

const AUDIT_COLUMNS: &str = "al.id, al.user_id, al.action, al.table_name, al.record_id, \
     al.old_values, al.new_values, al.description, al.created_at, \
     u.username AS username, u.full_name AS full_name";

/// Repository for audit log operations.
#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: SqlitePool,
}

/// Filters for audit log queries. All fields optional.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub user_id: Option<i64>,
    pub action: Option<String>,
    pub table_name: Option<String>,
}

impl AuditLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditLogRepository { pool }
    }

    /// Records an audit action. Never fails the caller: errors are logged
    /// with `warn!` and swallowed.
    #[allow(clippy::too_many_arguments)]
    pub async fn record(
        &self,
        user_id: i64,
        action: &str,
        table_name: Option<&str>,
        record_id: Option<i64>,
        old_values: Option<&Value>,
        new_values: Option<&Value>,
        description: Option<&str>,
    ) {
        let old_json = old_values.map(|v| v.to_string());
        let new_json = new_values.map(|v| v.to_string());

        let result = sqlx::query(
            "INSERT INTO audit_log
                (user_id, action, table_name, record_id, old_values, new_values, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(user_id)
        .bind(action)
        .bind(table_name)
        .bind(record_id)
        .bind(old_json)
        .bind(new_json)
        .bind(description)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(?e, action = %action, "Failed to record audit action");
        }
    }

    /// Lists audit entries matching the filter, newest first.
    pub async fn list(&self, filter: &AuditFilter) -> DbResult<Vec<AuditLogEntry>> {
        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {AUDIT_COLUMNS}
             FROM audit_log al
             INNER JOIN users u ON al.user_id = u.id
             WHERE 1=1"
        ));

        if let Some(start) = filter.start {
            qb.push(" AND al.created_at >= ").push_bind(start);
        }
        if let Some(end) = filter.end {
            qb.push(" AND al.created_at <= ").push_bind(end);
        }
        if let Some(user_id) = filter.user_id {
            qb.push(" AND al.user_id = ").push_bind(user_id);
        }
        if let Some(action) = &filter.action {
            qb.push(" AND al.action = ").push_bind(action.clone());
        }
        if let Some(table_name) = &filter.table_name {
            qb.push(" AND al.table_name = ").push_bind(table_name.clone());
        }
        qb.push(" ORDER BY al.created_at DESC");

        let entries = qb
            .build_query_as::<AuditLogEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Recent entries for one user.
    pub async fn by_user(&self, user_id: i64, limit: u32) -> DbResult<Vec<AuditLogEntry>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS}
             FROM audit_log al
             INNER JOIN users u ON al.user_id = u.id
             WHERE al.user_id = ?1
             ORDER BY al.created_at DESC LIMIT ?2"
        );

        let entries = sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Recent entries for one table.
    pub async fn by_table(&self, table_name: &str, limit: u32) -> DbResult<Vec<AuditLogEntry>> {
        let sql = format!(
            "SELECT {AUDIT_COLUMNS}
             FROM audit_log al
             INNER JOIN users u ON al.user_id = u.id
             WHERE al.table_name = ?1
             ORDER BY al.created_at DESC LIMIT ?2"
        );

        let entries = sqlx::query_as::<_, AuditLogEntry>(&sql)
            .bind(table_name)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }
}
