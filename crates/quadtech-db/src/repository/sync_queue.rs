//! # Sync Queue Repository
//!
//! The sync queue is the staging table of pending changes for eventual
//! replication to the remote database. Workflows enqueue inside their own
//! transaction, so a committed document always has its queue entry and a
//! rolled-back document never does.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use quadtech_core::{SyncOperation, SyncQueueItem, SyncQueueStatus};

const QUEUE_COLUMNS: &str = "id, table_name, operation, record_id, payload, status, \
     error_message, retry_count, created_at, last_attempt_at, synced_at";

/// Enqueues a change inside a workflow transaction.
pub(crate) async fn enqueue_in_tx(
    conn: &mut SqliteConnection,
    table_name: &str,
    operation: SyncOperation,
    record_id: i64,
    payload: Option<&str>,
) -> DbResult<()> {
    sqlx::query(
        "INSERT INTO sync_queue (table_name, operation, record_id, payload, status, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
    )
    .bind(table_name)
    .bind(operation)
    .bind(record_id)
    .bind(payload)
    .bind(Utc::now())
    .execute(conn)
    .await?;

    Ok(())
}

/// Repository for sync queue operations.
#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    pool: SqlitePool,
}

impl SyncQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SyncQueueRepository { pool }
    }

    /// Enqueues a change outside any transaction.
    pub async fn enqueue(
        &self,
        table_name: &str,
        operation: SyncOperation,
        record_id: i64,
        payload: Option<&str>,
    ) -> DbResult<i64> {
        debug!(table = table_name, record_id = record_id, "Enqueuing for sync");

        let result = sqlx::query(
            "INSERT INTO sync_queue (table_name, operation, record_id, payload, status, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
        )
        .bind(table_name)
        .bind(operation)
        .bind(record_id)
        .bind(payload)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Pending entries, oldest first.
    pub async fn pending(&self, limit: u32) -> DbResult<Vec<SyncQueueItem>> {
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue
             WHERE status = 'pending'
             ORDER BY created_at ASC, id ASC
             LIMIT ?1"
        );

        let items = sqlx::query_as::<_, SyncQueueItem>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }

    /// Counts pending entries.
    pub async fn pending_count(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_queue WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Marks an entry as currently syncing.
    pub async fn mark_syncing(&self, id: i64) -> DbResult<()> {
        sqlx::query(
            "UPDATE sync_queue SET status = 'syncing', last_attempt_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Marks an entry as synced.
    pub async fn mark_synced(&self, id: i64) -> DbResult<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE sync_queue SET status = 'synced', synced_at = ?2, last_attempt_at = ?2
             WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a sync failure and bumps the retry counter.
    pub async fn mark_failed(&self, id: i64, error: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE sync_queue SET
                status = 'failed',
                error_message = ?2,
                retry_count = retry_count + 1,
                last_attempt_at = ?3
             WHERE id = ?1",
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Re-queues failed entries for another attempt.
    pub async fn retry_failed(&self) -> DbResult<u64> {
        let result = sqlx::query("UPDATE sync_queue SET status = 'pending' WHERE status = 'failed'")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Deletes synced entries, optionally only those synced before a
    /// cutoff.
    pub async fn clear_synced(&self, before: Option<DateTime<Utc>>) -> DbResult<u64> {
        let mut qb = sqlx::QueryBuilder::new("DELETE FROM sync_queue WHERE status = 'synced'");
        if let Some(before) = before {
            qb.push(" AND synced_at < ").push_bind(before);
        }

        let result = qb.build().execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    #[tokio::test]
    async fn test_queue_lifecycle() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.sync_queue();

        let id = queue
            .enqueue("products", SyncOperation::Insert, 7, None)
            .await
            .unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 1);

        queue.mark_syncing(id).await.unwrap();
        assert_eq!(queue.pending_count().await.unwrap(), 0);

        queue.mark_synced(id).await.unwrap();
        let cleared = queue.clear_synced(None).await.unwrap();
        assert_eq!(cleared, 1);
    }

    #[tokio::test]
    async fn test_failed_entries_track_retries() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.sync_queue();

        let id = queue
            .enqueue("sales_orders", SyncOperation::Insert, 1, Some("{}"))
            .await
            .unwrap();

        queue.mark_failed(id, "remote unreachable").await.unwrap();
        queue.mark_failed(id, "remote unreachable").await.unwrap();

        let items = sqlx::query_as::<_, SyncQueueItem>(&format!(
            "SELECT {QUEUE_COLUMNS} FROM sync_queue WHERE id = {id}"
        ))
        .fetch_all(db.pool())
        .await
        .unwrap();
        assert_eq!(items[0].retry_count, 2);
        assert_eq!(items[0].status, SyncQueueStatus::Failed);

        assert_eq!(queue.retry_failed().await.unwrap(), 1);
        assert_eq!(queue.pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_pending_ordered_oldest_first() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let queue = db.sync_queue();

        queue.enqueue("a", SyncOperation::Insert, 1, None).await.unwrap();
        queue.enqueue("b", SyncOperation::Insert, 2, None).await.unwrap();

        let pending = queue.pending(10).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].table_name, "a");
    }
}
