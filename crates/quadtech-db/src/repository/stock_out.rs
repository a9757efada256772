//! # Stock Out Repository
//!
//! Inventory issues. Two entry points:
//!
//! - [`create_for_sale`](StockOutRepository::create_for_sale) runs inside
//!   the sales order transaction - the sale and its issue commit or roll
//!   back together.
//! - [`create_standalone`](StockOutRepository::create_standalone) is its
//!   own workflow for damage, loss, and disposal write-offs.

use chrono::Utc;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::audit::AuditLogRepository;
use crate::repository::ledger::post_drafts;
use crate::repository::next_document_seq;
use crate::repository::sync_queue::enqueue_in_tx;
use quadtech_core::money::Money;
use quadtech_core::numbering::{self, DocumentKind};
use quadtech_core::postings::write_off_postings;
use quadtech_core::validation::validate_stock_out_lines;
use quadtech_core::{CoreError, StockOut, StockOutItem, StockOutLine, StockOutReason, SyncOperation};

const STOCK_OUT_COLUMNS: &str = "so.id, so.sales_order_id, so.issue_number, so.issued_at, \
     so.reason, so.processed_by, so.created_at, \
     u.full_name AS processed_by_name, sal.order_number AS sales_order_number";

const STOCK_OUT_JOINS: &str = "FROM stock_out so \
     LEFT JOIN users u ON so.processed_by = u.id \
     LEFT JOIN sales_orders sal ON so.sales_order_id = sal.id";

const ITEM_COLUMNS: &str = "soi.id, soi.stock_out_id, soi.product_id, soi.quantity, soi.reason, \
     soi.created_at, p.name AS product_name, p.sku AS product_sku";

/// Repository for stock-out operations.
#[derive(Debug, Clone)]
pub struct StockOutRepository {
    pool: SqlitePool,
}

impl StockOutRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockOutRepository { pool }
    }

    // =========================================================================
    // Workflows
    // =========================================================================

    /// Creates the issue document for a sale, inside the caller's
    /// transaction. Inventory is already decremented by the sales
    /// workflow; this only records the movement.
    pub(crate) async fn create_for_sale(
        conn: &mut SqliteConnection,
        sales_order_id: i64,
        lines: &[StockOutLine],
        processed_by: i64,
    ) -> DbResult<i64> {
        let (stock_out_id, _) = insert_stock_out(
            conn,
            Some(sales_order_id),
            StockOutReason::Sale,
            lines,
            processed_by,
        )
        .await?;

        Ok(stock_out_id)
    }

    /// Standalone issue for damage, loss, or disposal.
    ///
    /// One transaction: validates stock, inserts the document, decrements
    /// inventory, and posts a write-off to the ledger when the reason is
    /// a shrinkage reason and the cost is known.
    pub async fn create_standalone(
        &self,
        lines: &[StockOutLine],
        reason: StockOutReason,
        notes: Option<&str>,
        processed_by: i64,
    ) -> DbResult<StockOut> {
        validate_stock_out_lines(lines)?;

        let mut tx = self.pool.begin().await?;

        // Check stock before touching anything, so the error names the
        // first offending product instead of a constraint.
        let mut total_cost = Money::zero();
        for line in lines {
            let product: Option<(String, i64, Option<i64>)> = sqlx::query_as(
                "SELECT name, quantity, cost_price_cents FROM products WHERE id = ?1",
            )
            .bind(line.product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((name, quantity, cost_price_cents)) = product else {
                return Err(DbError::Domain(CoreError::ProductNotFound(
                    line.product_id.to_string(),
                )));
            };

            if quantity < line.quantity {
                return Err(DbError::Domain(CoreError::InsufficientStock {
                    name,
                    available: quantity,
                    requested: line.quantity,
                }));
            }

            if let Some(cost) = cost_price_cents {
                total_cost += Money::from_cents(cost).multiply_quantity(line.quantity);
            }
        }

        let (stock_out_id, issue_number) =
            insert_stock_out(&mut tx, None, reason, lines, processed_by).await?;

        let now = Utc::now();
        for line in lines {
            sqlx::query(
                "UPDATE products SET quantity = quantity - ?2, updated_at = ?3
                 WHERE id = ?1 AND quantity >= ?2",
            )
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // Shrinkage write-off: expense against inventory.
        if reason.is_write_off() && total_cost.is_positive() {
            let drafts = write_off_postings(&issue_number, &reason.to_string(), total_cost);
            post_drafts(&mut tx, &drafts, "stock_out", stock_out_id, processed_by).await?;
        }

        enqueue_in_tx(&mut tx, "stock_out", SyncOperation::Insert, stock_out_id, None).await?;

        tx.commit().await?;
        info!(issue_number = %issue_number, reason = %reason, "Created stock out");

        AuditLogRepository::new(self.pool.clone())
            .record(
                processed_by,
                "create",
                Some("stock_out"),
                Some(stock_out_id),
                None,
                Some(&json!({
                    "issue_number": issue_number,
                    "reason": reason,
                    "total_cost_cents": total_cost.cents(),
                    "item_count": lines.len(),
                })),
                Some(&match notes {
                    Some(notes) => format!("stock out created: {reason} - {notes}"),
                    None => format!("stock out created: {reason}"),
                }),
            )
            .await;

        self.get(stock_out_id)
            .await?
            .ok_or_else(|| DbError::not_found("Stock out", stock_out_id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Issue history, newest first.
    pub async fn history(&self) -> DbResult<Vec<StockOut>> {
        let sql = format!(
            "SELECT {STOCK_OUT_COLUMNS} {STOCK_OUT_JOINS} ORDER BY so.issued_at DESC, so.id DESC"
        );
        let issues = sqlx::query_as::<_, StockOut>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(issues)
    }

    /// Gets an issue by id.
    pub async fn get(&self, stock_out_id: i64) -> DbResult<Option<StockOut>> {
        let sql = format!("SELECT {STOCK_OUT_COLUMNS} {STOCK_OUT_JOINS} WHERE so.id = ?1");
        let issue = sqlx::query_as::<_, StockOut>(&sql)
            .bind(stock_out_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(issue)
    }

    /// Gets the issue created for a sales order, if any.
    pub async fn get_by_sales_order(&self, sales_order_id: i64) -> DbResult<Option<StockOut>> {
        let sql =
            format!("SELECT {STOCK_OUT_COLUMNS} {STOCK_OUT_JOINS} WHERE so.sales_order_id = ?1");
        let issue = sqlx::query_as::<_, StockOut>(&sql)
            .bind(sales_order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(issue)
    }

    /// Items of an issue with product details.
    pub async fn items(&self, stock_out_id: i64) -> DbResult<Vec<StockOutItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS}
             FROM stock_out_items soi
             LEFT JOIN products p ON soi.product_id = p.id
             WHERE soi.stock_out_id = ?1
             ORDER BY soi.id"
        );
        let items = sqlx::query_as::<_, StockOutItem>(&sql)
            .bind(stock_out_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }
}

/// Inserts the issue header and items, numbering with the usual
/// scan-then-retry loop. Shared by the sale and standalone paths.
async fn insert_stock_out(
    conn: &mut SqliteConnection,
    sales_order_id: Option<i64>,
    reason: StockOutReason,
    lines: &[StockOutLine],
    processed_by: i64,
) -> DbResult<(i64, String)> {
    let (prefix, base_seq) = next_document_seq(
        conn,
        "stock_out",
        "issue_number",
        DocumentKind::StockOut,
        Utc::now(),
    )
    .await?;

    let now = Utc::now();
    let mut attempt = 0u32;
    let (stock_out_id, issue_number) = loop {
        let seq = numbering::sequence_for_attempt(DocumentKind::StockOut, base_seq, attempt)
            .map_err(DbError::Domain)?;
        let candidate = numbering::format_number(DocumentKind::StockOut, &prefix, seq);

        let inserted = sqlx::query(
            "INSERT INTO stock_out
                (sales_order_id, issue_number, issued_at, reason, processed_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?3)",
        )
        .bind(sales_order_id)
        .bind(&candidate)
        .bind(now)
        .bind(reason)
        .bind(processed_by)
        .execute(&mut *conn)
        .await;

        match inserted {
            Ok(result) => break (result.last_insert_rowid(), candidate),
            Err(e) => {
                let db_err = DbError::from(e);
                if db_err.is_unique_violation_on("issue_number") {
                    debug!(number = %candidate, "Issue number collision, retrying");
                    attempt += 1;
                    continue;
                }
                return Err(db_err);
            }
        }
    };

    for line in lines {
        sqlx::query(
            "INSERT INTO stock_out_items (stock_out_id, product_id, quantity, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(stock_out_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(reason)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    }

    Ok((stock_out_id, issue_number))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::purchase_order::tests::setup_catalog;

    async fn stock_up(db: &Database, product_id: i64, quantity: i64) {
        sqlx::query("UPDATE products SET quantity = ?2 WHERE id = ?1")
            .bind(product_id)
            .bind(quantity)
            .execute(db.pool())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_standalone_damage_write_off() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, product_id, user_id) = setup_catalog(&db).await;
        stock_up(&db, product_id, 10).await;

        let issue = db
            .stock_out()
            .create_standalone(
                &[StockOutLine {
                    product_id,
                    quantity: 3,
                }],
                StockOutReason::Damaged,
                Some("dropped pallet"),
                user_id,
            )
            .await
            .unwrap();

        assert_eq!(issue.issue_number, "STO-001");
        assert_eq!(issue.reason, StockOutReason::Damaged);
        assert!(issue.sales_order_id.is_none());

        // Inventory debited
        let product = db.products().get(product_id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 7);

        // Write-off posted at cost (3 x 40.00)
        let entries = db.ledger().by_reference("stock_out", issue.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].debit_cents, 12_000);
        assert_eq!(entries[0].account_code.as_deref(), Some("5007"));
        assert_eq!(entries[1].account_code.as_deref(), Some("1002"));
    }

    #[tokio::test]
    async fn test_standalone_other_reason_posts_nothing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, product_id, user_id) = setup_catalog(&db).await;
        stock_up(&db, product_id, 10).await;

        let issue = db
            .stock_out()
            .create_standalone(
                &[StockOutLine {
                    product_id,
                    quantity: 1,
                }],
                StockOutReason::Other,
                None,
                user_id,
            )
            .await
            .unwrap();

        let entries = db.ledger().by_reference("stock_out", issue.id).await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, product_id, user_id) = setup_catalog(&db).await;
        stock_up(&db, product_id, 2).await;

        let err = db
            .stock_out()
            .create_standalone(
                &[StockOutLine {
                    product_id,
                    quantity: 5,
                }],
                StockOutReason::Missing,
                None,
                user_id,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 2,
                requested: 5,
                ..
            })
        ));

        // Nothing written, stock untouched
        let issues: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_out")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(issues, 0);
        assert_eq!(db.products().get(product_id).await.unwrap().unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_issue_numbers_sequential() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, product_id, user_id) = setup_catalog(&db).await;
        stock_up(&db, product_id, 10).await;

        let line = [StockOutLine {
            product_id,
            quantity: 1,
        }];

        let a = db
            .stock_out()
            .create_standalone(&line, StockOutReason::Disposal, None, user_id)
            .await
            .unwrap();
        let b = db
            .stock_out()
            .create_standalone(&line, StockOutReason::Disposal, None, user_id)
            .await
            .unwrap();

        assert_eq!(a.issue_number, "STO-001");
        assert_eq!(b.issue_number, "STO-002");
    }
}
