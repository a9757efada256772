//! # Stock In Repository
//!
//! Goods receipts against purchase orders.
//!
//! ## Receive Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     SINGLE TRANSACTION                          │
//! │                                                                 │
//! │  1. Load the PO, require status = delivered                     │
//! │  2. Generate SI-NNN (retry on collision, bounded)               │
//! │  3. INSERT header + items (all-zero lines are skipped,          │
//! │     rejected quantities are recorded)                           │
//! │  4. Increment product stock and refresh cost for received qty   │
//! │  5. Create the accounts-payable row for the PO (skip if the PO  │
//! │     already has one)                                            │
//! │  6. Post inventory/AP ledger entries                            │
//! │  7. Flip the PO to received                                     │
//! │  8. Enqueue sync entry                                          │
//! └─────────────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//!  COMMIT, then audit (best-effort, outside the transaction)
//! ```

use chrono::Utc;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::audit::AuditLogRepository;
use crate::repository::ledger::post_drafts;
use crate::repository::next_document_seq;
use crate::repository::sync_queue::enqueue_in_tx;
use quadtech_core::money::Money;
use quadtech_core::numbering::{self, DocumentKind};
use quadtech_core::postings::stock_in_postings;
use quadtech_core::{CoreError, PoStatus, StockIn, StockInItem, StockInLine, SyncOperation};

const STOCK_IN_COLUMNS: &str = "si.id, si.po_id, si.supplier_id, si.receipt_number, \
     si.received_at, si.notes, si.processed_by, si.created_at, \
     s.name AS supplier_name, po.po_number AS po_number, u.full_name AS processed_by_name";

const STOCK_IN_JOINS: &str = "FROM stock_in si \
     LEFT JOIN suppliers s ON si.supplier_id = s.id \
     LEFT JOIN purchase_orders po ON si.po_id = po.id \
     LEFT JOIN users u ON si.processed_by = u.id";

const ITEM_COLUMNS: &str = "sii.id, sii.stock_in_id, sii.product_id, sii.quantity_received, \
     sii.quantity_rejected, sii.rejection_reason, sii.rejection_remarks, sii.unit_cost_cents, \
     sii.created_at, p.name AS product_name, p.sku AS product_sku";

/// Repository for stock-in operations.
#[derive(Debug, Clone)]
pub struct StockInRepository {
    pool: SqlitePool,
}

impl StockInRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockInRepository { pool }
    }

    // =========================================================================
    // Receive Workflow
    // =========================================================================

    /// Receives goods against a delivered purchase order.
    ///
    /// Every side-effect - receipt rows, inventory increments, the
    /// accounts-payable balance, ledger postings, and the PO status flip -
    /// happens inside one transaction.
    pub async fn receive(
        &self,
        po_id: i64,
        lines: &[StockInLine],
        notes: Option<&str>,
        processed_by: i64,
    ) -> DbResult<StockIn> {
        if lines.is_empty() {
            return Err(DbError::Domain(CoreError::Validation(
                quadtech_core::ValidationError::EmptyItems {
                    document: "stock in".to_string(),
                },
            )));
        }

        let mut tx = self.pool.begin().await?;

        // The PO must exist and be awaiting receipt.
        let po: Option<(i64, String, PoStatus)> =
            sqlx::query_as("SELECT supplier_id, po_number, status FROM purchase_orders WHERE id = ?1")
                .bind(po_id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some((supplier_id, po_number, status)) = po else {
            return Err(DbError::not_found("Purchase order", po_id));
        };

        if status != PoStatus::Delivered {
            return Err(DbError::Domain(CoreError::InvalidStatus {
                entity: "Purchase order".to_string(),
                id: po_id,
                current: status.to_string(),
                operation: "receive stock".to_string(),
            }));
        }

        // Number and insert the receipt header.
        let (prefix, base_seq) = next_document_seq(
            &mut tx,
            "stock_in",
            "receipt_number",
            DocumentKind::StockIn,
            Utc::now(),
        )
        .await?;

        let now = Utc::now();
        let mut attempt = 0u32;
        let (stock_in_id, receipt_number) = loop {
            let seq = numbering::sequence_for_attempt(DocumentKind::StockIn, base_seq, attempt)
                .map_err(DbError::Domain)?;
            let candidate = numbering::format_number(DocumentKind::StockIn, &prefix, seq);

            let inserted = sqlx::query(
                "INSERT INTO stock_in
                    (po_id, supplier_id, receipt_number, received_at, notes, processed_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?4)",
            )
            .bind(po_id)
            .bind(supplier_id)
            .bind(&candidate)
            .bind(now)
            .bind(notes)
            .bind(processed_by)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(result) => break (result.last_insert_rowid(), candidate),
                Err(e) => {
                    let db_err = DbError::from(e);
                    if db_err.is_unique_violation_on("receipt_number") {
                        debug!(number = %candidate, "Receipt number collision, retrying");
                        attempt += 1;
                        continue;
                    }
                    return Err(db_err);
                }
            }
        };

        // Items and inventory. Lines with nothing received nor rejected
        // carry no information and are skipped.
        let mut total_cost = Money::zero();
        for line in lines {
            if line.is_empty() {
                continue;
            }

            sqlx::query(
                "INSERT INTO stock_in_items
                    (stock_in_id, product_id, quantity_received, quantity_rejected,
                     rejection_reason, rejection_remarks, unit_cost_cents, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(stock_in_id)
            .bind(line.product_id)
            .bind(line.quantity_received)
            .bind(line.quantity_rejected)
            .bind(&line.rejection_reason)
            .bind(&line.rejection_remarks)
            .bind(line.unit_cost_cents)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if line.quantity_received > 0 {
                let updated = sqlx::query(
                    "UPDATE products
                     SET quantity = quantity + ?2, cost_price_cents = ?3, updated_at = ?4
                     WHERE id = ?1",
                )
                .bind(line.product_id)
                .bind(line.quantity_received)
                .bind(line.unit_cost_cents)
                .bind(now)
                .execute(&mut *tx)
                .await?;

                if updated.rows_affected() == 0 {
                    return Err(DbError::Domain(CoreError::ProductNotFound(
                        line.product_id.to_string(),
                    )));
                }

                total_cost +=
                    Money::from_cents(line.unit_cost_cents).multiply_quantity(line.quantity_received);
            }
        }

        // Accounts payable: one balance per PO, created on first receipt.
        let ap_exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts_payable WHERE po_id = ?1")
                .bind(po_id)
                .fetch_one(&mut *tx)
                .await?;

        if ap_exists == 0 && total_cost.is_positive() {
            sqlx::query(
                "INSERT INTO accounts_payable
                    (po_id, supplier_id, total_cents, paid_cents, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, 'unpaid', ?4, ?4)",
            )
            .bind(po_id)
            .bind(supplier_id)
            .bind(total_cost.cents())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // Ledger: inventory up, payable up.
        if total_cost.is_positive() {
            let drafts = stock_in_postings(&receipt_number, total_cost);
            post_drafts(&mut tx, &drafts, "purchase", stock_in_id, processed_by).await?;
        }

        // The PO is now received.
        sqlx::query("UPDATE purchase_orders SET status = 'received', updated_at = ?2 WHERE id = ?1")
            .bind(po_id)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        enqueue_in_tx(&mut tx, "stock_in", SyncOperation::Insert, stock_in_id, None).await?;

        tx.commit().await?;
        info!(
            receipt_number = %receipt_number,
            po_number = %po_number,
            total_cost_cents = total_cost.cents(),
            "Received stock"
        );

        AuditLogRepository::new(self.pool.clone())
            .record(
                processed_by,
                "create",
                Some("stock_in"),
                Some(stock_in_id),
                None,
                Some(&json!({
                    "receipt_number": receipt_number,
                    "po_id": po_id,
                    "supplier_id": supplier_id,
                    "total_cost_cents": total_cost.cents(),
                    "item_count": lines.len(),
                })),
                Some(&format!("received stock from purchase order: {po_number}")),
            )
            .await;

        self.get(stock_in_id)
            .await?
            .ok_or_else(|| DbError::not_found("Stock in", stock_in_id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Receipt history, newest first.
    pub async fn history(&self) -> DbResult<Vec<StockIn>> {
        let sql = format!(
            "SELECT {STOCK_IN_COLUMNS} {STOCK_IN_JOINS} ORDER BY si.received_at DESC, si.id DESC"
        );
        let receipts = sqlx::query_as::<_, StockIn>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(receipts)
    }

    /// Gets a receipt by id.
    pub async fn get(&self, stock_in_id: i64) -> DbResult<Option<StockIn>> {
        let sql = format!("SELECT {STOCK_IN_COLUMNS} {STOCK_IN_JOINS} WHERE si.id = ?1");
        let receipt = sqlx::query_as::<_, StockIn>(&sql)
            .bind(stock_in_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(receipt)
    }

    /// Items of a receipt with product details.
    pub async fn items(&self, stock_in_id: i64) -> DbResult<Vec<StockInItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS}
             FROM stock_in_items sii
             LEFT JOIN products p ON sii.product_id = p.id
             WHERE sii.stock_in_id = ?1
             ORDER BY sii.id"
        );
        let items = sqlx::query_as::<_, StockInItem>(&sql)
            .bind(stock_in_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::purchase_order::tests::setup_catalog;
    use quadtech_core::{ApStatus, PurchaseOrderLine};

    async fn create_delivered_po(
        db: &Database,
        supplier_id: i64,
        product_id: i64,
        user_id: i64,
    ) -> i64 {
        let now = Utc::now();
        let po = db
            .purchase_orders()
            .create(
                supplier_id,
                now,
                now,
                None,
                &[PurchaseOrderLine {
                    product_id,
                    quantity_ordered: 10,
                    unit_cost_cents: Some(4_000),
                }],
                user_id,
            )
            .await
            .unwrap();

        let pos = db.purchase_orders();
        pos.update_status(po.id, PoStatus::Approved, None, None, user_id)
            .await
            .unwrap();
        pos.update_status(po.id, PoStatus::Delivered, None, None, user_id)
            .await
            .unwrap();

        po.id
    }

    #[tokio::test]
    async fn test_receive_full_workflow() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (supplier_id, product_id, user_id) = setup_catalog(&db).await;
        let po_id = create_delivered_po(&db, supplier_id, product_id, user_id).await;

        let receipt = db
            .stock_in()
            .receive(
                po_id,
                &[StockInLine {
                    product_id,
                    quantity_received: 8,
                    quantity_rejected: 2,
                    rejection_reason: Some("cracked arms".into()),
                    rejection_remarks: None,
                    unit_cost_cents: 4_100,
                }],
                Some("partial damage"),
                user_id,
            )
            .await
            .unwrap();

        assert_eq!(receipt.receipt_number, "SI-001");

        let po = db.purchase_orders().get(po_id).await.unwrap().unwrap();
        assert_eq!(po.status, PoStatus::Received);
        assert_eq!(receipt.po_number.as_deref(), Some(po.po_number.as_str()));

        // Inventory went up by the received quantity, cost refreshed
        let product = db.products().get(product_id).await.unwrap().unwrap();
        assert_eq!(product.quantity, 8);
        assert_eq!(product.cost_price_cents, Some(4_100));

        // One AP row for the PO, valued at received x cost
        let ap = db
            .accounts_payable()
            .get_by_po(po_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ap.total_cents, 8 * 4_100);
        assert_eq!(ap.paid_cents, 0);
        assert_eq!(ap.status, ApStatus::Unpaid);

        // Balanced inventory/AP postings referencing the receipt
        let entries = db.ledger().by_reference("purchase", receipt.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        let debits: i64 = entries.iter().map(|e| e.debit_cents).sum();
        let credits: i64 = entries.iter().map(|e| e.credit_cents).sum();
        assert_eq!(debits, credits);
        assert_eq!(debits, 8 * 4_100);

        // Rejected quantities recorded on the item
        let items = db.stock_in().items(receipt.id).await.unwrap();
        assert_eq!(items[0].quantity_rejected, 2);
        assert_eq!(items[0].rejection_reason.as_deref(), Some("cracked arms"));
    }

    #[tokio::test]
    async fn test_receive_requires_delivered_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (supplier_id, product_id, user_id) = setup_catalog(&db).await;

        let now = Utc::now();
        let po = db
            .purchase_orders()
            .create(
                supplier_id,
                now,
                now,
                None,
                &[PurchaseOrderLine {
                    product_id,
                    quantity_ordered: 5,
                    unit_cost_cents: Some(100),
                }],
                user_id,
            )
            .await
            .unwrap();

        // Still pending: receiving is refused and nothing is written
        let err = db
            .stock_in()
            .receive(
                po.id,
                &[StockInLine {
                    product_id,
                    quantity_received: 5,
                    quantity_rejected: 0,
                    rejection_reason: None,
                    rejection_remarks: None,
                    unit_cost_cents: 100,
                }],
                None,
                user_id,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStatus { .. })));

        let receipts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM stock_in")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(receipts, 0);
        assert_eq!(db.products().get(product_id).await.unwrap().unwrap().quantity, 0);
    }

    #[tokio::test]
    async fn test_second_receipt_does_not_duplicate_ap() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (supplier_id, product_id, user_id) = setup_catalog(&db).await;
        let po_id = create_delivered_po(&db, supplier_id, product_id, user_id).await;

        let line = StockInLine {
            product_id,
            quantity_received: 5,
            quantity_rejected: 0,
            rejection_reason: None,
            rejection_remarks: None,
            unit_cost_cents: 4_000,
        };

        db.stock_in()
            .receive(po_id, &[line.clone()], None, user_id)
            .await
            .unwrap();

        // Force the PO back to delivered to simulate a second receipt
        sqlx::query("UPDATE purchase_orders SET status = 'delivered' WHERE id = ?1")
            .bind(po_id)
            .execute(db.pool())
            .await
            .unwrap();

        db.stock_in()
            .receive(po_id, &[line], None, user_id)
            .await
            .unwrap();

        let ap_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM accounts_payable WHERE po_id = ?1")
                .bind(po_id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        assert_eq!(ap_count, 1);

        // Receipt numbers are sequential
        let receipts = db.stock_in().history().await.unwrap();
        assert_eq!(receipts.len(), 2);
        assert_eq!(receipts[1].receipt_number, "SI-001");
        assert_eq!(receipts[0].receipt_number, "SI-002");
    }

    #[tokio::test]
    async fn test_all_zero_lines_are_skipped() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (supplier_id, product_id, user_id) = setup_catalog(&db).await;
        let po_id = create_delivered_po(&db, supplier_id, product_id, user_id).await;

        let receipt = db
            .stock_in()
            .receive(
                po_id,
                &[
                    StockInLine {
                        product_id,
                        quantity_received: 0,
                        quantity_rejected: 0,
                        rejection_reason: None,
                        rejection_remarks: None,
                        unit_cost_cents: 4_000,
                    },
                    StockInLine {
                        product_id,
                        quantity_received: 3,
                        quantity_rejected: 0,
                        rejection_reason: None,
                        rejection_remarks: None,
                        unit_cost_cents: 4_000,
                    },
                ],
                None,
                user_id,
            )
            .await
            .unwrap();

        let items = db.stock_in().items(receipt.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity_received, 3);
    }
}
