//! # Purchase Order Repository
//!
//! Purchase order queries plus the creation workflow.
//!
//! ## Creation Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     SINGLE TRANSACTION                          │
//! │                                                                 │
//! │  1. Resolve each line's cost and tax from the product           │
//! │  2. Scan max suffix for PO-YYYYMM- and pick the next number     │
//! │  3. INSERT header (retry on number collision, bounded)          │
//! │  4. INSERT items                                                │
//! │  5. Enqueue sync entry                                          │
//! └─────────────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//!  COMMIT, then audit (best-effort, outside the transaction)
//! ```

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::audit::AuditLogRepository;
use crate::repository::sync_queue::enqueue_in_tx;
use crate::repository::next_document_seq;
use quadtech_core::money::Money;
use quadtech_core::numbering::{self, DocumentKind};
use quadtech_core::validation::validate_purchase_order_lines;
use quadtech_core::{
    CoreError, PoStatus, PurchaseOrder, PurchaseOrderItem, PurchaseOrderLine, SyncOperation,
    TaxRate,
};

const PO_COLUMNS: &str = "po.id, po.supplier_id, po.po_number, po.order_date, po.expected_date, \
     po.status, po.subtotal_cents, po.tax_cents, po.total_cents, po.notes, \
     po.cancellation_reason, po.cancellation_remarks, po.created_at, po.updated_at, \
     s.name AS supplier_name";

const PO_JOIN: &str = "FROM purchase_orders po LEFT JOIN suppliers s ON po.supplier_id = s.id";

const ITEM_COLUMNS: &str = "poi.id, poi.po_id, poi.product_id, poi.quantity_ordered, \
     poi.unit_cost_cents, poi.tax_rate_bps, poi.tax_cents, poi.subtotal_cents, poi.total_cents, \
     poi.created_at, p.name AS product_name, p.sku AS product_sku";

/// A priced line, resolved inside the transaction.
struct ResolvedLine {
    product_id: i64,
    quantity: i64,
    unit_cost_cents: i64,
    tax_rate_bps: u32,
    tax_cents: i64,
    subtotal_cents: i64,
    total_cents: i64,
}

/// Repository for purchase order operations.
#[derive(Debug, Clone)]
pub struct PurchaseOrderRepository {
    pool: SqlitePool,
}

impl PurchaseOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseOrderRepository { pool }
    }

    // =========================================================================
    // Creation Workflow
    // =========================================================================

    /// Creates a purchase order with its items in one transaction.
    ///
    /// Line costs default to the product's last cost; tax rates come from
    /// the product's tax link. Returns the created order with its
    /// generated `PO-YYYYMM-NNNN` number.
    pub async fn create(
        &self,
        supplier_id: i64,
        order_date: DateTime<Utc>,
        expected_date: DateTime<Utc>,
        notes: Option<&str>,
        lines: &[PurchaseOrderLine],
        created_by: i64,
    ) -> DbResult<PurchaseOrder> {
        validate_purchase_order_lines(lines)?;

        let mut tx = self.pool.begin().await?;

        // Price every line against the current catalog.
        let mut resolved = Vec::with_capacity(lines.len());
        let mut subtotal = Money::zero();
        let mut tax_total = Money::zero();
        let mut grand_total = Money::zero();

        for line in lines {
            let item = resolve_purchase_line(&mut tx, line).await?;
            subtotal += Money::from_cents(item.subtotal_cents);
            tax_total += Money::from_cents(item.tax_cents);
            grand_total += Money::from_cents(item.total_cents);
            resolved.push(item);
        }

        // Number and insert the header, retrying on collisions.
        let (prefix, base_seq) = next_document_seq(
            &mut tx,
            "purchase_orders",
            "po_number",
            DocumentKind::PurchaseOrder,
            order_date,
        )
        .await?;

        let now = Utc::now();
        let mut attempt = 0u32;
        let (po_id, po_number) = loop {
            let seq = numbering::sequence_for_attempt(DocumentKind::PurchaseOrder, base_seq, attempt)
                .map_err(DbError::Domain)?;
            let candidate = numbering::format_number(DocumentKind::PurchaseOrder, &prefix, seq);

            let inserted = sqlx::query(
                "INSERT INTO purchase_orders
                    (supplier_id, po_number, order_date, expected_date, status,
                     subtotal_cents, tax_cents, total_cents, notes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6, ?7, ?8, ?9, ?9)",
            )
            .bind(supplier_id)
            .bind(&candidate)
            .bind(order_date)
            .bind(expected_date)
            .bind(subtotal.cents())
            .bind(tax_total.cents())
            .bind(grand_total.cents())
            .bind(notes)
            .bind(now)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(result) => break (result.last_insert_rowid(), candidate),
                Err(e) => {
                    let db_err = DbError::from(e);
                    if db_err.is_unique_violation_on("po_number") {
                        debug!(number = %candidate, "PO number collision, retrying");
                        attempt += 1;
                        continue;
                    }
                    return Err(db_err);
                }
            }
        };

        for item in &resolved {
            sqlx::query(
                "INSERT INTO purchase_order_items
                    (po_id, product_id, quantity_ordered, unit_cost_cents,
                     tax_rate_bps, tax_cents, subtotal_cents, total_cents, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(po_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_cost_cents)
            .bind(item.tax_rate_bps)
            .bind(item.tax_cents)
            .bind(item.subtotal_cents)
            .bind(item.total_cents)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        enqueue_in_tx(&mut tx, "purchase_orders", SyncOperation::Insert, po_id, None).await?;

        tx.commit().await?;
        info!(po_number = %po_number, total_cents = grand_total.cents(), "Created purchase order");

        AuditLogRepository::new(self.pool.clone())
            .record(
                created_by,
                "create",
                Some("purchase_orders"),
                Some(po_id),
                None,
                Some(&json!({
                    "po_number": po_number,
                    "supplier_id": supplier_id,
                    "status": "pending",
                    "total_cents": grand_total.cents(),
                    "item_count": lines.len(),
                })),
                Some(&format!("created purchase order: {po_number}")),
            )
            .await;

        self.get(po_id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase order", po_id))
    }

    // =========================================================================
    // Status Updates
    // =========================================================================

    /// Moves a purchase order to a new status, validating the transition.
    ///
    /// Cancellation carries an optional reason and remarks; both are
    /// ignored for other transitions.
    pub async fn update_status(
        &self,
        po_id: i64,
        status: PoStatus,
        cancellation_reason: Option<&str>,
        cancellation_remarks: Option<&str>,
        changed_by: i64,
    ) -> DbResult<()> {
        let current = self
            .get(po_id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase order", po_id))?;

        if !current.status.can_transition_to(status) {
            return Err(DbError::Domain(CoreError::InvalidStatus {
                entity: "Purchase order".to_string(),
                id: po_id,
                current: current.status.to_string(),
                operation: format!("move to {status}"),
            }));
        }

        let (reason, remarks) = if status == PoStatus::Cancelled {
            (cancellation_reason, cancellation_remarks)
        } else {
            (None, None)
        };

        sqlx::query(
            "UPDATE purchase_orders SET
                status = ?2, cancellation_reason = ?3, cancellation_remarks = ?4, updated_at = ?5
             WHERE id = ?1",
        )
        .bind(po_id)
        .bind(status)
        .bind(reason)
        .bind(remarks)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        AuditLogRepository::new(self.pool.clone())
            .record(
                changed_by,
                "update",
                Some("purchase_orders"),
                Some(po_id),
                Some(&json!({ "status": current.status })),
                Some(&json!({
                    "status": status,
                    "cancellation_reason": reason,
                    "cancellation_remarks": remarks,
                })),
                Some(&format!(
                    "updated purchase order status: {} to {status}",
                    current.po_number
                )),
            )
            .await;

        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// All purchase orders, newest order date first.
    pub async fn list(&self) -> DbResult<Vec<PurchaseOrder>> {
        let sql = format!("SELECT {PO_COLUMNS} {PO_JOIN} ORDER BY po.order_date DESC, po.id DESC");
        let orders = sqlx::query_as::<_, PurchaseOrder>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    /// Delivered orders that have not been received into stock yet.
    pub async fn list_pending_receipt(&self) -> DbResult<Vec<PurchaseOrder>> {
        let sql = format!(
            "SELECT {PO_COLUMNS} {PO_JOIN}
             LEFT JOIN stock_in si ON po.id = si.po_id
             WHERE po.status = 'delivered' AND si.po_id IS NULL
             ORDER BY po.order_date DESC"
        );
        let orders = sqlx::query_as::<_, PurchaseOrder>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    /// Gets a purchase order by id.
    pub async fn get(&self, po_id: i64) -> DbResult<Option<PurchaseOrder>> {
        let sql = format!("SELECT {PO_COLUMNS} {PO_JOIN} WHERE po.id = ?1");
        let order = sqlx::query_as::<_, PurchaseOrder>(&sql)
            .bind(po_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Items of a purchase order with product details.
    pub async fn items(&self, po_id: i64) -> DbResult<Vec<PurchaseOrderItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS}
             FROM purchase_order_items poi
             INNER JOIN products p ON poi.product_id = p.id
             WHERE poi.po_id = ?1
             ORDER BY poi.id"
        );
        let items = sqlx::query_as::<_, PurchaseOrderItem>(&sql)
            .bind(po_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }
}

/// Resolves one input line against the catalog: cost fallback, tax rate,
/// and line totals.
async fn resolve_purchase_line(
    conn: &mut SqliteConnection,
    line: &PurchaseOrderLine,
) -> DbResult<ResolvedLine> {
    let product: Option<(i64, Option<i64>, Option<i64>)> = sqlx::query_as(
        "SELECT id, cost_price_cents, tax_id FROM products WHERE id = ?1",
    )
    .bind(line.product_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((product_id, cost_price_cents, tax_id)) = product else {
        return Err(DbError::Domain(CoreError::ProductNotFound(
            line.product_id.to_string(),
        )));
    };

    let tax_rate_bps = resolve_tax_rate(conn, tax_id).await?;

    let unit_cost = line
        .unit_cost_cents
        .or(cost_price_cents)
        .unwrap_or(0);

    let subtotal = Money::from_cents(unit_cost).multiply_quantity(line.quantity_ordered);
    let tax = subtotal.calculate_tax(TaxRate::from_bps(tax_rate_bps));
    let total = subtotal + tax;

    Ok(ResolvedLine {
        product_id,
        quantity: line.quantity_ordered,
        unit_cost_cents: unit_cost,
        tax_rate_bps,
        tax_cents: tax.cents(),
        subtotal_cents: subtotal.cents(),
        total_cents: total.cents(),
    })
}

/// Looks up a product's active tax rate; no link or inactive tax means 0.
pub(crate) async fn resolve_tax_rate(
    conn: &mut SqliteConnection,
    tax_id: Option<i64>,
) -> DbResult<u32> {
    let Some(tax_id) = tax_id else {
        return Ok(0);
    };

    let rate: Option<u32> =
        sqlx::query_scalar("SELECT rate_bps FROM taxes WHERE id = ?1 AND is_active = 1")
            .bind(tax_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(rate.unwrap_or(0))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::user::tests::create_test_user;
    use quadtech_core::{NewProduct, NewSupplier};

    /// Seeds a supplier, a 12% tax, a product, and a staff user; returns
    /// (supplier_id, product_id, user_id). Reused by the other workflow
    /// tests.
    pub async fn setup_catalog(db: &Database) -> (i64, i64, i64) {
        let user = create_test_user(db, "buyer").await;

        let supplier = db
            .suppliers()
            .create(&NewSupplier {
                name: "Aero Components".into(),
                contact_person: None,
                phone: None,
                email: None,
                address: None,
            })
            .await
            .unwrap();

        let tax = db.taxes().create("VAT", 1200).await.unwrap();
        let product = db
            .products()
            .create(&NewProduct {
                brand_id: None,
                category_id: None,
                tax_id: Some(tax.id),
                name: "Quad X1 Frame".into(),
                sku: "QX1-FRAME".into(),
                model_number: None,
                cost_price_cents: Some(4_000),
                sell_price_cents: 9_900,
                quantity: 0,
            })
            .await
            .unwrap();

        (supplier.id, product.id, user.id)
    }

    #[tokio::test]
    async fn test_create_purchase_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (supplier_id, product_id, user_id) = setup_catalog(&db).await;

        let now = Utc::now();
        let po = db
            .purchase_orders()
            .create(
                supplier_id,
                now,
                now,
                Some("first order"),
                &[PurchaseOrderLine {
                    product_id,
                    quantity_ordered: 10,
                    unit_cost_cents: Some(4_000),
                }],
                user_id,
            )
            .await
            .unwrap();

        let prefix = numbering::series_prefix(DocumentKind::PurchaseOrder, now);
        assert_eq!(po.po_number, format!("{prefix}0001"));
        assert_eq!(po.status, PoStatus::Pending);
        // 10 × 40.00 = 400.00 subtotal, 12% tax = 48.00
        assert_eq!(po.subtotal_cents, 40_000);
        assert_eq!(po.tax_cents, 4_800);
        assert_eq!(po.total_cents, 44_800);
        assert_eq!(po.supplier_name.as_deref(), Some("Aero Components"));

        let items = db.purchase_orders().items(po.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].tax_rate_bps, 1200);
        assert_eq!(items[0].product_sku.as_deref(), Some("QX1-FRAME"));

        // Workflow enqueued a sync entry
        assert_eq!(db.sync_queue().pending_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_po_numbers_increase_within_month() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (supplier_id, product_id, user_id) = setup_catalog(&db).await;

        let now = Utc::now();
        let line = [PurchaseOrderLine {
            product_id,
            quantity_ordered: 1,
            unit_cost_cents: Some(100),
        }];

        let a = db
            .purchase_orders()
            .create(supplier_id, now, now, None, &line, user_id)
            .await
            .unwrap();
        let b = db
            .purchase_orders()
            .create(supplier_id, now, now, None, &line, user_id)
            .await
            .unwrap();

        assert!(b.po_number > a.po_number);
        assert!(a.po_number.ends_with("0001"));
        assert!(b.po_number.ends_with("0002"));
    }

    #[tokio::test]
    async fn test_unknown_product_rolls_back_everything() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (supplier_id, product_id, user_id) = setup_catalog(&db).await;

        let now = Utc::now();
        let err = db
            .purchase_orders()
            .create(
                supplier_id,
                now,
                now,
                None,
                &[
                    PurchaseOrderLine {
                        product_id,
                        quantity_ordered: 1,
                        unit_cost_cents: Some(100),
                    },
                    PurchaseOrderLine {
                        product_id: 9_999,
                        quantity_ordered: 1,
                        unit_cost_cents: Some(100),
                    },
                ],
                user_id,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::ProductNotFound(_))
        ));

        // Wholesale rollback: no header, no items, no queue entry
        let headers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM purchase_orders")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(headers, 0);
        assert_eq!(db.sync_queue().pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_transitions_enforced() {
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
                    quantity_ordered: 1,
                    unit_cost_cents: Some(100),
                }],
                user_id,
            )
            .await
            .unwrap();

        let pos = db.purchase_orders();

        // Pending cannot jump straight to Received
        let err = pos
            .update_status(po.id, PoStatus::Received, None, None, user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::InvalidStatus { .. })));

        pos.update_status(po.id, PoStatus::Approved, None, None, user_id)
            .await
            .unwrap();
        pos.update_status(po.id, PoStatus::Delivered, None, None, user_id)
            .await
            .unwrap();

        assert_eq!(pos.list_pending_receipt().await.unwrap().len(), 1);

        pos.update_status(
            po.id,
            PoStatus::Cancelled,
            Some("supplier out of stock"),
            None,
            user_id,
        )
        .await
        .unwrap();

        let cancelled = pos.get(po.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, PoStatus::Cancelled);
        assert_eq!(
            cancelled.cancellation_reason.as_deref(),
            Some("supplier out of stock")
        );
        assert!(pos.list_pending_receipt().await.unwrap().is_empty());
    }
}
