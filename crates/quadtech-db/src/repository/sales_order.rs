//! # Sales Order Repository
//!
//! Sales order queries plus the creation workflow - the widest
//! transaction in the system.
//!
//! ## Creation Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     SINGLE TRANSACTION                          │
//! │                                                                 │
//! │  1. Resolve each line: price default, tax rate, stock check     │
//! │  2. Generate INV-YYYYMM-NNNN (retry on collision, bounded)      │
//! │  3. INSERT header + items                                       │
//! │  4. Decrement product stock (guarded against going negative)    │
//! │  5. Create the matching stock-out (header + items, reason sale) │
//! │  6. Post cash/revenue and per-item COGS/inventory entries       │
//! │  7. Enqueue sync entry                                          │
//! └─────────────────────────────────────────────────────────────────┘
//!        │
//!        ▼
//!  COMMIT, then audit (best-effort, outside the transaction)
//!
//!  Any failure - unknown product, insufficient stock, constraint
//!  violation - unwinds the whole sequence: no header, no items, no
//!  stock movement, no postings.
//! ```

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::audit::AuditLogRepository;
use crate::repository::ledger::post_drafts;
use crate::repository::next_document_seq;
use crate::repository::purchase_order::resolve_tax_rate;
use crate::repository::stock_out::StockOutRepository;
use crate::repository::sync_queue::enqueue_in_tx;
use quadtech_core::money::{Money, TaxRate};
use quadtech_core::numbering::{self, DocumentKind};
use quadtech_core::postings::{sale_postings, SoldItemCost};
use quadtech_core::validation::validate_sales_order_lines;
use quadtech_core::{
    CoreError, PaymentMethod, SalesOrder, SalesOrderItem, SalesOrderLine, StockOutLine,
    SyncOperation,
};

const ORDER_COLUMNS: &str = "so.id, so.customer_id, so.order_number, so.order_date, \
     so.subtotal_cents, so.tax_cents, so.total_cents, so.payment_method, so.processed_by, \
     so.created_at, \
     c.name AS customer_name, c.contact_number AS customer_contact, \
     c.email AS customer_email, c.address AS customer_address, \
     u.full_name AS processed_by_name, \
     (SELECT COUNT(*) FROM sales_order_items WHERE sales_order_id = so.id) AS item_count";

const ORDER_JOINS: &str = "FROM sales_orders so \
     LEFT JOIN users u ON so.processed_by = u.id \
     LEFT JOIN customers c ON so.customer_id = c.id";

const ITEM_COLUMNS: &str = "soi.id, soi.sales_order_id, soi.product_id, soi.quantity, \
     soi.unit_price_cents, soi.tax_rate_bps, soi.tax_cents, soi.subtotal_cents, soi.total_cents, \
     p.name AS product_name, p.sku AS product_sku";

/// A priced and stock-checked line, resolved inside the transaction.
struct ResolvedLine {
    product_id: i64,
    product_name: String,
    quantity: i64,
    unit_price_cents: i64,
    tax_rate_bps: u32,
    tax_cents: i64,
    subtotal_cents: i64,
    total_cents: i64,
    cost: Option<Money>,
}

/// Repository for sales order operations.
#[derive(Debug, Clone)]
pub struct SalesOrderRepository {
    pool: SqlitePool,
}

impl SalesOrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SalesOrderRepository { pool }
    }

    // =========================================================================
    // Creation Workflow
    // =========================================================================

    /// Creates a sales order: items, inventory decrement, the matching
    /// stock-out, and ledger postings, all in one transaction.
    ///
    /// Line prices default to the product's selling price. Stock is
    /// checked per line; the first shortfall aborts the whole order.
    pub async fn create(
        &self,
        order_date: DateTime<Utc>,
        payment_method: PaymentMethod,
        lines: &[SalesOrderLine],
        processed_by: i64,
        customer_id: Option<i64>,
    ) -> DbResult<SalesOrder> {
        validate_sales_order_lines(lines)?;

        let mut tx = self.pool.begin().await?;

        // Price and stock-check every line.
        let mut resolved = Vec::with_capacity(lines.len());
        let mut subtotal = Money::zero();
        let mut tax_total = Money::zero();
        let mut grand_total = Money::zero();

        for line in lines {
            let item = resolve_sales_line(&mut tx, line).await?;
            subtotal += Money::from_cents(item.subtotal_cents);
            tax_total += Money::from_cents(item.tax_cents);
            grand_total += Money::from_cents(item.total_cents);
            resolved.push(item);
        }

        // Number and insert the header.
        let (prefix, base_seq) = next_document_seq(
            &mut tx,
            "sales_orders",
            "order_number",
            DocumentKind::SalesOrder,
            order_date,
        )
        .await?;

        let now = Utc::now();
        let mut attempt = 0u32;
        let (order_id, order_number) = loop {
            let seq = numbering::sequence_for_attempt(DocumentKind::SalesOrder, base_seq, attempt)
                .map_err(DbError::Domain)?;
            let candidate = numbering::format_number(DocumentKind::SalesOrder, &prefix, seq);

            let inserted = sqlx::query(
                "INSERT INTO sales_orders
                    (customer_id, order_number, order_date, subtotal_cents, tax_cents,
                     total_cents, payment_method, processed_by, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )
            .bind(customer_id)
            .bind(&candidate)
            .bind(order_date)
            .bind(subtotal.cents())
            .bind(tax_total.cents())
            .bind(grand_total.cents())
            .bind(payment_method)
            .bind(processed_by)
            .bind(now)
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(result) => break (result.last_insert_rowid(), candidate),
                Err(e) => {
                    let db_err = DbError::from(e);
                    if db_err.is_unique_violation_on("order_number") {
                        debug!(number = %candidate, "Order number collision, retrying");
                        attempt += 1;
                        continue;
                    }
                    return Err(db_err);
                }
            }
        };

        // Items, and the inventory decrement per item.
        for item in &resolved {
            sqlx::query(
                "INSERT INTO sales_order_items
                    (sales_order_id, product_id, quantity, unit_price_cents,
                     tax_rate_bps, tax_cents, subtotal_cents, total_cents)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.tax_rate_bps)
            .bind(item.tax_cents)
            .bind(item.subtotal_cents)
            .bind(item.total_cents)
            .execute(&mut *tx)
            .await?;

            // Guarded decrement; the pre-check above makes a miss here a
            // concurrent-write anomaly, surfaced as insufficient stock.
            let updated = sqlx::query(
                "UPDATE products SET quantity = quantity - ?2, updated_at = ?3
                 WHERE id = ?1 AND quantity >= ?2",
            )
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(DbError::Domain(CoreError::InsufficientStock {
                    name: item.product_name.clone(),
                    available: 0,
                    requested: item.quantity,
                }));
            }
        }

        // The matching issue document, in the same transaction.
        let issue_lines: Vec<StockOutLine> = resolved
            .iter()
            .map(|item| StockOutLine {
                product_id: item.product_id,
                quantity: item.quantity,
            })
            .collect();
        StockOutRepository::create_for_sale(&mut tx, order_id, &issue_lines, processed_by).await?;

        // Ledger: cash against revenue, COGS against inventory per item.
        let item_costs: Vec<SoldItemCost> = resolved
            .iter()
            .map(|item| SoldItemCost {
                product_name: item.product_name.clone(),
                cost: item.cost,
            })
            .collect();
        let drafts = sale_postings(&order_number, grand_total, &item_costs);
        post_drafts(&mut tx, &drafts, "sale", order_id, processed_by).await?;

        enqueue_in_tx(&mut tx, "sales_orders", SyncOperation::Insert, order_id, None).await?;

        tx.commit().await?;
        info!(
            order_number = %order_number,
            total_cents = grand_total.cents(),
            "Created sales order"
        );

        AuditLogRepository::new(self.pool.clone())
            .record(
                processed_by,
                "create",
                Some("sales_orders"),
                Some(order_id),
                None,
                Some(&json!({
                    "order_number": order_number,
                    "customer_id": customer_id,
                    "payment_method": payment_method,
                    "total_cents": grand_total.cents(),
                    "item_count": lines.len(),
                })),
                Some(&format!("created sales order: {order_number}")),
            )
            .await;

        self.get(order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sales order", order_id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// All sales orders with customer and cashier details, newest first.
    pub async fn list(&self) -> DbResult<Vec<SalesOrder>> {
        let sql = format!(
            "SELECT {ORDER_COLUMNS} {ORDER_JOINS} ORDER BY so.order_date DESC, so.id DESC"
        );
        let orders = sqlx::query_as::<_, SalesOrder>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(orders)
    }

    /// Gets a sales order by id.
    pub async fn get(&self, order_id: i64) -> DbResult<Option<SalesOrder>> {
        let sql = format!("SELECT {ORDER_COLUMNS} {ORDER_JOINS} WHERE so.id = ?1");
        let order = sqlx::query_as::<_, SalesOrder>(&sql)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(order)
    }

    /// Items of a sales order with product details.
    pub async fn items(&self, order_id: i64) -> DbResult<Vec<SalesOrderItem>> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS}
             FROM sales_order_items soi
             LEFT JOIN products p ON soi.product_id = p.id
             WHERE soi.sales_order_id = ?1
             ORDER BY soi.id"
        );
        let items = sqlx::query_as::<_, SalesOrderItem>(&sql)
            .bind(order_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(items)
    }
}

/// Resolves one input line: price default, tax rate, stock check, COGS
/// cost capture.
async fn resolve_sales_line(
    conn: &mut SqliteConnection,
    line: &SalesOrderLine,
) -> DbResult<ResolvedLine> {
    let product: Option<(String, i64, i64, Option<i64>, Option<i64>)> = sqlx::query_as(
        "SELECT name, quantity, sell_price_cents, cost_price_cents, tax_id
         FROM products WHERE id = ?1",
    )
    .bind(line.product_id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((name, quantity, sell_price_cents, cost_price_cents, tax_id)) = product else {
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

    let unit_price = match line.unit_price_cents {
        Some(price) if price > 0 => price,
        _ => sell_price_cents,
    };

    let tax_rate_bps = resolve_tax_rate(conn, tax_id).await?;

    let subtotal = Money::from_cents(unit_price).multiply_quantity(line.quantity);
    let tax = subtotal.calculate_tax(TaxRate::from_bps(tax_rate_bps));
    let total = subtotal + tax;

    Ok(ResolvedLine {
        product_id: line.product_id,
        product_name: name,
        quantity: line.quantity,
        unit_price_cents: unit_price,
        tax_rate_bps,
        tax_cents: tax.cents(),
        subtotal_cents: subtotal.cents(),
        total_cents: total.cents(),
        cost: cost_price_cents.map(|c| Money::from_cents(c).multiply_quantity(line.quantity)),
    })
}

// =============================================================================
// Tests
// =============================================================================
