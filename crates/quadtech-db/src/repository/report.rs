//! # Report Repository
//!
//! Read-only aggregation queries for the reporting screens: daily sales
//! summary, inventory valuation, and purchase order history.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use quadtech_core::PoStatus;

/// One day of sales activity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SalesSummaryRow {
    /// Calendar day, `YYYY-MM-DD`.
    pub day: String,
    pub order_count: i64,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
}

/// Stock and valuation of one product.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InventoryReportRow {
    pub product_id: i64,
    pub name: String,
    pub sku: String,
    pub brand_name: Option<String>,
    pub category_name: Option<String>,
    pub quantity: i64,
    pub cost_price_cents: Option<i64>,
    pub sell_price_cents: i64,
    /// quantity x cost; zero when no cost is recorded.
    pub stock_value_cents: i64,
}

/// One purchase order in the purchasing report.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PurchaseReportRow {
    pub po_id: i64,
    pub po_number: String,
    pub supplier_name: Option<String>,
    pub order_date: DateTime<Utc>,
    pub status: PoStatus,
    pub total_cents: i64,
    pub item_count: i64,
}

/// Repository for reporting queries.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Sales grouped by calendar day over a date range.
    pub async fn sales_summary(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<Vec<SalesSummaryRow>> {
        let rows = sqlx::query_as::<_, SalesSummaryRow>(
            "SELECT
                date(order_date) AS day,
                COUNT(*) AS order_count,
                SUM(subtotal_cents) AS subtotal_cents,
                SUM(tax_cents) AS tax_cents,
                SUM(total_cents) AS total_cents
             FROM sales_orders
             WHERE order_date >= ?1 AND order_date <= ?2
             GROUP BY date(order_date)
             ORDER BY day",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Current stock and valuation, optionally filtered by category or
    /// brand. Valuation uses the last purchase cost.
    pub async fn inventory(
        &self,
        category_id: Option<i64>,
        brand_id: Option<i64>,
    ) -> DbResult<Vec<InventoryReportRow>> {
        let mut qb = sqlx::QueryBuilder::new(
            "SELECT
                p.id AS product_id,
                p.name,
                p.sku,
                b.name AS brand_name,
                c.name AS category_name,
                p.quantity,
                p.cost_price_cents,
                p.sell_price_cents,
                p.quantity * COALESCE(p.cost_price_cents, 0) AS stock_value_cents
             FROM products p
             LEFT JOIN brands b ON p.brand_id = b.id
             LEFT JOIN categories c ON p.category_id = c.id
             WHERE p.is_active = 1",
        );

        if let Some(category_id) = category_id {
            qb.push(" AND p.category_id = ").push_bind(category_id);
        }
        if let Some(brand_id) = brand_id {
            qb.push(" AND p.brand_id = ").push_bind(brand_id);
        }
        qb.push(" ORDER BY p.name");

        let rows = qb
            .build_query_as::<InventoryReportRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }

    /// Purchase orders with optional date, supplier, and status filters.
    pub async fn purchases(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        supplier_id: Option<i64>,
        status: Option<PoStatus>,
    ) -> DbResult<Vec<PurchaseReportRow>> {
        let mut qb = sqlx::QueryBuilder::new(
            "SELECT
                po.id AS po_id,
                po.po_number,
                s.name AS supplier_name,
                po.order_date,
                po.status,
                po.total_cents,
                (SELECT COUNT(*) FROM purchase_order_items WHERE po_id = po.id) AS item_count
             FROM purchase_orders po
             LEFT JOIN suppliers s ON po.supplier_id = s.id
             WHERE 1=1",
        );

        if let Some(start) = start {
            qb.push(" AND po.order_date >= ").push_bind(start);
        }
        if let Some(end) = end {
            qb.push(" AND po.order_date <= ").push_bind(end);
        }
        if let Some(supplier_id) = supplier_id {
            qb.push(" AND po.supplier_id = ").push_bind(supplier_id);
        }
        if let Some(status) = status {
            qb.push(" AND po.status = ").push_bind(status);
        }
        qb.push(" ORDER BY po.order_date DESC, po.id DESC");

        let rows = qb
            .build_query_as::<PurchaseReportRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
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
    use chrono::Duration;
    use quadtech_core::{PaymentMethod, PurchaseOrderLine, SalesOrderLine};

    #[tokio::test]
    async fn test_sales_summary_groups_by_day() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, product_id, user_id) = setup_catalog(&db).await;
        sqlx::query("UPDATE products SET quantity = 100 WHERE id = ?1")
            .bind(product_id)
            .execute(db.pool())
            .await
            .unwrap();

        let now = Utc::now();
        let line = [SalesOrderLine {
            product_id,
            quantity: 1,
            unit_price_cents: Some(10_000),
        }];

        db.sales_orders()
            .create(now, PaymentMethod::Cash, &line, user_id, None)
            .await
            .unwrap();
        db.sales_orders()
            .create(now, PaymentMethod::Cash, &line, user_id, None)
            .await
            .unwrap();

        let rows = db
            .reports()
            .sales_summary(now - Duration::days(1), now + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].order_count, 2);
        assert_eq!(rows[0].subtotal_cents, 20_000);
    }

    #[tokio::test]
    async fn test_inventory_valuation() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, product_id, _) = setup_catalog(&db).await;
        sqlx::query("UPDATE products SET quantity = 6 WHERE id = ?1")
            .bind(product_id)
            .execute(db.pool())
            .await
            .unwrap();

        let rows = db.reports().inventory(None, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        // 6 on hand at 40.00 cost
        assert_eq!(rows[0].stock_value_cents, 24_000);
    }

    #[tokio::test]
    async fn test_purchase_report_filters_by_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (supplier_id, product_id, user_id) = setup_catalog(&db).await;

        let now = Utc::now();
        db.purchase_orders()
            .create(
                supplier_id,
                now,
                now,
                None,
                &[PurchaseOrderLine {
                    product_id,
                    quantity_ordered: 2,
                    unit_cost_cents: Some(1_000),
                }],
                user_id,
            )
            .await
            .unwrap();

        let pending = db
            .reports()
            .purchases(None, None, None, Some(PoStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].item_count, 1);

        let received = db
            .reports()
            .purchases(None, None, None, Some(PoStatus::Received))
            .await
            .unwrap();
        assert!(received.is_empty());
    }
}
