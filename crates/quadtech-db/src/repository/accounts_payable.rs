//! # Accounts Payable Repository
//!
//! One payable balance per purchase order, created by the stock-in
//! workflow and settled by supplier payments. The `paid <= total`
//! invariant is enforced three times over: the payment workflow clamps,
//! the status is derived, and the schema CHECK backs both up.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{DbError, DbResult};
use quadtech_core::{AccountsPayable, ApStatus};

const AP_COLUMNS: &str = "ap.id, ap.po_id, ap.supplier_id, ap.total_cents, ap.paid_cents, \
     ap.status, ap.due_date, ap.created_at, ap.updated_at, \
     s.name AS supplier_name, po.po_number AS po_number";

const AP_JOINS: &str = "FROM accounts_payable ap \
     LEFT JOIN suppliers s ON ap.supplier_id = s.id \
     LEFT JOIN purchase_orders po ON ap.po_id = po.id";

/// Repository for accounts-payable operations.
#[derive(Debug, Clone)]
pub struct AccountsPayableRepository {
    pool: SqlitePool,
}

impl AccountsPayableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AccountsPayableRepository { pool }
    }

    /// Lists payables, optionally filtered by status, oldest first.
    pub async fn list(&self, status: Option<ApStatus>) -> DbResult<Vec<AccountsPayable>> {
        let mut qb = sqlx::QueryBuilder::new(format!("SELECT {AP_COLUMNS} {AP_JOINS} WHERE 1=1"));

        if let Some(status) = status {
            qb.push(" AND ap.status = ").push_bind(status);
        }
        qb.push(" ORDER BY ap.created_at ASC, ap.id ASC");

        let payables = qb
            .build_query_as::<AccountsPayable>()
            .fetch_all(&self.pool)
            .await?;

        Ok(payables)
    }

    /// Gets a payable by id.
    pub async fn get(&self, ap_id: i64) -> DbResult<Option<AccountsPayable>> {
        let sql = format!("SELECT {AP_COLUMNS} {AP_JOINS} WHERE ap.id = ?1");
        let payable = sqlx::query_as::<_, AccountsPayable>(&sql)
            .bind(ap_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payable)
    }

    /// Gets the payable for a purchase order.
    pub async fn get_by_po(&self, po_id: i64) -> DbResult<Option<AccountsPayable>> {
        let sql = format!("SELECT {AP_COLUMNS} {AP_JOINS} WHERE ap.po_id = ?1");
        let payable = sqlx::query_as::<_, AccountsPayable>(&sql)
            .bind(po_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payable)
    }

    /// Sets a payable's due date.
    pub async fn set_due_date(&self, ap_id: i64, due_date: Option<DateTime<Utc>>) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE accounts_payable SET due_date = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(ap_id)
                .bind(due_date)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Accounts payable", ap_id));
        }

        Ok(())
    }

    /// Total outstanding balance across unpaid and partial payables.
    pub async fn total_outstanding_cents(&self) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total_cents - paid_cents), 0)
             FROM accounts_payable WHERE status != 'paid'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::purchase_order::tests::setup_catalog;
    use chrono::Utc;
    use quadtech_core::{PoStatus, PurchaseOrderLine, StockInLine};

    /// Runs PO → delivered → receive, leaving one AP row; returns its id.
    pub(crate) async fn setup_payable(db: &Database) -> (i64, i64) {
        let (supplier_id, product_id, user_id) = setup_catalog(db).await;

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

        db.stock_in()
            .receive(
                po.id,
                &[StockInLine {
                    product_id,
                    quantity_received: 10,
                    quantity_rejected: 0,
                    rejection_reason: None,
                    rejection_remarks: None,
                    unit_cost_cents: 4_000,
                }],
                None,
                user_id,
            )
            .await
            .unwrap();

        let ap = db.accounts_payable().get_by_po(po.id).await.unwrap().unwrap();
        (ap.id, user_id)
    }

    #[tokio::test]
    async fn test_list_filters_by_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (ap_id, _) = setup_payable(&db).await;

        let ap_repo = db.accounts_payable();
        assert_eq!(ap_repo.list(None).await.unwrap().len(), 1);
        assert_eq!(
            ap_repo.list(Some(ApStatus::Unpaid)).await.unwrap().len(),
            1
        );
        assert!(ap_repo.list(Some(ApStatus::Paid)).await.unwrap().is_empty());

        let ap = ap_repo.get(ap_id).await.unwrap().unwrap();
        assert_eq!(ap.total_cents, 40_000);
        assert_eq!(ap.balance_cents(), 40_000);
        assert!(ap.supplier_name.is_some());
        assert!(ap.po_number.is_some());
    }

    #[tokio::test]
    async fn test_outstanding_total_and_due_date() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (ap_id, _) = setup_payable(&db).await;

        let ap_repo = db.accounts_payable();
        assert_eq!(ap_repo.total_outstanding_cents().await.unwrap(), 40_000);

        let due = Utc::now();
        ap_repo.set_due_date(ap_id, Some(due)).await.unwrap();
        assert!(ap_repo.get(ap_id).await.unwrap().unwrap().due_date.is_some());
    }

    #[tokio::test]
    async fn test_overpayment_blocked_by_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (ap_id, _) = setup_payable(&db).await;

        // Direct overwrite past the total violates the CHECK constraint
        let err = sqlx::query(
            "UPDATE accounts_payable SET paid_cents = total_cents + 1 WHERE id = ?1",
        )
        .bind(ap_id)
        .execute(db.pool())
        .await
        .map_err(DbError::from)
        .unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }
}
