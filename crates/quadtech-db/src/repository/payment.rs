//! # Supplier Payment Repository
//!
//! Payments to suppliers, applied against accounts-payable balances.
//!
//! ## Creation Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     SINGLE TRANSACTION                          │
//! │                                                                 │
//! │  1. INSERT payment row                                          │
//! │  2. If applied to an AP balance:                                │
//! │       paid = min(paid + amount, total)   (never overpay)        │
//! │       status = unpaid | partial | paid   (derived)              │
//! │  3. Post AP/cash ledger entries                                 │
//! │  4. Enqueue sync entry                                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::ledger::post_drafts;
use crate::repository::sync_queue::enqueue_in_tx;
use quadtech_core::money::Money;
use quadtech_core::postings::payment_postings;
use quadtech_core::validation::validate_positive_amount;
use quadtech_core::{ApStatus, NewSupplierPayment, SupplierPayment, SyncOperation};

const PAYMENT_COLUMNS: &str = "p.id, p.ap_id, p.payment_date, p.amount_cents, p.method, \
     p.reference, p.notes, p.created_by, p.created_at, \
     u.full_name AS created_by_name, s.name AS supplier_name";

const PAYMENT_JOINS: &str = "FROM supplier_payments p \
     LEFT JOIN users u ON p.created_by = u.id \
     LEFT JOIN accounts_payable ap ON p.ap_id = ap.id \
     LEFT JOIN suppliers s ON ap.supplier_id = s.id";

/// Filters for payment queries. All fields optional.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub ap_id: Option<i64>,
}

/// Repository for supplier payment operations.
#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    // =========================================================================
    // Creation Workflow
    // =========================================================================

    /// Records a payment, settles the linked payable, and posts to the
    /// ledger - one transaction.
    pub async fn create(&self, input: &NewSupplierPayment) -> DbResult<SupplierPayment> {
        validate_positive_amount("amount", input.amount_cents)?;

        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO supplier_payments
                (ap_id, payment_date, amount_cents, method, reference, notes, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(input.ap_id)
        .bind(input.payment_date)
        .bind(input.amount_cents)
        .bind(input.method)
        .bind(&input.reference)
        .bind(&input.notes)
        .bind(input.created_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let payment_id = result.last_insert_rowid();

        // Apply to the payable: clamp so paid never exceeds total, then
        // derive the settlement status.
        if let Some(ap_id) = input.ap_id {
            let ap: Option<(i64, i64)> = sqlx::query_as(
                "SELECT total_cents, paid_cents FROM accounts_payable WHERE id = ?1",
            )
            .bind(ap_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((total_cents, paid_cents)) = ap else {
                return Err(DbError::not_found("Accounts payable", ap_id));
            };

            let new_paid = (paid_cents + input.amount_cents).min(total_cents);
            let status = ApStatus::derive(new_paid, total_cents);

            sqlx::query(
                "UPDATE accounts_payable SET paid_cents = ?2, status = ?3, updated_at = ?4
                 WHERE id = ?1",
            )
            .bind(ap_id)
            .bind(new_paid)
            .bind(status)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let drafts = payment_postings(
            payment_id,
            Money::from_cents(input.amount_cents),
            input.ap_id.is_some(),
        );
        post_drafts(&mut tx, &drafts, "payment", payment_id, input.created_by).await?;

        enqueue_in_tx(
            &mut tx,
            "supplier_payments",
            SyncOperation::Insert,
            payment_id,
            None,
        )
        .await?;

        tx.commit().await?;
        info!(
            payment_id = payment_id,
            amount_cents = input.amount_cents,
            "Recorded supplier payment"
        );

        self.get(payment_id)
            .await?
            .ok_or_else(|| DbError::not_found("Payment", payment_id))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Lists payments matching the filter, newest first.
    pub async fn list(&self, filter: &PaymentFilter) -> DbResult<Vec<SupplierPayment>> {
        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {PAYMENT_COLUMNS} {PAYMENT_JOINS} WHERE 1=1"
        ));

        if let Some(start) = filter.start {
            qb.push(" AND p.payment_date >= ").push_bind(start);
        }
        if let Some(end) = filter.end {
            qb.push(" AND p.payment_date <= ").push_bind(end);
        }
        if let Some(ap_id) = filter.ap_id {
            qb.push(" AND p.ap_id = ").push_bind(ap_id);
        }
        qb.push(" ORDER BY p.payment_date DESC, p.id DESC");

        let payments = qb
            .build_query_as::<SupplierPayment>()
            .fetch_all(&self.pool)
            .await?;

        Ok(payments)
    }

    /// Gets a payment by id.
    pub async fn get(&self, payment_id: i64) -> DbResult<Option<SupplierPayment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} {PAYMENT_JOINS} WHERE p.id = ?1");
        let payment = sqlx::query_as::<_, SupplierPayment>(&sql)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(payment)
    }

    /// Payments applied to one payable.
    pub async fn by_ap(&self, ap_id: i64) -> DbResult<Vec<SupplierPayment>> {
        self.list(&PaymentFilter {
            ap_id: Some(ap_id),
            ..Default::default()
        })
        .await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::accounts_payable::tests::setup_payable;
    use quadtech_core::PaymentMethod;

    fn payment(ap_id: Option<i64>, amount_cents: i64, created_by: i64) -> NewSupplierPayment {
        NewSupplierPayment {
            ap_id,
            payment_date: Utc::now(),
            amount_cents,
            method: PaymentMethod::BankTransfer,
            reference: Some("TXN-1".into()),
            notes: None,
            created_by,
        }
    }

    #[tokio::test]
    async fn test_partial_then_full_settlement() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (ap_id, user_id) = setup_payable(&db).await; // 400.00 owed

        let payments = db.payments();

        payments
            .create(&payment(Some(ap_id), 15_000, user_id))
            .await
            .unwrap();
        let ap = db.accounts_payable().get(ap_id).await.unwrap().unwrap();
        assert_eq!(ap.paid_cents, 15_000);
        assert_eq!(ap.status, ApStatus::Partial);
        assert_eq!(ap.balance_cents(), 25_000);

        payments
            .create(&payment(Some(ap_id), 25_000, user_id))
            .await
            .unwrap();
        let ap = db.accounts_payable().get(ap_id).await.unwrap().unwrap();
        assert_eq!(ap.paid_cents, 40_000);
        assert_eq!(ap.status, ApStatus::Paid);

        assert_eq!(payments.by_ap(ap_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_overpayment_clamped_to_total() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (ap_id, user_id) = setup_payable(&db).await; // 400.00 owed

        db.payments()
            .create(&payment(Some(ap_id), 99_999, user_id))
            .await
            .unwrap();

        let ap = db.accounts_payable().get(ap_id).await.unwrap().unwrap();
        // paid never exceeds total
        assert_eq!(ap.paid_cents, ap.total_cents);
        assert_eq!(ap.status, ApStatus::Paid);
    }

    #[tokio::test]
    async fn test_payment_posts_balanced_ledger_pair() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (ap_id, user_id) = setup_payable(&db).await;

        let p = db
            .payments()
            .create(&payment(Some(ap_id), 10_000, user_id))
            .await
            .unwrap();

        let entries = db.ledger().by_reference("payment", p.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].account_code.as_deref(), Some("2001")); // AP debit
        assert_eq!(entries[0].debit_cents, 10_000);
        assert_eq!(entries[1].account_code.as_deref(), Some("1001")); // cash credit
        assert_eq!(entries[1].credit_cents, 10_000);
    }

    #[tokio::test]
    async fn test_unknown_ap_rolls_back_payment() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (_, user_id) = setup_payable(&db).await;

        // The foreign key refuses the insert before the AP lookup runs
        let err = db
            .payments()
            .create(&payment(Some(9_999), 1_000, user_id))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::ForeignKeyViolation { .. } | DbError::NotFound { .. }
        ));

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM supplier_payments")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let (ap_id, user_id) = setup_payable(&db).await;

        let err = db
            .payments()
            .create(&payment(Some(ap_id), 0, user_id))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(_)));
    }
}
