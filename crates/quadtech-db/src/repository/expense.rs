//! # Expense Repository
//!
//! Operating expenses. Creation is a workflow: the expense row and its
//! category-expense/cash ledger pair commit in one transaction.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::repository::ledger::post_drafts;
use crate::repository::sync_queue::enqueue_in_tx;
use quadtech_core::money::Money;
use quadtech_core::postings::expense_postings;
use quadtech_core::validation::{validate_name, validate_positive_amount};
use quadtech_core::{Expense, ExpenseCategory, NewExpense, SyncOperation};

const EXPENSE_COLUMNS: &str = "e.id, e.expense_date, e.category, e.description, e.amount_cents, \
     e.method, e.reference, e.created_by, e.created_at, e.updated_at, \
     u.full_name AS created_by_name";

const EXPENSE_JOIN: &str = "FROM expenses e LEFT JOIN users u ON e.created_by = u.id";

/// Filters for expense queries. All fields optional.
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub category: Option<ExpenseCategory>,
}

/// Repository for expense operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    // =========================================================================
    // Creation Workflow
    // =========================================================================

    /// Records an expense and posts it to the ledger in one transaction.
    pub async fn create(&self, input: &NewExpense) -> DbResult<Expense> {
        validate_name("description", &input.description)?;
        validate_positive_amount("amount", input.amount_cents)?;

        let mut tx = self.pool.begin().await?;

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO expenses
                (expense_date, category, description, amount_cents, method, reference,
                 created_by, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        )
        .bind(input.expense_date)
        .bind(input.category)
        .bind(input.description.trim())
        .bind(input.amount_cents)
        .bind(input.method)
        .bind(&input.reference)
        .bind(input.created_by)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let expense_id = result.last_insert_rowid();

        let drafts = expense_postings(
            input.category,
            input.description.trim(),
            Money::from_cents(input.amount_cents),
        );
        post_drafts(&mut tx, &drafts, "expense", expense_id, input.created_by).await?;

        enqueue_in_tx(&mut tx, "expenses", SyncOperation::Insert, expense_id, None).await?;

        tx.commit().await?;
        info!(
            expense_id = expense_id,
            category = %input.category,
            amount_cents = input.amount_cents,
            "Recorded expense"
        );

        self.get(expense_id)
            .await?
            .ok_or_else(|| DbError::not_found("Expense", expense_id))
    }

    // =========================================================================
    // Queries & Maintenance
    // =========================================================================

    /// Lists expenses matching the filter, newest first.
    pub async fn list(&self, filter: &ExpenseFilter) -> DbResult<Vec<Expense>> {
        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {EXPENSE_COLUMNS} {EXPENSE_JOIN} WHERE 1=1"
        ));

        if let Some(start) = filter.start {
            qb.push(" AND e.expense_date >= ").push_bind(start);
        }
        if let Some(end) = filter.end {
            qb.push(" AND e.expense_date <= ").push_bind(end);
        }
        if let Some(category) = filter.category {
            qb.push(" AND e.category = ").push_bind(category);
        }
        qb.push(" ORDER BY e.expense_date DESC, e.id DESC");

        let expenses = qb
            .build_query_as::<Expense>()
            .fetch_all(&self.pool)
            .await?;

        Ok(expenses)
    }

    /// Gets an expense by id.
    pub async fn get(&self, expense_id: i64) -> DbResult<Option<Expense>> {
        let sql = format!("SELECT {EXPENSE_COLUMNS} {EXPENSE_JOIN} WHERE e.id = ?1");
        let expense = sqlx::query_as::<_, Expense>(&sql)
            .bind(expense_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(expense)
    }

    /// Updates an expense's descriptive fields.
    ///
    /// Ledger entries already posted are not rewritten; corrections go
    /// through manual ledger adjustments.
    pub async fn update(&self, expense_id: i64, input: &NewExpense) -> DbResult<()> {
        validate_name("description", &input.description)?;
        validate_positive_amount("amount", input.amount_cents)?;

        let result = sqlx::query(
            "UPDATE expenses SET
                expense_date = ?2, category = ?3, description = ?4, amount_cents = ?5,
                method = ?6, reference = ?7, updated_at = ?8
             WHERE id = ?1",
        )
        .bind(expense_id)
        .bind(input.expense_date)
        .bind(input.category)
        .bind(input.description.trim())
        .bind(input.amount_cents)
        .bind(input.method)
        .bind(&input.reference)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", expense_id));
        }

        Ok(())
    }

    /// Deletes an expense.
    pub async fn delete(&self, expense_id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM expenses WHERE id = ?1")
            .bind(expense_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Expense", expense_id));
        }

        Ok(())
    }

    /// Total spent in a category, optionally within a date range.
    pub async fn total_by_category(
        &self,
        category: ExpenseCategory,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> DbResult<i64> {
        let mut qb = sqlx::QueryBuilder::new(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM expenses WHERE category = ",
        );
        qb.push_bind(category);
        if let Some(start) = start {
            qb.push(" AND expense_date >= ").push_bind(start);
        }
        if let Some(end) = end {
            qb.push(" AND expense_date <= ").push_bind(end);
        }

        let total: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(total)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::user::tests::create_test_user;
    use quadtech_core::PaymentMethod;

    fn rent_expense(created_by: i64) -> NewExpense {
        NewExpense {
            expense_date: Utc::now(),
            category: ExpenseCategory::Rent,
            description: "January shop rent".into(),
            amount_cents: 80_000,
            method: PaymentMethod::BankTransfer,
            reference: None,
            created_by,
        }
    }

    #[tokio::test]
    async fn test_create_posts_to_category_account() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = create_test_user(&db, "spender").await;

        let expense = db.expenses().create(&rent_expense(user.id)).await.unwrap();

        let entries = db.ledger().by_reference("expense", expense.id).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].account_code.as_deref(), Some("5002")); // rent
        assert_eq!(entries[0].debit_cents, 80_000);
        assert_eq!(entries[1].account_code.as_deref(), Some("1001")); // cash
        assert_eq!(entries[1].credit_cents, 80_000);
        assert!(entries[0].description.contains("January shop rent"));
    }

    #[tokio::test]
    async fn test_category_totals_and_filters() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = create_test_user(&db, "totals").await;
        let expenses = db.expenses();

        expenses.create(&rent_expense(user.id)).await.unwrap();
        expenses
            .create(&NewExpense {
                category: ExpenseCategory::Utilities,
                description: "Electricity".into(),
                amount_cents: 12_000,
                ..rent_expense(user.id)
            })
            .await
            .unwrap();

        assert_eq!(
            expenses
                .total_by_category(ExpenseCategory::Rent, None, None)
                .await
                .unwrap(),
            80_000
        );

        let utilities = expenses
            .list(&ExpenseFilter {
                category: Some(ExpenseCategory::Utilities),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(utilities.len(), 1);
        assert_eq!(utilities[0].description, "Electricity");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = create_test_user(&db, "editor").await;
        let expenses = db.expenses();

        let expense = expenses.create(&rent_expense(user.id)).await.unwrap();

        let mut updated = rent_expense(user.id);
        updated.amount_cents = 85_000;
        expenses.update(expense.id, &updated).await.unwrap();
        assert_eq!(
            expenses.get(expense.id).await.unwrap().unwrap().amount_cents,
            85_000
        );

        expenses.delete(expense.id).await.unwrap();
        assert!(expenses.get(expense.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rejects_empty_description() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = create_test_user(&db, "strict").await;

        let mut bad = rent_expense(user.id);
        bad.description = "  ".into();
        assert!(db.expenses().create(&bad).await.is_err());
    }
}
