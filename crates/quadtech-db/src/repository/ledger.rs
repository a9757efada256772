//! # Chart of Accounts & General Ledger
//!
//! The ledger is append-only: every business workflow posts balanced
//! debit/credit rows alongside its own statements, inside the same
//! transaction. Posting degrades gracefully - when the chart of accounts
//! is not provisioned the postings are skipped with a warning and the
//! business transaction still commits.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use quadtech_core::postings::{is_balanced, PostingDraft};
use quadtech_core::{AccountType, ChartOfAccount, LedgerEntry};

const ACCOUNT_COLUMNS: &str =
    "id, code, name, account_type, description, is_active, created_at";

const LEDGER_COLUMNS: &str = "gl.id, gl.entry_date, gl.account_id, gl.debit_cents, \
     gl.credit_cents, gl.description, gl.reference_type, gl.reference_id, gl.created_by, \
     gl.created_at, coa.code AS account_code, coa.name AS account_name, \
     u.full_name AS created_by_name";

const LEDGER_JOINS: &str = "FROM general_ledger gl \
     INNER JOIN chart_of_accounts coa ON gl.account_id = coa.id \
     LEFT JOIN users u ON gl.created_by = u.id";

// =============================================================================
// Chart of Accounts
// =============================================================================

/// Repository for chart-of-accounts operations.
///
/// Accounts are deactivated, never deleted - ledger history must keep
/// resolving.
#[derive(Debug, Clone)]
pub struct ChartOfAccountsRepository {
    pool: SqlitePool,
}

impl ChartOfAccountsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ChartOfAccountsRepository { pool }
    }

    /// Lists active accounts ordered by type then code.
    pub async fn list_active(&self) -> DbResult<Vec<ChartOfAccount>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM chart_of_accounts
             WHERE is_active = 1 ORDER BY account_type, code"
        );
        let accounts = sqlx::query_as::<_, ChartOfAccount>(&sql)
            .fetch_all(&self.pool)
            .await?;

        Ok(accounts)
    }

    /// Lists active accounts of one type.
    pub async fn list_by_type(&self, account_type: AccountType) -> DbResult<Vec<ChartOfAccount>> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM chart_of_accounts
             WHERE account_type = ?1 AND is_active = 1 ORDER BY code"
        );
        let accounts = sqlx::query_as::<_, ChartOfAccount>(&sql)
            .bind(account_type)
            .fetch_all(&self.pool)
            .await?;

        Ok(accounts)
    }

    /// Gets an account by id.
    pub async fn get(&self, id: i64) -> DbResult<Option<ChartOfAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM chart_of_accounts WHERE id = ?1");
        let account = sqlx::query_as::<_, ChartOfAccount>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    /// Gets an account by code (active or not).
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<ChartOfAccount>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM chart_of_accounts WHERE code = ?1");
        let account = sqlx::query_as::<_, ChartOfAccount>(&sql)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(account)
    }

    /// Creates an account.
    pub async fn create(
        &self,
        code: &str,
        name: &str,
        account_type: AccountType,
        description: Option<&str>,
    ) -> DbResult<ChartOfAccount> {
        debug!(code = %code, name = %name, "Creating account");

        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO chart_of_accounts (code, name, account_type, description, is_active, created_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        )
        .bind(code)
        .bind(name)
        .bind(account_type)
        .bind(description)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(ChartOfAccount {
            id: result.last_insert_rowid(),
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            description: description.map(str::to_string),
            is_active: true,
            created_at: now,
        })
    }

    /// Updates an account's name and description.
    pub async fn update(&self, id: i64, name: &str, description: Option<&str>) -> DbResult<()> {
        let result =
            sqlx::query("UPDATE chart_of_accounts SET name = ?2, description = ?3 WHERE id = ?1")
                .bind(id)
                .bind(name)
                .bind(description)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id));
        }

        Ok(())
    }

    /// Deactivates an account (soft delete).
    pub async fn deactivate(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("UPDATE chart_of_accounts SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Account", id));
        }

        Ok(())
    }
}

// =============================================================================
// General Ledger
// =============================================================================

/// Filters for ledger queries. All fields optional.
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub account_id: Option<i64>,
}

/// Repository for general ledger operations.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Inserts a standalone ledger entry (manual adjustment).
    #[allow(clippy::too_many_arguments)]
    pub async fn create_entry(
        &self,
        account_id: i64,
        debit_cents: i64,
        credit_cents: i64,
        description: &str,
        reference_type: Option<&str>,
        reference_id: Option<i64>,
        created_by: i64,
        entry_date: Option<DateTime<Utc>>,
    ) -> DbResult<i64> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO general_ledger
                (entry_date, account_id, debit_cents, credit_cents, description,
                 reference_type, reference_id, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        )
        .bind(entry_date.unwrap_or(now))
        .bind(account_id)
        .bind(debit_cents)
        .bind(credit_cents)
        .bind(description)
        .bind(reference_type)
        .bind(reference_id)
        .bind(created_by)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Lists ledger entries matching the filter, newest first.
    pub async fn entries(&self, filter: &LedgerFilter) -> DbResult<Vec<LedgerEntry>> {
        let mut qb = sqlx::QueryBuilder::new(format!(
            "SELECT {LEDGER_COLUMNS} {LEDGER_JOINS} WHERE 1=1"
        ));

        if let Some(start) = filter.start {
            qb.push(" AND gl.entry_date >= ").push_bind(start);
        }
        if let Some(end) = filter.end {
            qb.push(" AND gl.entry_date <= ").push_bind(end);
        }
        if let Some(account_id) = filter.account_id {
            qb.push(" AND gl.account_id = ").push_bind(account_id);
        }
        qb.push(" ORDER BY gl.entry_date DESC, gl.id DESC");

        let entries = qb
            .build_query_as::<LedgerEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Entries posted by a source document.
    pub async fn by_reference(
        &self,
        reference_type: &str,
        reference_id: i64,
    ) -> DbResult<Vec<LedgerEntry>> {
        let sql = format!(
            "SELECT {LEDGER_COLUMNS} {LEDGER_JOINS}
             WHERE gl.reference_type = ?1 AND gl.reference_id = ?2
             ORDER BY gl.id"
        );

        let entries = sqlx::query_as::<_, LedgerEntry>(&sql)
            .bind(reference_type)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Account balance in cents (debits minus credits), optionally as of a
    /// cutoff date.
    pub async fn account_balance(
        &self,
        account_id: i64,
        as_of: Option<DateTime<Utc>>,
    ) -> DbResult<i64> {
        let mut qb = sqlx::QueryBuilder::new(
            "SELECT COALESCE(SUM(debit_cents), 0) - COALESCE(SUM(credit_cents), 0)
             FROM general_ledger WHERE account_id = ",
        );
        qb.push_bind(account_id);
        if let Some(as_of) = as_of {
            qb.push(" AND entry_date <= ").push_bind(as_of);
        }

        let balance: i64 = qb.build_query_scalar().fetch_one(&self.pool).await?;

        Ok(balance)
    }
}

// =============================================================================
// Workflow Posting Helper
// =============================================================================

/// Posts a set of drafts inside a workflow transaction.
///
/// Resolves each draft's account code against the active chart of
/// accounts. When any code is missing the whole set is skipped with a
/// warning - accounting must never fail the business transaction it
/// describes.
pub(crate) async fn post_drafts(
    conn: &mut SqliteConnection,
    drafts: &[PostingDraft],
    reference_type: &str,
    reference_id: i64,
    created_by: i64,
) -> DbResult<()> {
    if drafts.is_empty() {
        return Ok(());
    }

    if !is_balanced(drafts) {
        // A builder bug, not user input: refuse to write a lopsided set.
        let debits: i64 = drafts.iter().map(|d| d.debit.cents()).sum();
        let credits: i64 = drafts.iter().map(|d| d.credit.cents()).sum();
        return Err(DbError::Domain(
            quadtech_core::CoreError::UnbalancedPostings { debits, credits },
        ));
    }

    // Resolve account codes first; bail out gracefully if any is missing.
    let mut resolved = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let account_id: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM chart_of_accounts WHERE code = ?1 AND is_active = 1",
        )
        .bind(draft.account_code)
        .fetch_optional(&mut *conn)
        .await?;

        match account_id {
            Some(id) => resolved.push((id, draft)),
            None => {
                warn!(
                    code = draft.account_code,
                    reference_type = reference_type,
                    "Chart of accounts not provisioned, skipping ledger postings"
                );
                return Ok(());
            }
        }
    }

    let now = Utc::now();
    for (account_id, draft) in resolved {
        sqlx::query(
            "INSERT INTO general_ledger
                (entry_date, account_id, debit_cents, credit_cents, description,
                 reference_type, reference_id, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?1)",
        )
        .bind(now)
        .bind(account_id)
        .bind(draft.debit.cents())
        .bind(draft.credit.cents())
        .bind(&draft.description)
        .bind(reference_type)
        .bind(reference_id)
        .bind(created_by)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
