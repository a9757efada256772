//! # Repositories
//!
//! One repository per entity cluster, each holding a cloned `SqlitePool`.
//!
//! CRUD repositories run single statements against the pool. The workflow
//! repositories (`purchase_order`, `stock_in`, `sales_order`, `stock_out`,
//! `payment`, `expense`) open one transaction, run their fixed statement
//! sequence, and commit at the end; any error unwinds through `?` and the
//! dropped transaction rolls the whole sequence back.

use sqlx::SqliteConnection;

use crate::error::DbResult;
use quadtech_core::numbering;

/// Scans the current maximum numeric suffix of a document series inside a
/// workflow transaction and returns the series prefix plus the next
/// sequence value to try.
///
/// The suffix is extracted with `SUBSTR` past the prefix and `CAST` to an
/// integer, so zero-padded values that outgrew their pad width still
/// compare numerically (`SI-1000` beats `SI-999`).
pub(crate) async fn next_document_seq(
    conn: &mut SqliteConnection,
    table: &str,
    column: &str,
    kind: numbering::DocumentKind,
    date: chrono::DateTime<chrono::Utc>,
) -> DbResult<(String, i64)> {
    let prefix = numbering::series_prefix(kind, date);
    let sql = format!(
        "SELECT MAX(CAST(SUBSTR({column}, {start}) AS INTEGER)) FROM {table} WHERE {column} LIKE ?1",
        start = prefix.len() + 1,
    );

    let max: Option<i64> = sqlx::query_scalar(&sql)
        .bind(format!("{prefix}%"))
        .fetch_one(&mut *conn)
        .await?;

    Ok((prefix, numbering::next_sequence(max)))
}

pub mod accounts_payable;
pub mod audit;
pub mod catalog;
pub mod customer;
pub mod expense;
pub mod ledger;
pub mod payment;
pub mod product;
pub mod purchase_order;
pub mod report;
pub mod sales_order;
pub mod stock_in;
pub mod stock_out;
pub mod supplier;
pub mod sync_queue;
pub mod user;
