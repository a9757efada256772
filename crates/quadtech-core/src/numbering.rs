//! # Document Numbering
//!
//! Business document number formats and helpers.
//!
//! ## Formats
//! ```text
//! ┌──────────────────┬──────────────────────┬───────────────────────────┐
//! │ Document         │ Format               │ Scope                     │
//! ├──────────────────┼──────────────────────┼───────────────────────────┤
//! │ Purchase order   │ PO-YYYYMM-NNNN       │ per calendar month        │
//! │ Sales order      │ INV-YYYYMM-NNNN      │ per calendar month        │
//! │ Stock-in receipt │ SI-NNN               │ global                    │
//! │ Stock-out issue  │ STO-NNN              │ global                    │
//! └──────────────────┴──────────────────────┴───────────────────────────┘
//! ```
//!
//! Suffixes are zero-padded but keep growing past the pad width, so
//! `SI-999` is followed by `SI-1000`. The database enforces uniqueness
//! with a UNIQUE constraint; the workflows scan the current maximum
//! suffix and retry on collision.

use chrono::{DateTime, Datelike, Utc};

use crate::error::{CoreError, CoreResult};
use crate::MAX_NUMBER_ATTEMPTS;

// =============================================================================
// Document Kinds
// =============================================================================

/// The document series a number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    PurchaseOrder,
    SalesOrder,
    StockIn,
    StockOut,
}

impl DocumentKind {
    /// The literal prefix of the series.
    pub const fn prefix(self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::SalesOrder => "INV",
            DocumentKind::StockIn => "SI",
            DocumentKind::StockOut => "STO",
        }
    }

    /// Whether the series restarts each calendar month.
    pub const fn is_month_scoped(self) -> bool {
        matches!(self, DocumentKind::PurchaseOrder | DocumentKind::SalesOrder)
    }

    /// Zero-pad width of the numeric suffix.
    pub const fn pad_width(self) -> usize {
        match self {
            DocumentKind::PurchaseOrder | DocumentKind::SalesOrder => 4,
            DocumentKind::StockIn | DocumentKind::StockOut => 3,
        }
    }

    /// Human-readable series name for error messages.
    pub const fn label(self) -> &'static str {
        match self {
            DocumentKind::PurchaseOrder => "purchase order",
            DocumentKind::SalesOrder => "sales order",
            DocumentKind::StockIn => "stock-in",
            DocumentKind::StockOut => "stock-out",
        }
    }
}

// =============================================================================
// Formatting & Parsing
// =============================================================================

/// Builds the series prefix for a document date, including the trailing
/// dash, e.g. `"PO-202601-"` or `"SI-"`.
pub fn series_prefix(kind: DocumentKind, date: DateTime<Utc>) -> String {
    if kind.is_month_scoped() {
        format!("{}-{:04}{:02}-", kind.prefix(), date.year(), date.month())
    } else {
        format!("{}-", kind.prefix())
    }
}

/// Formats a document number from its series prefix and sequence value.
pub fn format_number(kind: DocumentKind, prefix: &str, seq: i64) -> String {
    format!("{prefix}{:0width$}", seq, width = kind.pad_width())
}

/// Parses the numeric suffix out of a document number.
///
/// Returns `None` for numbers from a different series or with a
/// non-numeric suffix, so callers can skip malformed rows.
pub fn parse_suffix(prefix: &str, number: &str) -> Option<i64> {
    number.strip_prefix(prefix)?.parse().ok()
}

/// The next sequence value after an optional current maximum.
#[inline]
pub fn next_sequence(current_max: Option<i64>) -> i64 {
    current_max.unwrap_or(0) + 1
}

/// The sequence value to use on retry attempt `attempt` (0-based), after
/// an insert collided with a concurrently issued number.
///
/// Returns an error once the attempt bound is exhausted.
pub fn sequence_for_attempt(kind: DocumentKind, base_seq: i64, attempt: u32) -> CoreResult<i64> {
    if attempt >= MAX_NUMBER_ATTEMPTS {
        return Err(CoreError::NumberingExhausted {
            kind: kind.label().to_string(),
            attempts: MAX_NUMBER_ATTEMPTS,
        });
    }
    Ok(base_seq + attempt as i64)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jan_2026() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_month_scoped_prefix() {
        assert_eq!(
            series_prefix(DocumentKind::PurchaseOrder, jan_2026()),
            "PO-202601-"
        );
        assert_eq!(
            series_prefix(DocumentKind::SalesOrder, jan_2026()),
            "INV-202601-"
        );
    }

    #[test]
    fn test_global_prefix() {
        assert_eq!(series_prefix(DocumentKind::StockIn, jan_2026()), "SI-");
        assert_eq!(series_prefix(DocumentKind::StockOut, jan_2026()), "STO-");
    }

    #[test]
    fn test_format_number() {
        assert_eq!(
            format_number(DocumentKind::PurchaseOrder, "PO-202601-", 1),
            "PO-202601-0001"
        );
        assert_eq!(format_number(DocumentKind::StockIn, "SI-", 42), "SI-042");
        // Suffix keeps growing past the pad width.
        assert_eq!(format_number(DocumentKind::StockIn, "SI-", 1000), "SI-1000");
        assert_eq!(
            format_number(DocumentKind::SalesOrder, "INV-202612-", 10_000),
            "INV-202612-10000"
        );
    }

    #[test]
    fn test_parse_suffix() {
        assert_eq!(parse_suffix("PO-202601-", "PO-202601-0042"), Some(42));
        assert_eq!(parse_suffix("SI-", "SI-1000"), Some(1000));
        // Wrong series or garbage suffix is skipped, not an error.
        assert_eq!(parse_suffix("PO-202601-", "INV-202601-0042"), None);
        assert_eq!(parse_suffix("PO-202601-", "PO-202601-00ab"), None);
    }

    #[test]
    fn test_next_sequence() {
        assert_eq!(next_sequence(None), 1);
        assert_eq!(next_sequence(Some(41)), 42);
    }

    #[test]
    fn test_sequence_for_attempt_bounds() {
        assert_eq!(
            sequence_for_attempt(DocumentKind::PurchaseOrder, 5, 0).unwrap(),
            5
        );
        assert_eq!(
            sequence_for_attempt(DocumentKind::PurchaseOrder, 5, 3).unwrap(),
            8
        );
        let err = sequence_for_attempt(DocumentKind::PurchaseOrder, 5, MAX_NUMBER_ATTEMPTS);
        assert!(matches!(err, Err(CoreError::NumberingExhausted { .. })));
    }

    #[test]
    fn test_roundtrip_monotonic() {
        let prefix = series_prefix(DocumentKind::SalesOrder, jan_2026());
        let a = format_number(DocumentKind::SalesOrder, &prefix, 7);
        let next = next_sequence(parse_suffix(&prefix, &a));
        let b = format_number(DocumentKind::SalesOrder, &prefix, next);
        assert_eq!(a, "INV-202601-0007");
        assert_eq!(b, "INV-202601-0008");
        assert!(b > a);
    }
}
