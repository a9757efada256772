//! # Error Types
//!
//! Domain-specific error types for quadtech-core.
//!
//! ## Error Flow
//! ```text
//! ValidationError → CoreError → DbError (quadtech-db) → caller
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, document number, etc.)
//! 3. Errors are enum variants, never bare strings

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations or domain logic failures and
/// should be translated to user-facing messages by the caller.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Insufficient stock to complete an issue or sale.
    ///
    /// ## When This Occurs
    /// - Selling more than the available quantity
    /// - Standalone stock-out exceeding the on-hand quantity
    #[error("Insufficient stock for {name}: available {available}, requested {requested}")]
    InsufficientStock {
        name: String,
        available: i64,
        requested: i64,
    },

    /// Document not found (purchase order, sales order, stock movement).
    #[error("{entity} not found: {id}")]
    DocumentNotFound { entity: String, id: i64 },

    /// Document is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Receiving stock against a cancelled purchase order
    /// - Cancelling an already received purchase order
    #[error("{entity} {id} is {current}, cannot {operation}")]
    InvalidStatus {
        entity: String,
        id: i64,
        current: String,
        operation: String,
    },

    /// Could not produce a unique document number within the attempt bound.
    #[error("Unable to generate a unique {kind} number after {attempts} attempts")]
    NumberingExhausted { kind: String, attempts: u32 },

    /// A posting set failed the debit = credit invariant.
    #[error("Unbalanced postings: debits {debits} != credits {credits}")]
    UnbalancedPostings { debits: i64, credits: i64 },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before business logic runs, when user input does not meet field
/// requirements.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be strictly positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (bad SKU characters, malformed document number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g. duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// A document needs at least one line item.
    #[error("{document} requires at least one line item")]
    EmptyItems { document: String },
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            name: "Quad X1 Frame".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Quad X1 Frame: available 3, requested 5"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }

    #[test]
    fn test_empty_items_message() {
        let err = ValidationError::EmptyItems {
            document: "stock out".to_string(),
        };
        assert_eq!(err.to_string(), "stock out requires at least one line item");
    }
}
