//! # Validation Module
//!
//! Input validation for QuadTech. Runs before business logic; the database
//! constraints (NOT NULL, UNIQUE, CHECK, foreign keys) remain the last
//! line of defense.

use crate::error::ValidationError;
use crate::types::{PurchaseOrderLine, SalesOrderLine, StockOutLine};
use crate::{MAX_LINE_QUANTITY, MAX_ORDER_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumerics, hyphens, and underscores
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a display name (product, brand, supplier, customer, ...).
pub fn validate_name(field: &str, name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a login username.
pub fn validate_username(username: &str) -> ValidationResult<()> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError::Required {
            field: "username".to_string(),
        });
    }

    if username.len() < 3 {
        return Err(ValidationError::TooShort {
            field: "username".to_string(),
            min: 3,
        });
    }

    if username.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "username".to_string(),
            max: 50,
        });
    }

    Ok(())
}

/// Validates a new password before hashing.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }

    if password.len() < 8 {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: 8,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity (strictly positive, bounded).
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_LINE_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_LINE_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a monetary amount that must be strictly positive.
pub fn validate_positive_amount(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Document Validators
// =============================================================================

fn validate_item_count(document: &str, len: usize) -> ValidationResult<()> {
    if len == 0 {
        return Err(ValidationError::EmptyItems {
            document: document.to_string(),
        });
    }
    if len > MAX_ORDER_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: format!("{document} items"),
            min: 1,
            max: MAX_ORDER_ITEMS as i64,
        });
    }
    Ok(())
}

/// Validates purchase order input lines.
pub fn validate_purchase_order_lines(lines: &[PurchaseOrderLine]) -> ValidationResult<()> {
    validate_item_count("purchase order", lines.len())?;
    for line in lines {
        validate_quantity(line.quantity_ordered)?;
        if let Some(cost) = line.unit_cost_cents {
            if cost < 0 {
                return Err(ValidationError::MustBePositive {
                    field: "unit_cost".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Validates sales order input lines.
pub fn validate_sales_order_lines(lines: &[SalesOrderLine]) -> ValidationResult<()> {
    validate_item_count("sales order", lines.len())?;
    for line in lines {
        validate_quantity(line.quantity)?;
        if let Some(price) = line.unit_price_cents {
            if price < 0 {
                return Err(ValidationError::MustBePositive {
                    field: "unit_price".to_string(),
                });
            }
        }
    }
    Ok(())
}

/// Validates standalone stock-out input lines.
pub fn validate_stock_out_lines(lines: &[StockOutLine]) -> ValidationResult<()> {
    validate_item_count("stock out", lines.len())?;
    for line in lines {
        validate_quantity(line.quantity)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
