//! # quadtech-core: Pure Business Logic for QuadTech
//!
//! This crate is the heart of QuadTech. It contains all business logic as
//! pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      QuadTech Architecture                          │
//! │                                                                     │
//! │  ┌─────────────────────────────────────────────────────────────┐   │
//! │  │              ★ quadtech-core (THIS CRATE) ★                 │   │
//! │  │                                                             │   │
//! │  │  ┌─────────┐ ┌─────────┐ ┌───────────┐ ┌─────────────────┐ │   │
//! │  │  │  types  │ │  money  │ │ numbering │ │    postings     │ │   │
//! │  │  │ Product │ │  Money  │ │ PO-/INV-  │ │ debit = credit  │ │   │
//! │  │  │ PO, AP  │ │ TaxRate │ │ SI-/STO-  │ │ account codes   │ │   │
//! │  │  └─────────┘ └─────────┘ └───────────┘ └─────────────────┘ │   │
//! │  │                                                             │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS        │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! │                                │                                    │
//! │  ┌─────────────────────────────▼───────────────────────────────┐   │
//! │  │               quadtech-db (Database Layer)                  │   │
//! │  │        SQLite queries, migrations, repositories             │   │
//! │  └─────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, PurchaseOrder, SalesOrder, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`numbering`] - Document number formats (PO-YYYYMM-NNNN, SI-NNN, ...)
//! - [`postings`] - Chart-of-account codes and balanced posting drafts
//! - [`validation`] - Business rule validation
//! - [`error`] - Domain error types

pub mod error;
pub mod money;
pub mod numbering;
pub mod postings;
pub mod types;
pub mod validation;

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, TaxRate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum attempts when resolving a document-number collision.
///
/// Number generation scans the current maximum suffix and inserts with a
/// UNIQUE constraint; on collision the suffix is advanced and the insert
/// retried up to this many times before giving up.
pub const MAX_NUMBER_ATTEMPTS: u32 = 100;

/// Maximum line items accepted on a single order document.
pub const MAX_ORDER_ITEMS: usize = 200;

/// Maximum quantity accepted on a single order line.
pub const MAX_LINE_QUANTITY: i64 = 99_999;
