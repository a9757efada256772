//! # Domain Types
//!
//! Core domain types used throughout QuadTech. Each struct mirrors one row
//! of the relational schema; optional `*_name` fields carry joined display
//! columns and default to `None` when a query does not join them.
//!
//! ## Identity
//! Every entity has an `INTEGER PRIMARY KEY AUTOINCREMENT` id plus, for
//! documents, a human-readable business number (`PO-202601-0001`,
//! `INV-202601-0001`, `SI-001`, `STO-001`) generated by the workflows.
//!
//! Monetary columns are integer cents; tax rates are basis points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, TaxRate};

// =============================================================================
// Status Enumerations
// =============================================================================

/// Lifecycle of a purchase order.
///
/// `Pending → Approved → Delivered → Received` is the normal path;
/// `Cancelled` is reachable from any state before `Received`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PoStatus {
    /// Created, awaiting approval.
    Pending,
    /// Approved, awaiting delivery.
    Approved,
    /// Goods delivered, awaiting stock-in.
    Delivered,
    /// Stock-in recorded; terminal.
    Received,
    /// Cancelled; terminal.
    Cancelled,
}

impl PoStatus {
    /// Whether a status transition is allowed.
    pub fn can_transition_to(self, next: PoStatus) -> bool {
        use PoStatus::*;
        match (self, next) {
            (Pending, Approved) | (Approved, Delivered) | (Delivered, Received) => true,
            (Pending, Cancelled) | (Approved, Cancelled) | (Delivered, Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PoStatus::Pending => "pending",
            PoStatus::Approved => "approved",
            PoStatus::Delivered => "delivered",
            PoStatus::Received => "received",
            PoStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Settlement state of an accounts-payable balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ApStatus {
    Unpaid,
    Partial,
    Paid,
}

impl ApStatus {
    /// Derives the status from paid vs total amounts.
    pub fn derive(paid_cents: i64, total_cents: i64) -> ApStatus {
        if paid_cents >= total_cents {
            ApStatus::Paid
        } else if paid_cents > 0 {
            ApStatus::Partial
        } else {
            ApStatus::Unpaid
        }
    }
}

/// Reason an inventory issue was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum StockOutReason {
    /// Issued against a sales order.
    Sale,
    Damaged,
    Missing,
    Disposal,
    Other,
}

impl StockOutReason {
    /// Write-off reasons post a shrinkage expense to the ledger.
    pub fn is_write_off(self) -> bool {
        matches!(
            self,
            StockOutReason::Damaged | StockOutReason::Missing | StockOutReason::Disposal
        )
    }
}

impl std::fmt::Display for StockOutReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StockOutReason::Sale => "sale",
            StockOutReason::Damaged => "damaged",
            StockOutReason::Missing => "missing",
            StockOutReason::Disposal => "disposal",
            StockOutReason::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Tender type for sales, supplier payments, and expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Cheque,
}

/// Expense bucket; each maps to a chart-of-accounts code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Rent,
    Utilities,
    Salaries,
    Supplies,
    Marketing,
    Other,
}

impl std::fmt::Display for ExpenseCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExpenseCategory::Rent => "rent",
            ExpenseCategory::Utilities => "utilities",
            ExpenseCategory::Salaries => "salaries",
            ExpenseCategory::Supplies => "supplies",
            ExpenseCategory::Marketing => "marketing",
            ExpenseCategory::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Classification of a chart-of-accounts entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// State of a sync-queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SyncQueueStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

/// Operation recorded in the sync queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    Insert,
    Update,
    Delete,
}

// =============================================================================
// Catalog
// =============================================================================

/// A product brand.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Brand {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A named tax rate products can reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Tax {
    pub id: i64,
    pub name: String,
    /// Rate in basis points (825 = 8.25%).
    pub rate_bps: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Tax {
    #[inline]
    pub fn rate(&self) -> TaxRate {
        TaxRate::from_bps(self.rate_bps)
    }
}

/// A stocked product.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub brand_id: Option<i64>,
    pub category_id: Option<i64>,
    pub tax_id: Option<i64>,
    pub name: String,
    /// Stock Keeping Unit - business identifier, unique.
    pub sku: String,
    pub model_number: Option<String>,
    /// Last purchase cost in cents; None until first stock-in.
    pub cost_price_cents: Option<i64>,
    /// Selling price in cents.
    pub sell_price_cents: i64,
    /// Current on-hand quantity.
    pub quantity: i64,
    /// Soft-delete flag.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    // Joined display columns (populated by list queries only).
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub brand_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub category_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub tax_name: Option<String>,
}

/// Input for creating or updating a product.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub brand_id: Option<i64>,
    pub category_id: Option<i64>,
    pub tax_id: Option<i64>,
    pub name: String,
    pub sku: String,
    pub model_number: Option<String>,
    pub cost_price_cents: Option<i64>,
    pub sell_price_cents: i64,
    /// Opening stock quantity.
    pub quantity: i64,
}

impl Product {
    /// Selling price as Money.
    #[inline]
    pub fn sell_price(&self) -> Money {
        Money::from_cents(self.sell_price_cents)
    }

    /// Last purchase cost as Money, if known.
    #[inline]
    pub fn cost_price(&self) -> Option<Money> {
        self.cost_price_cents.map(Money::from_cents)
    }

    /// Whether the requested quantity can be issued from stock.
    #[inline]
    pub fn can_issue(&self, requested: i64) -> bool {
        self.quantity >= requested
    }
}

// =============================================================================
// Partners
// =============================================================================

/// A supplier goods are purchased from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Supplier {
    pub id: i64,
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating a supplier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact_person: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// A customer sales orders can be attributed to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: i64,
    pub name: String,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating or updating a customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub contact_number: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

// =============================================================================
// Users & Roles
// =============================================================================

/// An access role.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An application user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub role_id: i64,
    pub username: String,
    pub email: Option<String>,
    /// Argon2 PHC-format hash; never the plaintext.
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub role_name: Option<String>,
}

/// Input for creating a user. The plaintext password is hashed by the
/// repository and never stored.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub role_id: i64,
    pub username: String,
    pub email: Option<String>,
    pub full_name: String,
    pub password: String,
}

// =============================================================================
// Purchase Orders
// =============================================================================

/// A purchase order header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrder {
    pub id: i64,
    pub supplier_id: i64,
    /// Business number, `PO-YYYYMM-NNNN`, unique.
    pub po_number: String,
    pub order_date: DateTime<Utc>,
    pub expected_date: DateTime<Utc>,
    pub status: PoStatus,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub notes: Option<String>,
    pub cancellation_reason: Option<String>,
    pub cancellation_remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub supplier_name: Option<String>,
}

/// A purchase order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PurchaseOrderItem {
    pub id: i64,
    pub po_id: i64,
    pub product_id: i64,
    pub quantity_ordered: i64,
    pub unit_cost_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_cents: i64,
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub product_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub product_sku: Option<String>,
}

/// Input line for creating a purchase order.
///
/// Cost defaults to the product's last cost when not given; tax comes from
/// the product's tax link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub product_id: i64,
    pub quantity_ordered: i64,
    pub unit_cost_cents: Option<i64>,
}

// =============================================================================
// Stock In (receipts)
// =============================================================================

/// A goods receipt against a purchase order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockIn {
    pub id: i64,
    pub po_id: i64,
    pub supplier_id: i64,
    /// Business number, `SI-NNN`, unique.
    pub receipt_number: String,
    pub received_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub processed_by: i64,
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub supplier_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub po_number: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub processed_by_name: Option<String>,
}

/// A received line, with optional rejected quantity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockInItem {
    pub id: i64,
    pub stock_in_id: i64,
    pub product_id: i64,
    pub quantity_received: i64,
    pub quantity_rejected: i64,
    pub rejection_reason: Option<String>,
    pub rejection_remarks: Option<String>,
    pub unit_cost_cents: i64,
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub product_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub product_sku: Option<String>,
}

/// Input line for receiving stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockInLine {
    pub product_id: i64,
    pub quantity_received: i64,
    pub quantity_rejected: i64,
    pub rejection_reason: Option<String>,
    pub rejection_remarks: Option<String>,
    pub unit_cost_cents: i64,
}

impl StockInLine {
    /// Lines where nothing was received nor rejected carry no information.
    pub fn is_empty(&self) -> bool {
        self.quantity_received == 0 && self.quantity_rejected == 0
    }
}

// =============================================================================
// Sales Orders
// =============================================================================

/// A sales order (invoice) header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesOrder {
    pub id: i64,
    pub customer_id: Option<i64>,
    /// Business number, `INV-YYYYMM-NNNN`, unique.
    pub order_number: String,
    pub order_date: DateTime<Utc>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub processed_by: i64,
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub customer_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub customer_contact: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub customer_email: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub customer_address: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub processed_by_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub item_count: Option<i64>,
}

/// A sales order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SalesOrderItem {
    pub id: i64,
    pub sales_order_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub tax_rate_bps: u32,
    pub tax_cents: i64,
    pub subtotal_cents: i64,
    pub total_cents: i64,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub product_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub product_sku: Option<String>,
}

/// Input line for creating a sales order.
///
/// Price defaults to the product's selling price when not given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price_cents: Option<i64>,
}

// =============================================================================
// Stock Out (issues)
// =============================================================================

/// An inventory issue, either tied to a sale or standalone.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockOut {
    pub id: i64,
    pub sales_order_id: Option<i64>,
    /// Business number, `STO-NNN`, unique.
    pub issue_number: String,
    pub issued_at: DateTime<Utc>,
    pub reason: StockOutReason,
    pub processed_by: i64,
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub processed_by_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub sales_order_number: Option<String>,
}

/// An issued line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockOutItem {
    pub id: i64,
    pub stock_out_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub reason: StockOutReason,
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub product_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub product_sku: Option<String>,
}

/// Input line for a standalone stock-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockOutLine {
    pub product_id: i64,
    pub quantity: i64,
}

// =============================================================================
// Accounts Payable & Payments
// =============================================================================

/// Money owed to a supplier for one purchase order.
///
/// Invariant: `paid_cents <= total_cents` — the payment workflow clamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AccountsPayable {
    pub id: i64,
    pub po_id: i64,
    pub supplier_id: i64,
    pub total_cents: i64,
    pub paid_cents: i64,
    pub status: ApStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub supplier_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub po_number: Option<String>,
}

impl AccountsPayable {
    /// Remaining balance in cents.
    #[inline]
    pub fn balance_cents(&self) -> i64 {
        self.total_cents - self.paid_cents
    }
}

/// A payment made to a supplier, optionally applied to an AP balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SupplierPayment {
    pub id: i64,
    pub ap_id: Option<i64>,
    pub payment_date: DateTime<Utc>,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub created_by_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub supplier_name: Option<String>,
}

/// Input for recording a supplier payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupplierPayment {
    pub ap_id: Option<i64>,
    pub payment_date: DateTime<Utc>,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub notes: Option<String>,
    pub created_by: i64,
}

// =============================================================================
// Expenses
// =============================================================================

/// An operating expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Expense {
    pub id: i64,
    pub expense_date: DateTime<Utc>,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub created_by_name: Option<String>,
}

/// Input for recording an expense.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub expense_date: DateTime<Utc>,
    pub category: ExpenseCategory,
    pub description: String,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub created_by: i64,
}

// =============================================================================
// Accounting
// =============================================================================

/// One chart-of-accounts entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ChartOfAccount {
    pub id: i64,
    /// Stable code, e.g. "1001" for Cash.
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub description: Option<String>,
    /// Accounts are deactivated, never deleted.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One debit/credit row in the general ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct LedgerEntry {
    pub id: i64,
    pub entry_date: DateTime<Utc>,
    pub account_id: i64,
    pub debit_cents: i64,
    pub credit_cents: i64,
    pub description: String,
    /// Source document type: "sale", "purchase", "payment", "expense", ...
    pub reference_type: Option<String>,
    pub reference_id: Option<i64>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub account_code: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub account_name: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub created_by_name: Option<String>,
}

// =============================================================================
// Audit Log
// =============================================================================

/// A recorded audit action.
///
/// `old_values`/`new_values` are JSON snapshots of the touched record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditLogEntry {
    pub id: i64,
    pub user_id: i64,
    /// "create", "update", "delete", "login", "login_failed", ...
    pub action: String,
    pub table_name: Option<String>,
    pub record_id: Option<i64>,
    pub old_values: Option<String>,
    pub new_values: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,

    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub username: Option<String>,
    #[cfg_attr(feature = "sqlx", sqlx(default))]
    pub full_name: Option<String>,
}

// =============================================================================
// Sync Queue
// =============================================================================

/// A staged change awaiting replication to the remote database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SyncQueueItem {
    pub id: i64,
    pub table_name: String,
    pub operation: SyncOperation,
    pub record_id: i64,
    /// Optional JSON snapshot of the record at enqueue time.
    pub payload: Option<String>,
    pub status: SyncQueueStatus,
    pub error_message: Option<String>,
    pub retry_count: i64,
    pub created_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub synced_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_po_status_transitions() {
        assert!(PoStatus::Pending.can_transition_to(PoStatus::Approved));
        assert!(PoStatus::Delivered.can_transition_to(PoStatus::Received));
        assert!(PoStatus::Pending.can_transition_to(PoStatus::Cancelled));
        assert!(!PoStatus::Received.can_transition_to(PoStatus::Cancelled));
        assert!(!PoStatus::Cancelled.can_transition_to(PoStatus::Approved));
        assert!(!PoStatus::Pending.can_transition_to(PoStatus::Received));
    }

    #[test]
    fn test_ap_status_derivation() {
        assert_eq!(ApStatus::derive(0, 1000), ApStatus::Unpaid);
        assert_eq!(ApStatus::derive(400, 1000), ApStatus::Partial);
        assert_eq!(ApStatus::derive(1000, 1000), ApStatus::Paid);
        assert_eq!(ApStatus::derive(1200, 1000), ApStatus::Paid);
    }

    #[test]
    fn test_write_off_reasons() {
        assert!(StockOutReason::Damaged.is_write_off());
        assert!(StockOutReason::Missing.is_write_off());
        assert!(StockOutReason::Disposal.is_write_off());
        assert!(!StockOutReason::Sale.is_write_off());
        assert!(!StockOutReason::Other.is_write_off());
    }

    #[test]
    fn test_ap_balance() {
        let ap = AccountsPayable {
            id: 1,
            po_id: 1,
            supplier_id: 1,
            total_cents: 10_000,
            paid_cents: 2_500,
            status: ApStatus::Partial,
            due_date: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            supplier_name: None,
            po_number: None,
        };
        assert_eq!(ap.balance_cents(), 7_500);
    }

    #[test]
    fn test_stock_in_line_empty() {
        let line = StockInLine {
            product_id: 1,
            quantity_received: 0,
            quantity_rejected: 0,
            rejection_reason: None,
            rejection_remarks: None,
            unit_cost_cents: 100,
        };
        assert!(line.is_empty());
    }
}
