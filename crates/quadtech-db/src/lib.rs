//! # quadtech-db: Database Layer for QuadTech
//!
//! Database access for the QuadTech system. SQLite for local storage with
//! sqlx for async operations.
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories and transactional workflows
//!
//! ## Usage
//!
//! ```rust,ignore
//! use quadtech_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/quadtech.db")).await?;
//!
//! // CRUD repositories
//! let products = db.products().search("frame", 20).await?;
//!
//! // Transactional workflows
//! let order = db
//!     .sales_orders()
//!     .create(Utc::now(), PaymentMethod::Cash, &lines, user_id, None)
//!     .await?;
//! ```
//!
//! Every workflow (`purchase_orders().create`, `stock_in().receive`,
//! `sales_orders().create`, `stock_out().create_standalone`,
//! `payments().create`, `expenses().create`) runs as one database
//! transaction: the statement sequence either commits wholesale or rolls
//! back wholesale when any step fails.

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::accounts_payable::AccountsPayableRepository;
pub use repository::audit::AuditLogRepository;
pub use repository::catalog::{BrandRepository, CategoryRepository, TaxRepository};
pub use repository::customer::CustomerRepository;
pub use repository::expense::ExpenseRepository;
pub use repository::ledger::{ChartOfAccountsRepository, LedgerRepository};
pub use repository::payment::PaymentRepository;
pub use repository::product::ProductRepository;
pub use repository::purchase_order::PurchaseOrderRepository;
pub use repository::report::ReportRepository;
pub use repository::sales_order::SalesOrderRepository;
pub use repository::stock_in::StockInRepository;
pub use repository::stock_out::StockOutRepository;
pub use repository::supplier::SupplierRepository;
pub use repository::sync_queue::SyncQueueRepository;
pub use repository::user::{RoleRepository, UserRepository};
