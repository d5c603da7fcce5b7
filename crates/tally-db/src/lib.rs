//! # tally-db: Data Store for Tally POS
//!
//! SQLite access for the Tally POS system via sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Data Flow                              │
//! │                                                                         │
//! │  CheckoutService::complete_sale / ReceivingService::receive             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (repository/)  │    │  (embedded)  │  │   │
//! │  │   │               │    │                │    │              │  │   │
//! │  │   │ SqlitePool    │    │ ProductRepo    │    │ 001_initial_ │  │   │
//! │  │   │ begin()       │◄───│ SaleRepo       │    │   schema.sql │  │   │
//! │  │   │ acquire()     │    │ OutboxRepo ... │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - One repository per aggregate
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_db::{Database, DbConfig, ProductRepository, SaleRepository};
//!
//! let db = Database::new(DbConfig::new("tally.db")).await?;
//!
//! // Several repositories, one transaction
//! let mut tx = db.begin().await?;
//! let sale = SaleRepository::new(&mut tx).insert_sale(&new_sale).await?;
//! ProductRepository::new(&mut tx).adjust_stock(&product_id, -2).await?;
//! tx.commit().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::category::CategoryRepository;
pub use repository::customer::{CustomerRepository, NewCustomer};
pub use repository::expense::{ExpenseRepository, NewExpense};
pub use repository::loyalty::LoyaltyLedgerRepository;
pub use repository::outbox::OutboxRepository;
pub use repository::product::{NewProduct, ProductRepository, ProductUpdate};
pub use repository::profile::ProfileRepository;
pub use repository::purchase_order::{NewPurchaseOrderItem, PurchaseOrderRepository};
pub use repository::sale::{NewSale, NewSaleItem, SaleRepository};
pub use repository::shop::{ShopDetails, ShopRepository};
pub use repository::stock_audit::StockAuditRepository;
pub use repository::supplier::{NewSupplier, SupplierRepository};
