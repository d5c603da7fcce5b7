//! # Repository Module
//!
//! Typed access to every table, one repository per aggregate.
//!
//! ## Borrowed-Connection Repositories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every repository borrows ONE SqliteConnection for its lifetime:        │
//! │                                                                         │
//! │      let mut tx = db.begin().await?;           // Transaction           │
//! │      SaleRepository::new(&mut tx)   .insert_sale(..)                    │
//! │      SaleRepository::new(&mut tx)   .insert_item(..)                    │
//! │      ProductRepository::new(&mut tx).adjust_stock(..)                   │
//! │      OutboxRepository::new(&mut tx) .enqueue(..)                        │
//! │      tx.commit().await?;                       // all or nothing        │
//! │                                                                         │
//! │      let mut conn = db.acquire().await?;       // PoolConnection        │
//! │      ProductRepository::new(&mut conn).list_low_stock()                 │
//! │                                                                         │
//! │  Transaction and PoolConnection both deref to SqliteConnection, so the  │
//! │  same repository code serves transactional and one-off access.          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Store Operations
//!
//! | Operation     | Repository methods                                     |
//! |---------------|--------------------------------------------------------|
//! | insert        | `insert*` (UUID v4 ids, timestamps set here)           |
//! | select-where  | `get_by_id`, `find_*`, `list_*`                        |
//! | update        | `update*`, `mark_*`                                    |
//! | atomic adjust | [`ProductRepository::adjust_stock`]                    |
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - catalog rows and the guarded stock adjust
//! - [`CategoryRepository`] - product categories
//! - [`SaleRepository`] - sales, sale items, analytics reads
//! - [`CustomerRepository`] - CRM rows and loyalty totals
//! - [`SupplierRepository`] / [`PurchaseOrderRepository`] - purchasing
//! - [`StockAuditRepository`] - append-only stock ledger
//! - [`ExpenseRepository`] - expenses
//! - [`ShopRepository`] / [`ProfileRepository`] - tenancy and staff
//! - [`OutboxRepository`] / [`LoyaltyLedgerRepository`] - deferred side effects
//!
//! [`ProductRepository`]: product::ProductRepository
//! [`ProductRepository::adjust_stock`]: product::ProductRepository::adjust_stock
//! [`CategoryRepository`]: category::CategoryRepository
//! [`SaleRepository`]: sale::SaleRepository
//! [`CustomerRepository`]: customer::CustomerRepository
//! [`SupplierRepository`]: supplier::SupplierRepository
//! [`PurchaseOrderRepository`]: purchase_order::PurchaseOrderRepository
//! [`StockAuditRepository`]: stock_audit::StockAuditRepository
//! [`ExpenseRepository`]: expense::ExpenseRepository
//! [`ShopRepository`]: shop::ShopRepository
//! [`ProfileRepository`]: profile::ProfileRepository
//! [`OutboxRepository`]: outbox::OutboxRepository
//! [`LoyaltyLedgerRepository`]: loyalty::LoyaltyLedgerRepository

pub mod category;
pub mod customer;
pub mod expense;
pub mod loyalty;
pub mod outbox;
pub mod product;
pub mod profile;
pub mod purchase_order;
pub mod sale;
pub mod shop;
pub mod stock_audit;
pub mod supplier;

use uuid::Uuid;

/// Generates a new primary key.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
