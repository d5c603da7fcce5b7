//! # tally-core: Pure Business Logic for Tally POS
//!
//! Everything in this crate is deterministic and free of I/O. The data store
//! (`tally-db`) and the workflows (`tally-pos`) build on these types.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Request Handlers (web frontend)                 │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          tally-pos: checkout, receiving, services               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌──────────┐ ┌───────────┐           │   │
//! │  │   │  types  │ │  money  │ │ pricing  │ │ analytics │           │   │
//! │  │   │ Product │ │  Money  │ │ CartLine │ │  Summary  │           │   │
//! │  │   │  Sale   │ │  Rate   │ │ Discount │ │  Heatmap  │           │   │
//! │  │   └─────────┘ └─────────┘ └──────────┘ └───────────┘           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 tally-db (SQLite data store)                    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Entity types (Product, Sale, PurchaseOrder, StockAudit, ...)
//! - [`money`] - Integer-cent `Money` and basis-point `Rate`
//! - [`pricing`] - Cart totals: subtotal, discount, tax, total, loyalty points
//! - [`analytics`] - Sales summary and advanced analytics aggregation
//! - [`context`] - Request-scoped attribution (staff, shop)
//! - [`validation`] - Input validation rules
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::money::{Money, Rate};
//! use tally_core::pricing::{price_cart, CartLine, Discount};
//!
//! let lines = vec![CartLine::new("product-a", 2, Money::from_cents(1200), Money::from_cents(600))];
//! let totals = price_cart(&lines, &Discount::None, Rate::from_bps(500)).unwrap();
//!
//! assert_eq!(totals.subtotal.cents(), 2400);
//! assert_eq!(totals.tax.cents(), 120);
//! assert_eq!(totals.total.cents(), 2520);
//! ```

pub mod analytics;
pub mod context;
pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

pub use context::RequestContext;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use types::*;

/// Maximum distinct lines allowed in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity for a single cart or purchase-order line.
///
/// Catches fat-finger entries (1000 instead of 10) before any write.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;

/// Maximum unit price or cost for a line, in cents (10,000,000.00).
///
/// With `MAX_ITEM_QUANTITY` and `MAX_CART_ITEMS` this keeps every cart
/// total well inside `i64`.
pub const MAX_UNIT_PRICE_CENTS: i64 = 1_000_000_000;

/// Default sales tax applied at checkout, in basis points (5%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 500;

/// Spend (in cents) that earns one loyalty point: one point per 10.00.
pub const LOYALTY_SPEND_UNIT_CENTS: i64 = 1_000;
