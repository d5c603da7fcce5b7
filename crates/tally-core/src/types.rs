//! # Domain Types
//!
//! Entity types shared by the data store and the service layer.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌──────────────┐  1   N ┌──────────────┐  N   1 ┌──────────────┐      │
//! │  │     Sale     │───────►│   SaleItem   │───────►│   Product    │      │
//! │  │ total_cents  │        │ unit_price   │        │ stock_qty≥0  │      │
//! │  │ status       │        │ unit_cost    │        │ threshold    │      │
//! │  └──────┬───────┘        └──────────────┘        └──────▲───────┘      │
//! │         │ 0..1                                          │              │
//! │  ┌──────▼───────┐                                       │              │
//! │  │   Customer   │        ┌──────────────┐  1   N ┌──────┴───────┐      │
//! │  │ total_spent  │        │PurchaseOrder │───────►│   PO Item    │      │
//! │  │ loyalty_pts  │        │ ordered →    │        │ quantity     │      │
//! │  └──────────────┘        │   received   │        └──────────────┘      │
//! │                          └──────┬───────┘                               │
//! │                                 │ receiving creates                     │
//! │                          ┌──────▼───────┐  1   N ┌──────────────┐      │
//! │                          │  StockAudit  │───────►│  Audit Item  │      │
//! │                          │  (append)    │        │ prev/new/adj │      │
//! │                          └──────────────┘        └──────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Conventions
//! - `id`: UUID v4 string generated by the application, never by the store.
//! - Money columns end in `_cents` and have a `Money` accessor.
//! - Sales, sale items and stock audits are append-only.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Shop & Staff
// =============================================================================

/// A shop (store location). Sales, stock audits and expenses are scoped to one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Shop {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    /// ISO 4217 code shown on receipts (e.g. "GHS").
    pub currency: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Staff profile: links a signed-in user to the shop they work in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Profile {
    pub id: String,
    pub full_name: Option<String>,
    pub role: String,
    pub shop_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub shop_id: Option<String>,
    pub category_id: Option<String>,

    /// Display name shown to the cashier and on the receipt.
    pub name: String,

    /// Stock Keeping Unit, unique across the catalog.
    pub sku: String,

    /// Selling price in cents.
    pub price_cents: i64,

    /// Purchase cost in cents (for COGS and inventory valuation).
    pub cost_cents: i64,

    /// On-hand quantity. Never negative; only the atomic adjust changes it.
    pub stock_quantity: i64,

    /// At or below this quantity the product shows up in low-stock alerts.
    pub low_stock_threshold: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Checks whether `quantity` can be sold from current stock.
    ///
    /// Advisory only: the authoritative check is the guarded stock update.
    #[inline]
    pub fn can_sell(&self, quantity: i64) -> bool {
        quantity > 0 && self.stock_quantity >= quantity
    }

    #[inline]
    pub fn is_low_stock(&self) -> bool {
        self.stock_quantity <= self.low_stock_threshold
    }

    /// Inventory valuation of this product at cost.
    #[inline]
    pub fn stock_value(&self) -> Money {
        self.cost().multiply_quantity(self.stock_quantity)
    }
}

/// A product joined with its category name, as listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CatalogEntry {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub product: Product,
    pub category_name: Option<String>,
}

// =============================================================================
// Customers
// =============================================================================

/// A CRM customer.
///
/// `total_spent_cents` and `loyalty_points` only ever grow, and only the
/// loyalty accrual path writes them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub shop_id: Option<String>,
    pub full_name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub total_spent_cents: i64,
    pub loyalty_points: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn total_spent(&self) -> Money {
        Money::from_cents(self.total_spent_cents)
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
///
/// A sale is written once, already completed, together with its items.
/// There is no draft, void or refund state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    #[default]
    Completed,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    /// Mobile money wallet (MTN MoMo, Telecel Cash, ...).
    MobileMoney,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 3] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::MobileMoney,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::MobileMoney => "mobile_money",
        }
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A completed sale.
///
/// `total_cents == subtotal_cents - discount_cents + tax_cents` always holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub shop_id: Option<String>,
    pub staff_id: Option<String>,
    pub customer_id: Option<String>,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Checks the sale-level reconciliation rule.
    pub fn reconciles(&self) -> bool {
        self.total_cents == self.subtotal_cents - self.discount_cents + self.tax_cents
    }
}

/// A line item in a sale.
///
/// Price and cost are snapshots taken at checkout; later catalog edits
/// never change historical sales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
    /// quantity × unit price
    pub total_price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.total_price_cents)
    }

    #[inline]
    pub fn line_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Suppliers & Purchase Orders
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Supplier {
    pub id: String,
    pub shop_id: Option<String>,
    pub name: String,
    pub contact_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Purchase order lifecycle: `ordered → received`, and `received` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    #[default]
    Ordered,
    Received,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Ordered => "ordered",
            PurchaseOrderStatus::Received => "received",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: PurchaseOrderStatus) -> bool {
        matches!(
            (self, next),
            (PurchaseOrderStatus::Ordered, PurchaseOrderStatus::Received)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    pub shop_id: Option<String>,
    pub supplier_id: Option<String>,
    pub status: PurchaseOrderStatus,
    pub total_amount_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderItem {
    pub id: String,
    pub purchase_order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub total_price_cents: i64,
}

/// A purchase order joined with its supplier name, as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderSummary {
    #[serde(flatten)]
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub order: PurchaseOrder,
    pub supplier_name: Option<String>,
}

// =============================================================================
// Stock Audit
// =============================================================================

/// Header of an append-only stock ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockAudit {
    pub id: String,
    pub shop_id: Option<String>,
    /// Set when the audit was produced by receiving a purchase order.
    pub purchase_order_id: Option<String>,
    pub note: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One product's movement within a stock audit.
///
/// `new_quantity == previous_quantity + adjustment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockAuditItem {
    pub id: String,
    pub audit_id: String,
    pub product_id: String,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub adjustment: i64,
}

// =============================================================================
// Expenses
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub shop_id: Option<String>,
    pub description: String,
    pub category: String,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub expense_date: NaiveDate,
    pub vendor: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Expense {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Outbox
// =============================================================================

/// Kind tag of a loyalty accrual outbox entry.
pub const OUTBOX_KIND_LOYALTY_ACCRUAL: &str = "loyalty_accrual";

/// A side effect recorded in the same transaction as the write that caused
/// it, applied after commit (at least once).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct OutboxEntry {
    pub id: String,
    /// What the payload describes, e.g. `"loyalty_accrual"`.
    pub kind: String,
    /// The entity that produced the entry (the sale id for loyalty).
    pub aggregate_id: String,
    /// JSON payload.
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub attempted_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
}

/// Payload of a `loyalty_accrual` outbox entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LoyaltyAccrual {
    pub sale_id: String,
    pub customer_id: String,
    /// Sale total added to the customer's total spent.
    pub amount_cents: i64,
    pub points: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
