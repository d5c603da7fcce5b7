//! # Cart Pricing
//!
//! Turns cart lines into sale totals.
//!
//! ## Calculation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal = Σ (unit_price × quantity)          exact, integer cents     │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  discount = flat amount | subtotal × percent   rounded once, half-up    │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  tax      = (subtotal − discount) × tax rate   rounded once, half-up    │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  total    = subtotal − discount + tax          exact by construction    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Line totals are exact in cents, so nothing is rounded per line. The only
//! rounding happens on the discount percentage and on the tax.
//!
//! ## Example
//! ```rust
//! use tally_core::money::{Money, Rate};
//! use tally_core::pricing::{loyalty_points, price_cart, CartLine, Discount};
//!
//! let cart = vec![CartLine::new("a", 2, Money::from_cents(1200), Money::from_cents(600))];
//! let totals = price_cart(&cart, &Discount::None, Rate::from_bps(500)).unwrap();
//! assert_eq!(totals.total.cents(), 2520);
//! assert_eq!(loyalty_points(totals.total, 1000), 2);
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, Rate};
use crate::validation::{
    validate_id, validate_line_count, validate_non_negative_cents, validate_quantity,
    validate_rate, validate_unit_cents, ValidationResult,
};

// =============================================================================
// Cart Line
// =============================================================================

/// One line of a cart as submitted by the till.
///
/// Price and cost come from the till's view of the catalog and are stored
/// as-is on the sale item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub unit_cost: Money,
}

impl CartLine {
    pub fn new(product_id: impl Into<String>, quantity: i64, unit_price: Money, unit_cost: Money) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
            unit_price,
            unit_cost,
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    #[inline]
    pub fn line_cost(&self) -> Money {
        self.unit_cost.multiply_quantity(self.quantity)
    }

    fn validate(&self) -> ValidationResult<()> {
        validate_id("product_id", &self.product_id)?;
        validate_quantity(self.quantity)?;
        validate_unit_cents("unit_price", self.unit_price.cents())?;
        validate_unit_cents("unit_cost", self.unit_cost.cents())?;
        Ok(())
    }
}

// =============================================================================
// Discount
// =============================================================================

/// A cart-level discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    /// A fixed amount off the subtotal.
    Flat(Money),
    /// A percentage of the subtotal, in basis points (1000 = 10%).
    Percent(Rate),
}

impl Discount {
    /// Resolves the discount against a subtotal.
    ///
    /// ## Errors
    /// - Negative flat amount, or flat amount above the subtotal
    /// - Percentage above 100%
    pub fn amount_for(&self, subtotal: Money) -> ValidationResult<Money> {
        match *self {
            Discount::None => Ok(Money::zero()),
            Discount::Flat(amount) => {
                validate_non_negative_cents("discount", amount.cents())?;
                if amount > subtotal {
                    return Err(ValidationError::OutOfRange {
                        field: "discount".to_string(),
                        min: 0,
                        max: subtotal.cents(),
                    });
                }
                Ok(amount)
            }
            Discount::Percent(rate) => {
                validate_rate("discount", rate)?;
                Ok(subtotal.percent(rate))
            }
        }
    }
}

// =============================================================================
// Totals
// =============================================================================

/// Computed sale totals.
///
/// `total == subtotal - discount + tax` by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

/// Prices a cart.
///
/// ## Arguments
/// * `lines` - Cart lines (validated here: non-empty, positive quantities,
///   prices within `0..=MAX_UNIT_PRICE_CENTS`)
/// * `discount` - Cart-level discount
/// * `tax_rate` - Sales tax applied to the discounted subtotal
///
/// ## Returns
/// The totals, or the first validation failure.
pub fn price_cart(lines: &[CartLine], discount: &Discount, tax_rate: Rate) -> ValidationResult<CartTotals> {
    validate_line_count("cart", lines.len())?;
    validate_rate("tax_rate", tax_rate)?;
    for line in lines {
        line.validate()?;
    }

    let subtotal = checked_subtotal(lines)?;
    let discount = discount.amount_for(subtotal)?;
    let taxable = subtotal - discount;
    let tax = taxable.percent(tax_rate);

    Ok(CartTotals {
        subtotal,
        discount,
        tax,
        total: taxable + tax,
    })
}

/// Sums line totals, rejecting a cart whose total does not fit in cents.
fn checked_subtotal(lines: &[CartLine]) -> ValidationResult<Money> {
    lines
        .iter()
        .try_fold(Money::zero(), |acc, line| {
            line.unit_price
                .checked_multiply_quantity(line.quantity)
                .and_then(|total| acc.checked_add(total))
        })
        .ok_or_else(|| ValidationError::OutOfRange {
            field: "cart".to_string(),
            min: 0,
            max: i64::MAX,
        })
}

/// Loyalty points earned for a sale: one per whole `spend_unit_cents` of the total.
#[inline]
pub fn loyalty_points(total: Money, spend_unit_cents: i64) -> i64 {
    total.whole_units(spend_unit_cents)
}

/// Sums quantities per product, in order of first appearance.
///
/// A cart may list the same product twice; stock is adjusted once per
/// product with the combined quantity.
pub fn quantities_by_product(lines: &[CartLine]) -> Vec<(String, i64)> {
    let mut totals: Vec<(String, i64)> = Vec::new();
    for line in lines {
        match totals.iter_mut().find(|(id, _)| *id == line.product_id) {
            Some((_, qty)) => *qty += line.quantity,
            None => totals.push((line.product_id.clone(), line.quantity)),
        }
    }
    totals
}

// =============================================================================
// Unit Tests
// =============================================================================
