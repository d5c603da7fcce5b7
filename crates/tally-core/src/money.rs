//! # Money Module
//!
//! Fixed-point monetary values and basis-point rates.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Cart in floating point:                                                │
//! │    12.10 × 3 = 36.30000000000001          ❌ drifts                     │
//! │    (36.30 − 0) × 0.05 = 1.8150000000000002                              │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    1210 × 3 = 3630 cents                                                │
//! │    3630 × 500 bps = 181.5 → 182 cents (rounded once, half-up)           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Amounts are stored in minor units of the shop's currency (pesewas for GHS,
//! cents for USD). The code calls them "cents" throughout.
//!
//! ## Usage
//! ```rust
//! use tally_core::money::{Money, Rate};
//!
//! let price = Money::from_cents(1200);        // 12.00
//! let line = price * 2;                       // 24.00
//! let tax = line.percent(Rate::from_bps(500)); // 5% → 1.20
//! assert_eq!(tax.cents(), 120);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Where Money Flows
/// ```text
/// Product.price_cents ──► CartLine.unit_price ──► line total (qty × price)
///                                                       │
///                          Σ lines ──► subtotal ──► discount ──► tax ──► total
///                                                                          │
///                          Customer.total_spent ◄── loyalty accrual ◄──────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let price = Money::from_cents(2520); // 25.20
    /// assert_eq!(price.cents(), 2520);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit carries the sign:
    /// `from_major_minor(-5, 50)` is -5.50.
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Parses a decimal string such as `"12"`, `"12.5"` or `"18.50"`.
    ///
    /// At most two fractional digits are accepted; anything else is rejected
    /// rather than silently rounded. Used by bulk import, where prices arrive
    /// as text.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("18.50").unwrap().cents(), 1850);
    /// assert_eq!(Money::parse_decimal("12.5").unwrap().cents(), 1250);
    /// assert!(Money::parse_decimal("1.999").is_err());
    /// ```
    pub fn parse_decimal(input: &str) -> Result<Self, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::required("amount"));
        }

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (major_str, minor_str) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };

        if major_str.is_empty() && minor_str.is_empty() {
            return Err(invalid("no digits"));
        }
        if !major_str.chars().all(|c| c.is_ascii_digit())
            || !minor_str.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("expected a decimal number"));
        }
        if minor_str.len() > 2 {
            return Err(invalid("at most two decimal places"));
        }

        let major: i64 = if major_str.is_empty() {
            0
        } else {
            major_str.parse().map_err(|_| invalid("amount too large"))?
        };
        let minor: i64 = match minor_str.len() {
            0 => 0,
            1 => minor_str.parse::<i64>().map_err(|_| invalid("bad fraction"))? * 10,
            _ => minor_str.parse().map_err(|_| invalid("bad fraction"))?,
        };

        let cents = major
            .checked_mul(100)
            .and_then(|c| c.checked_add(minor))
            .ok_or_else(|| invalid("amount too large"))?;

        Ok(Money(if negative { -cents } else { cents }))
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity (line total = quantity × unit price).
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Like `multiply_quantity`, but `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Applies a rate and rounds half-up to the nearest cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount × bps + 5000) / 10000`, in i128 so large
    /// amounts cannot overflow. Used for both tax and percentage discounts.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::{Money, Rate};
    ///
    /// // 36.30 at 5% = 1.815 → 1.82
    /// assert_eq!(Money::from_cents(3630).percent(Rate::from_bps(500)).cents(), 182);
    /// ```
    pub fn percent(&self, rate: Rate) -> Money {
        let raw = self.0 as i128 * rate.bps() as i128;
        let rounded = if raw >= 0 {
            (raw + 5000) / 10000
        } else {
            (raw - 5000) / 10000
        };
        Money(rounded as i64)
    }

    /// Number of whole `unit`s contained in this amount (floor, never negative).
    ///
    /// Loyalty points are `total.whole_units(1000)`: one point per 10.00.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(2520).whole_units(1000), 2);
    /// assert_eq!(Money::from_cents(999).whole_units(1000), 0);
    /// ```
    pub fn whole_units(&self, unit: i64) -> i64 {
        if unit <= 0 || self.0 <= 0 {
            return 0;
        }
        self.0 / unit
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering without a currency symbol; the currency is a
/// per-shop setting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + *m)
    }
}

// =============================================================================
// Rate
// =============================================================================

/// A rate in basis points (1 bps = 0.01%).
///
/// Used for the checkout tax rate (500 = 5%) and percentage discounts
/// (1000 = 10% off).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Rate(u32);

impl Rate {
    /// 100% in basis points.
    pub const FULL_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Rate(bps)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Rate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// For display only.
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents_parts() {
        let money = Money::from_cents(1850);
        assert_eq!(money.major(), 18);
        assert_eq!(money.minor(), 50);
        assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(2520).to_string(), "25.20");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_percent_rounds_half_up_once() {
        // 24.00 at 5% = 1.20 exactly
        assert_eq!(Money::from_cents(2400).percent(Rate::from_bps(500)).cents(), 120);
        // 0.10 at 5% = 0.005 → 0.01
        assert_eq!(Money::from_cents(10).percent(Rate::from_bps(500)).cents(), 1);
        // 0.09 at 5% = 0.0045 → 0.00
        assert_eq!(Money::from_cents(9).percent(Rate::from_bps(500)).cents(), 0);
        // negative amounts round away from zero symmetrically
        assert_eq!(Money::from_cents(-10).percent(Rate::from_bps(500)).cents(), -1);
    }

    #[test]
    fn test_whole_units_floor() {
        assert_eq!(Money::from_cents(2520).whole_units(1000), 2);
        assert_eq!(Money::from_cents(1000).whole_units(1000), 1);
        assert_eq!(Money::from_cents(-5000).whole_units(1000), 0);
        assert_eq!(Money::from_cents(5000).whole_units(0), 0);
    }

    #[test]
    fn test_sum() {
        let lines = vec![Money::from_cents(1200), Money::from_cents(3500)];
        let total: Money = lines.iter().sum();
        assert_eq!(total.cents(), 4700);
        let owned: Money = lines.into_iter().sum();
        assert_eq!(owned.cents(), 4700);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(Money::parse_decimal("12").unwrap().cents(), 1200);
        assert_eq!(Money::parse_decimal(" 12.00 ").unwrap().cents(), 1200);
        assert_eq!(Money::parse_decimal("0.5").unwrap().cents(), 50);
        assert_eq!(Money::parse_decimal(".75").unwrap().cents(), 75);
        assert_eq!(Money::parse_decimal("-3.10").unwrap().cents(), -310);
    }

    #[test]
    fn test_parse_decimal_rejects_garbage() {
        assert!(matches!(
            Money::parse_decimal(""),
            Err(ValidationError::Required { .. })
        ));
        assert!(Money::parse_decimal("abc").is_err());
        assert!(Money::parse_decimal("1.234").is_err());
        assert!(Money::parse_decimal("1,50").is_err());
        assert!(Money::parse_decimal(".").is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        let price = Money::from_cents(1200);
        assert_eq!(price.checked_multiply_quantity(3), Some(Money::from_cents(3600)));
        assert_eq!(price.checked_add(Money::from_cents(50)), Some(Money::from_cents(1250)));

        let huge = Money::from_cents(i64::MAX / 2 + 1);
        assert_eq!(huge.checked_multiply_quantity(2), None);
        assert_eq!(huge.checked_add(huge), None);
    }

    #[test]
    fn test_rate() {
        let rate = Rate::from_bps(500);
        assert_eq!(rate.bps(), 500);
        assert!((rate.percentage() - 5.0).abs() < f64::EPSILON);
        assert!(Rate::zero().is_zero());
    }
}
