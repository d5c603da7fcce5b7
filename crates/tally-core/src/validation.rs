//! # Validation Module
//!
//! Input validation rules, run before any write so that a rejected request
//! leaves no trace in the store.
//!
//! ## Validation Layers
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Web frontend                                                  │
//! │  └── Immediate feedback (empty fields, obvious typos)                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: tally-pos services                                            │
//! │  └── THIS MODULE: business rules, fail fast, no side effects            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: SQLite                                                        │
//! │  ├── CHECK (stock_quantity >= 0)                                        │
//! │  ├── UNIQUE (sku)                                                       │
//! │  └── Foreign keys                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_sku, validate_quantity};
//!
//! assert!(validate_sku("PAN-ADV").is_ok());
//! assert!(validate_quantity(5).is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::money::Rate;
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY, MAX_UNIT_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Letters, digits, hyphens and underscores only
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
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

/// Validates a required display name (product, customer, supplier, shop...).
///
/// ## Returns
/// The trimmed name.
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<String> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(value.to_string())
}

/// Normalises an optional free-text field: blank becomes `None`.
pub fn validate_optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> ValidationResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        Some(v) => Ok(Some(v.to_string())),
    }
}

/// Validates an optional email address (very loose: `local@domain.tld`).
pub fn validate_email(value: Option<&str>) -> ValidationResult<Option<String>> {
    let Some(email) = validate_optional_text("email", value, 254)? else {
        return Ok(None);
    };

    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };

    if !well_formed || email.contains(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@example.com".to_string(),
        });
    }

    Ok(Some(email))
}

/// Validates an ISO 4217 currency code and returns it upper-cased.
pub fn validate_currency(code: &str) -> ValidationResult<String> {
    let code = code.trim().to_ascii_uppercase();

    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidFormat {
            field: "currency".to_string(),
            reason: "must be a three-letter ISO 4217 code".to_string(),
        });
    }

    Ok(code)
}

/// Validates a search query. Empty is allowed (matches everything).
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a cart or purchase-order line quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed `MAX_ITEM_QUANTITY`
///
/// ## User Workflow
/// ```text
/// Cashier types quantity: 5
///      │
///      ▼
/// validate_quantity(5) ← THIS FUNCTION
///      │
///      ├── qty <= 0?     → "quantity must be positive"
///      ├── qty > 9999?   → "quantity must be between 1 and 9999"
///      └── OK            → line accepted
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::must_be_positive("quantity"));
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a non-negative amount in cents (prices and costs; zero is a free item).
pub fn validate_non_negative_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::must_not_be_negative(field));
    }

    Ok(())
}

/// Validates a unit price or cost: non-negative and at most `MAX_UNIT_PRICE_CENTS`.
pub fn validate_unit_cents(field: &str, cents: i64) -> ValidationResult<()> {
    validate_non_negative_cents(field, cents)?;

    if cents > MAX_UNIT_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_UNIT_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a strictly positive amount in cents (expenses).
pub fn validate_positive_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents <= 0 {
        return Err(ValidationError::must_be_positive(field));
    }

    Ok(())
}

/// Validates a stock count or threshold (>= 0).
pub fn validate_stock_level(field: &str, qty: i64) -> ValidationResult<()> {
    if qty < 0 {
        return Err(ValidationError::must_not_be_negative(field));
    }

    Ok(())
}

/// Validates a rate in basis points (0% to 100%).
pub fn validate_rate(field: &str, rate: Rate) -> ValidationResult<()> {
    if rate.bps() > Rate::FULL_BPS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: Rate::FULL_BPS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the number of lines in a cart or purchase order.
///
/// ## Rules
/// - At least one line
/// - At most `MAX_CART_ITEMS`
pub fn validate_line_count(field: &str, lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Empty {
            field: field.to_string(),
        });
    }

    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

/// Validates a required identifier reference (non-blank).
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::required(field));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
