//! # Error Types
//!
//! Domain-specific error types for tally-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tally-core (this file)                                                │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  tally-db                                                              │
//! │  └── DbError          - Store failures + atomic-adjust guard           │
//! │                                                                         │
//! │  tally-pos                                                             │
//! │  └── PosError         - What request handlers see                      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PosError ← DbError                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Domain errors raised by pure business logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Selling more than is on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart: PAN-ADV × 5
    ///      │
    ///      ▼
    /// stock_quantity = 3
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 left of PAN-ADV"
    /// ```
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// A status change that the lifecycle does not allow
    /// (e.g. receiving a purchase order twice).
    #[error("{entity} {id} cannot move from '{from}' to '{to}'")]
    InvalidStatusTransition {
        entity: String,
        id: String,
        from: String,
        to: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Input validation errors.
///
/// Raised before any write so a rejected request has no side effects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{field} is required")]
    Required { field: String },

    /// A collection that must not be empty is empty (e.g. the cart).
    #[error("{field} must not be empty")]
    Empty { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in the allowed set (payment method, status, ...).
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    pub fn required(field: impl Into<String>) -> Self {
        ValidationError::Required {
            field: field.into(),
        }
    }

    pub fn must_be_positive(field: impl Into<String>) -> Self {
        ValidationError::MustBePositive {
            field: field.into(),
        }
    }

    pub fn must_not_be_negative(field: impl Into<String>) -> Self {
        ValidationError::MustNotBeNegative {
            field: field.into(),
        }
    }
}

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
