//! # Service Error Type
//!
//! The single error type returned by every workflow and service.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Tally POS                              │
//! │                                                                         │
//! │  tally-core                tally-db                  tally-pos          │
//! │  ──────────                ────────                  ─────────          │
//! │                                                                         │
//! │  ValidationError ─────────────────────────────────► Validation          │
//! │                                                                         │
//! │                            DbError::NotFound ──────► NotFound           │
//! │                            DbError::InsufficientStock                   │
//! │                                    └───────────────► StockInsufficient  │
//! │                            DbError::* (other) ─────► Persistence        │
//! │                                                                         │
//! │  (guarded status update matched no row) ───────────► InvalidTransition  │
//! │                                                                         │
//! │                                      ErrorResponse { code, message }    │
//! │                                      ◄──── what request handlers send   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation and not-found errors are raised before any write. A
//! persistence error inside a workflow rolls back the whole transaction.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use tally_core::{CoreError, ValidationError};
use tally_db::DbError;

/// Result type for service operations.
pub type PosResult<T> = Result<T, PosError>;

#[derive(Debug, Error)]
pub enum PosError {
    /// Bad input, caught before any write.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A stock decrement would have taken a product below zero.
    #[error("Insufficient stock for product {product_id}: available {available}, requested {requested}")]
    StockInsufficient {
        product_id: String,
        available: i64,
        requested: i64,
    },

    /// A lifecycle transition the entity does not allow
    /// (receiving a purchase order twice).
    #[error("{entity} {id} cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        entity: String,
        id: String,
        from: String,
        to: String,
    },

    /// Any other data store failure.
    #[error("Persistence error: {0}")]
    Persistence(DbError),
}

impl PosError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        PosError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PosError::Validation(_) => ErrorCode::ValidationError,
            PosError::NotFound { .. } => ErrorCode::NotFound,
            PosError::StockInsufficient { .. } => ErrorCode::StockInsufficient,
            PosError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            PosError::Persistence(_) => ErrorCode::PersistenceError,
        }
    }

    /// True when running the same read again may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PosError::Persistence(err) if err.is_transient())
    }
}

impl From<DbError> for PosError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => PosError::NotFound { entity, id },
            DbError::InsufficientStock {
                product_id,
                available,
                requested,
            } => PosError::StockInsufficient {
                product_id,
                available,
                requested,
            },
            other => PosError::Persistence(other),
        }
    }
}

impl From<CoreError> for PosError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => PosError::Validation(v),
            CoreError::NotFound { entity, id } => PosError::NotFound { entity, id },
            CoreError::InsufficientStock {
                product_id,
                available,
                requested,
            } => PosError::StockInsufficient {
                product_id,
                available,
                requested,
            },
            CoreError::InvalidStatusTransition { entity, id, from, to } => {
                PosError::InvalidTransition { entity, id, from, to }
            }
        }
    }
}

// =============================================================================
// Wire Form
// =============================================================================

/// Machine-readable error codes.
///
/// ## Usage in Frontend
/// ```typescript
/// switch (e.code) {
///   case 'STOCK_INSUFFICIENT':
///     showNotification(e.message);
///     break;
///   case 'VALIDATION_ERROR':
///     showForm(e.message);
///     break;
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NotFound,
    StockInsufficient,
    InvalidTransition,
    PersistenceError,
}

/// What a request handler sends back when an operation fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ErrorResponse {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&PosError> for ErrorResponse {
    fn from(err: &PosError) -> Self {
        ErrorResponse {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl From<PosError> for ErrorResponse {
    fn from(err: PosError) -> Self {
        ErrorResponse::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_map_to_taxonomy() {
        let err: PosError = DbError::InsufficientStock {
            product_id: "p1".to_string(),
            available: 3,
            requested: 5,
        }
        .into();
        assert_eq!(err.code(), ErrorCode::StockInsufficient);

        let err: PosError = DbError::not_found("Product", "p1").into();
        assert!(matches!(err, PosError::NotFound { ref entity, .. } if entity == "Product"));

        let err: PosError = DbError::duplicate("sku", "PAN-ADV").into();
        assert_eq!(err.code(), ErrorCode::PersistenceError);
    }

    #[test]
    fn test_retryable_only_for_transient_persistence() {
        assert!(PosError::Persistence(DbError::PoolExhausted).is_retryable());
        assert!(!PosError::Persistence(DbError::duplicate("sku", "X")).is_retryable());
        assert!(!PosError::Validation(ValidationError::required("sku")).is_retryable());
    }

    #[test]
    fn test_error_response_serialization() {
        let err = PosError::InvalidTransition {
            entity: "PurchaseOrder".to_string(),
            id: "po-1".to_string(),
            from: "received".to_string(),
            to: "received".to_string(),
        };
        let json = serde_json::to_value(ErrorResponse::from(&err)).unwrap();
        assert_eq!(json["code"], "INVALID_TRANSITION");
        assert_eq!(
            json["message"],
            "PurchaseOrder po-1 cannot move from 'received' to 'received'"
        );
    }
}
