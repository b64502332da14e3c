//! Domain error model.

use thiserror::Error;

use crate::id::LocationId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, stock availability). Storage and locking concerns belong to
/// the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive quantity, blank parts number).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced product or stock entry does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A deduction would take a location's quantity below zero.
    #[error(
        "insufficient stock at location {location_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        location_id: LocationId,
        available: i64,
        requested: i64,
    },

    /// The operation is structurally impossible (e.g. setting a negative count).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn insufficient_stock(location_id: LocationId, available: i64, requested: i64) -> Self {
        Self::InsufficientStock {
            location_id,
            available,
            requested,
        }
    }
}
