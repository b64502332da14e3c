//! Orchestrator error surface.
//!
//! Maps domain, store and lock failures onto the kinds callers act on:
//! `NotFound`, `InsufficientStock`, `ValidationFailed`, `Conflict`.
//! Every error is terminal; nothing here retries.

use std::time::Duration;

use thiserror::Error;

use stockledger_core::{DomainError, LocationId};

use crate::locks::LockError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error(
        "insufficient stock at location {location_id}: available {available}, requested {requested}"
    )]
    InsufficientStock {
        location_id: LocationId,
        available: i64,
        requested: i64,
    },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

pub type OperationResult<T> = Result<T, OperationError>;

impl OperationError {
    /// Whether the caller may reasonably retry the same request unchanged.
    ///
    /// Conflicts come from contention (lock timeout, stale version) rather
    /// than from the request itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OperationError::Conflict(_))
    }

    pub(crate) fn lock_timeout(waited: Duration) -> Self {
        OperationError::Conflict(format!(
            "timed out after {}ms waiting for a concurrent operation",
            waited.as_millis()
        ))
    }
}

impl From<DomainError> for OperationError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => OperationError::ValidationFailed(msg),
            DomainError::InvalidId(msg) => OperationError::ValidationFailed(msg),
            DomainError::InvariantViolation(msg) => OperationError::InvalidOperation(msg),
            DomainError::NotFound(what) => OperationError::NotFound(what),
            DomainError::InsufficientStock {
                location_id,
                available,
                requested,
            } => OperationError::InsufficientStock {
                location_id,
                available,
                requested,
            },
            DomainError::InvalidOperation(msg) => OperationError::InvalidOperation(msg),
            DomainError::Conflict(msg) => OperationError::Conflict(msg),
        }
    }
}

impl From<StoreError> for OperationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Concurrency(msg) => OperationError::Conflict(msg),
            StoreError::DuplicatePartsNumber(parts_number) => {
                OperationError::ValidationFailed(format!("parts number {parts_number} already registered"))
            }
            _ => OperationError::Store(value),
        }
    }
}

impl From<LockError> for OperationError {
    fn from(value: LockError) -> Self {
        match value {
            LockError::Timeout { waited, .. } => OperationError::lock_timeout(waited),
            LockError::Poisoned => OperationError::Store(StoreError::Poisoned),
        }
    }
}
