//! Domain error model.

use thiserror::Error;

use crate::id::AggregateId;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, workflow rules, stock shortfalls). Storage failures belong to the
/// infrastructure layer; the one exception is `Contention`, which the domain
/// surfaces so callers can retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested resource was not found (domain-level).
    #[error("not found")]
    NotFound,

    /// The request conflicts with existing state (duplicate SKU, product still in use).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The requested status change is not in the transition table.
    #[error("invalid transition from '{from}' to '{to}'")]
    InvalidTransition { from: String, to: String },

    /// Not enough free-to-use stock for a reservation or an outbound move.
    #[error(
        "insufficient stock for product {product}: requested {requested}, available {available} (short by {shortfall})"
    )]
    InsufficientStock {
        product: AggregateId,
        requested: u64,
        available: u64,
        shortfall: u64,
    },

    /// Not enough reserved stock to consume.
    #[error(
        "insufficient reserved stock for product {product}: requested {requested}, reserved {reserved} (short by {shortfall})"
    )]
    InsufficientReservedStock {
        product: AggregateId,
        requested: u64,
        reserved: u64,
        shortfall: u64,
    },

    /// Line edits and deletion are only allowed while a document is a draft.
    #[error("document is locked in status '{status}'")]
    DocumentLocked { status: String },

    /// Lock or version contention under concurrent load; safe to retry.
    #[error("contention: {0}")]
    Contention(String),
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

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn contention(msg: impl Into<String>) -> Self {
        Self::Contention(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn document_locked(status: impl ToString) -> Self {
        Self::DocumentLocked {
            status: status.to_string(),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Contention(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_contention_is_retryable() {
        assert!(DomainError::contention("busy").is_retryable());
        assert!(!DomainError::not_found().is_retryable());
        assert!(!DomainError::invalid_transition("done", "ready").is_retryable());
    }

    #[test]
    fn shortfall_is_part_of_the_message() {
        let err = DomainError::InsufficientStock {
            product: AggregateId::new(),
            requested: 12,
            available: 10,
            shortfall: 2,
        };
        assert!(err.to_string().contains("short by 2"));
    }
}
