//! Error types for the entity ledger.
//!
//! All errors are strongly typed using thiserror so callers can match on
//! specific conditions. Absence of an entity is not an error: lookups return
//! `Ok(None)`.

use thiserror::Error;

use crate::storage::StorageError;

/// Validation errors raised at the boundary, before an observation reaches
/// the record table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Confidence value {value} is out of range [0.0, 1.0]")]
    ConfidenceOutOfRange {
        value: f64,
    },

    #[error("Unknown entity type '{value}'")]
    UnknownEntityType {
        value: String,
    },

    #[error("Unknown relationship kind '{value}'")]
    UnknownRelationshipKind {
        value: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Field '{field}' cannot be empty")]
    EmptyField {
        field: String,
    },

    #[error("Deduplication threshold {value} is out of range [0.0, 1.0]")]
    InvalidThreshold {
        value: f64,
    },

    #[error("Retention of {days} days is invalid; must be at least one day")]
    InvalidRetention {
        days: u32,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Top-level error type for the entity ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl LedgerError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a storage error.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if retrying the same call could succeed.
    ///
    /// Nothing in the in-memory store is transient: bad input stays bad and a
    /// missing merge target or poisoned lock means the store is corrupt.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
