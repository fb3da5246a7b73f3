//! Error types for billing operations.

use crate::ids::IdError;

/// Result type for billing operations.
pub type Result<T> = std::result::Result<T, BillingError>;

/// Errors that can occur in billing operations.
///
/// The first four variants are the ones callers branch on. `Conflict` and
/// `Storage` come from the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BillingError {
    /// Bad plan/interval/coupon input, detected before any provider call.
    #[error("{0}")]
    Validation(String),

    /// The payment provider failed. `message` is safe to show to the end user.
    #[error("{message}")]
    Gateway {
        /// The gateway operation that failed.
        operation: String,
        /// User-facing message.
        message: String,
    },

    /// No billing record (or user) exists for the given owner.
    #[error("not found: {0}")]
    NotFound(String),

    /// Illegal state transition, e.g. cancelling a trial.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The record changed underneath a read-modify-write cycle.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl BillingError {
    /// Shorthand for a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Shorthand for a forbidden transition.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    /// Shorthand for a gateway error.
    pub fn gateway(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Gateway {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether this error means "no billing record for this owner".
    ///
    /// Callers use it to branch into the trial-start flow.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
