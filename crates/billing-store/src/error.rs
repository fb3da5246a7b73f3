//! Error types for billing storage.

use billing_core::BillingError;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up.
        entity: &'static str,
        /// The key that was looked up.
        id: String,
    },

    /// A billing record already exists for this owner.
    #[error("billing record already exists for owner {owner_id}")]
    AlreadyExists {
        /// The owner that already has a record.
        owner_id: String,
    },

    /// The stored version differs from the one the caller read.
    #[error("version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict {
        /// The record that changed.
        id: String,
        /// Version the caller read.
        expected: u64,
        /// Version currently stored.
        found: u64,
    },
}

impl From<StoreError> for BillingError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => Self::NotFound(format!("no {entity} for {id}")),
            StoreError::AlreadyExists { owner_id } => {
                Self::Conflict(format!("billing record already exists for {owner_id}"))
            }
            err @ StoreError::VersionConflict { .. } => Self::Conflict(err.to_string()),
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Storage(msg),
        }
    }
}
