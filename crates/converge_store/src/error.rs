//! Error types for the store layer.

use converge_model::SyncId;
use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entity without an assigned sync id was offered for tombstoning or
    /// transfer.
    #[error("entity has no sync id assigned")]
    MissingSyncId,

    /// No row carries the given sync id.
    #[error("no row with sync id {sync_id}")]
    NotFound {
        /// The identity that was looked up.
        sync_id: SyncId,
    },

    /// The storage layer rejected a write.
    #[error("constraint violation: {message}")]
    Constraint {
        /// Description of the violated constraint.
        message: String,
    },

    /// I/O error from a persistent store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Checkpoint (de)serialization failed.
    #[error("checkpoint serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a constraint violation error.
    #[must_use]
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }
}
