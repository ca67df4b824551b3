//! Error types for the sync engine.

use crate::convert::ConvertError;
use converge_store::StoreError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
///
/// Everything here is cycle-aborting (or construction-time); per-entity
/// problems are recovered inside the batch loop as
/// [`SyncIssue`](converge_protocol::SyncIssue)s and never surface as a
/// `SyncError`.
#[derive(Debug, Error)]
pub enum SyncError {
    /// An endpoint does not support a configured entity type.
    #[error("endpoint '{endpoint}' does not support entity type '{type_name}'")]
    ClientIncompatible {
        /// The endpoint that failed the compatibility check.
        endpoint: String,
        /// The unsupported entity type.
        type_name: String,
    },

    /// Network or transport error that prevented a batch from completing.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether a retry of the cycle may succeed.
        retryable: bool,
    },

    /// No converter pair is registered for a configured entity type.
    /// Raised at engine construction, never mid-cycle.
    #[error("no converter registered for entity type '{type_name}'")]
    MissingConverter {
        /// The unconfigured entity type.
        type_name: String,
    },

    /// Advancing the checkpoint after a successful cycle failed.
    #[error("checkpoint persistence failed: {0}")]
    CheckpointPersistence(#[source] StoreError),

    /// Storage error during sync.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A converter failed outside the per-entity recovery path.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// The cycle was cancelled (or its deadline expired) at a batch
    /// boundary.
    #[error("sync cancelled")]
    Cancelled,

    /// A cycle for this sync type is already in flight.
    #[error("a sync cycle for '{sync_type}' is already running")]
    AlreadyRunning {
        /// The busy sync type.
        sync_type: String,
    },

    /// The manager does not know the requested sync type.
    #[error("unknown sync type '{sync_type}'")]
    UnknownSyncType {
        /// The unregistered sync type.
        sync_type: String,
    },
}

impl SyncError {
    /// Creates a retryable transport error.
    #[must_use]
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    #[must_use]
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if retrying the cycle against the same checkpoint may
    /// succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Cancelled | SyncError::AlreadyRunning { .. } => true,
            _ => false,
        }
    }

    /// Returns true if this error aborts the cycle without advancing the
    /// checkpoint. Cancellation is not a failure: it maps to its own
    /// outcome.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SyncError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_retryability() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
    }

    #[test]
    fn cancellation_is_not_fatal() {
        assert!(!SyncError::Cancelled.is_fatal());
        assert!(SyncError::transport_fatal("down").is_fatal());
        assert!(SyncError::MissingConverter {
            type_name: "contact".into()
        }
        .is_fatal());
    }

    #[test]
    fn display_names_the_type() {
        let err = SyncError::ClientIncompatible {
            endpoint: "remote".into(),
            type_name: "invoice".into(),
        };
        assert!(err.to_string().contains("invoice"));
        assert!(err.to_string().contains("remote"));
    }
}
