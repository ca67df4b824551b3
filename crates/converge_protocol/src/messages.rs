//! Endpoint handshake and apply result types.

use crate::issue::SyncIssue;
use serde::{Deserialize, Serialize};

/// Identity and capability report of one endpoint, fetched before a cycle
/// begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDetails {
    /// Stable identifier of the endpoint's store.
    pub identifier: String,
    /// Endpoint software version.
    pub version: String,
    /// Entity types the endpoint can synchronize.
    pub supported_types: Vec<String>,
}

impl ClientDetails {
    /// Creates a details record.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        version: impl Into<String>,
        supported_types: Vec<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            version: version.into(),
            supported_types,
        }
    }

    /// Returns true if the endpoint supports the given entity type.
    #[must_use]
    pub fn supports(&self, type_name: &str) -> bool {
        self.supported_types.iter().any(|t| t == type_name)
    }
}

/// Result of applying one batch of entities and tombstones.
///
/// Partial application is allowed: individual entities may fail (each
/// failure recorded as an issue) while the rest of the batch applies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// Number of entities and tombstones applied.
    pub applied: usize,
    /// Per-entity failures.
    pub issues: Vec<SyncIssue>,
}

impl ApplyOutcome {
    /// Creates an outcome.
    #[must_use]
    pub fn new(applied: usize, issues: Vec<SyncIssue>) -> Self {
        Self { applied, issues }
    }

    /// Folds another outcome into this one.
    pub fn merge(&mut self, other: ApplyOutcome) {
        self.applied += other.applied;
        self.issues.extend(other.issues);
    }
}
