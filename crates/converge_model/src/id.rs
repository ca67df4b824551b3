//! Synchronization identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Durable, globally unique identity for a synced entity.
///
/// Sync ids are UUIDs that are:
/// - Generated once at entity creation and never reassigned
/// - Stable across every endpoint an entity is replicated to
/// - Independent of any storage-local primary key
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncId(Uuid);

impl SyncId {
    /// Creates a new random sync id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The nil sentinel, meaning "identity never assigned".
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Creates a sync id from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Creates a sync id from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns true if this is the nil sentinel.
    ///
    /// A nil sync id must never be transmitted or tombstoned.
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for SyncId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SyncId({})", self.0)
    }
}

impl fmt::Display for SyncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SyncId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<SyncId> for Uuid {
    fn from(id: SyncId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_is_unique() {
        let a = SyncId::new();
        let b = SyncId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn nil_is_detectable() {
        assert!(SyncId::nil().is_nil());
        assert!(!SyncId::new().is_nil());
    }

    #[test]
    fn uuid_roundtrip() {
        let uuid = Uuid::new_v4();
        let id = SyncId::from_uuid(uuid);
        assert_eq!(Uuid::from(id), uuid);
    }

    #[test]
    fn ordering_matches_uuid_ordering() {
        let low = SyncId::from_bytes([0u8; 16]);
        let high = SyncId::from_bytes([0xFF; 16]);
        assert!(low < high);
    }
}
