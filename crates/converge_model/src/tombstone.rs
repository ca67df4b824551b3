//! Deletion propagation records.

use crate::clock::Timestamp;
use crate::entity::EntityRecord;
use crate::id::SyncId;
use serde::{Deserialize, Serialize};

/// A minimal record of "this identity, of this type, was deleted at this
/// time", used to propagate deletions without transferring the entity.
///
/// Tombstones are created exactly once, at the moment an entity transitions
/// to deleted, and are never updated afterwards. A tombstone must be
/// creatable even if the original row has already been purged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
    /// Human-meaningful reference to the deleted row (for issue reporting).
    pub reference_id: String,
    /// The deleted entity's durable identity.
    pub sync_id: SyncId,
    /// The entity type the identity belonged to.
    pub type_name: String,
    /// When the deletion happened. Queried by `created_on >= since`.
    pub created_on: Timestamp,
}

impl Tombstone {
    /// Creates a tombstone.
    #[must_use]
    pub fn new(
        reference_id: impl Into<String>,
        sync_id: SyncId,
        type_name: impl Into<String>,
        created_on: Timestamp,
    ) -> Self {
        Self {
            reference_id: reference_id.into(),
            sync_id,
            type_name: type_name.into(),
            created_on,
        }
    }

    /// Creates a tombstone for an entity record at the given instant.
    ///
    /// The sync id is taken from the record; the reference id is its string
    /// form.
    #[must_use]
    pub fn for_entity(record: &EntityRecord, type_name: impl Into<String>, at: Timestamp) -> Self {
        Self::new(record.sync_id.to_string(), record.sync_id, type_name, at)
    }

    /// The `(created_on, sync_id)` pair ordering tombstones within a batch.
    #[must_use]
    pub fn sort_key(&self) -> (Timestamp, SyncId) {
        (self.created_on, self.sync_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn for_entity_carries_identity() {
        let record = EntityRecord::new(SyncId::new(), DateTime::UNIX_EPOCH);
        let tombstone = Tombstone::for_entity(&record, "contact", DateTime::UNIX_EPOCH);

        assert_eq!(tombstone.sync_id, record.sync_id);
        assert_eq!(tombstone.type_name, "contact");
        assert_eq!(tombstone.reference_id, record.sync_id.to_string());
    }

    #[test]
    fn sort_key_orders_by_time_then_id() {
        let t0 = DateTime::UNIX_EPOCH;
        let t1 = t0 + chrono::TimeDelta::seconds(5);

        let a = Tombstone::new("a", SyncId::from_bytes([9; 16]), "contact", t0);
        let b = Tombstone::new("b", SyncId::from_bytes([0; 16]), "contact", t1);
        assert!(a.sort_key() < b.sort_key());
    }
}
