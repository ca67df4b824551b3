//! The transfer shape of a synced entity.

use crate::clock::Timestamp;
use crate::id::SyncId;
use crate::value::FieldValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A synced entity as it travels between endpoints and rests in the
/// reference store.
///
/// Identity and ordering metadata is structural; every other field lives in
/// the name-keyed map so that exclusion rules can be applied by field name.
///
/// # Invariants
///
/// - `sync_id` is assigned once at creation and never changes.
/// - `modified_on` is monotonically non-decreasing under every local write.
///   Writes made *by* the sync engine preserve the incoming `modified_on`
///   instead of stamping local time, so replicated rows do not become
///   re-eligible for outbound transfer.
/// - A deleted entity keeps its row with `is_deleted = true`; the deletion
///   travels as a [`Tombstone`](crate::Tombstone), not as the entity itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// Durable identity, stable across all endpoints.
    pub sync_id: SyncId,
    /// When the entity was first created.
    pub created_on: Timestamp,
    /// Authoritative ordering field for incremental pull.
    pub modified_on: Timestamp,
    /// Soft-delete flag.
    pub is_deleted: bool,
    /// Named fields, looked up by name during apply.
    pub fields: BTreeMap<String, FieldValue>,
}

impl EntityRecord {
    /// Creates a new record with `modified_on == created_on` and no fields.
    #[must_use]
    pub fn new(sync_id: SyncId, created_on: Timestamp) -> Self {
        Self {
            sync_id,
            created_on,
            modified_on: created_on,
            is_deleted: false,
            fields: BTreeMap::new(),
        }
    }

    /// Adds a field, builder style.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Sets the modification time, builder style.
    #[must_use]
    pub fn with_modified_on(mut self, modified_on: Timestamp) -> Self {
        self.modified_on = modified_on;
        self
    }

    /// Returns a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Sets a field in place.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Iterates over relationship fields: `(field name, referenced sync id)`.
    pub fn references(&self) -> impl Iterator<Item = (&str, SyncId)> {
        self.fields
            .iter()
            .filter_map(|(name, value)| value.as_reference().map(|id| (name.as_str(), id)))
    }

    /// The `(modified_on, sync_id)` pair that totally orders entities within
    /// a batch and acts as the resumable page cursor.
    #[must_use]
    pub fn sort_key(&self) -> (Timestamp, SyncId) {
        (self.modified_on, self.sync_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn epoch() -> Timestamp {
        DateTime::UNIX_EPOCH
    }

    #[test]
    fn new_record_starts_unmodified() {
        let record = EntityRecord::new(SyncId::new(), epoch());
        assert_eq!(record.created_on, record.modified_on);
        assert!(!record.is_deleted);
        assert!(record.fields.is_empty());
    }

    #[test]
    fn fields_are_name_addressable() {
        let record = EntityRecord::new(SyncId::new(), epoch())
            .with_field("name", "Ada")
            .with_field("age", 36i64);

        assert_eq!(record.field("name").and_then(FieldValue::as_text), Some("Ada"));
        assert_eq!(record.field("age").and_then(FieldValue::as_integer), Some(36));
        assert!(record.field("missing").is_none());
    }

    #[test]
    fn references_iterates_relationship_fields_only() {
        let target = SyncId::new();
        let record = EntityRecord::new(SyncId::new(), epoch())
            .with_field("name", "Ada")
            .with_field("team", target);

        let refs: Vec<_> = record.references().collect();
        assert_eq!(refs, vec![("team", target)]);
    }

    #[test]
    fn sort_key_orders_by_time_then_id() {
        let early = EntityRecord::new(SyncId::from_bytes([1; 16]), epoch());
        let late = EntityRecord::new(SyncId::from_bytes([0; 16]), epoch())
            .with_modified_on(epoch() + chrono::TimeDelta::seconds(1));

        assert!(early.sort_key() < late.sort_key());

        // Same timestamp: sync id breaks the tie
        let tie_low = EntityRecord::new(SyncId::from_bytes([0; 16]), epoch());
        let tie_high = EntityRecord::new(SyncId::from_bytes([2; 16]), epoch());
        assert!(tie_low.sort_key() < tie_high.sort_key());
    }
}
