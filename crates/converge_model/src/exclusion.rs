//! Per-type, per-direction field authority rules.

use std::collections::{BTreeSet, HashMap};

/// The kind of write a field exclusion applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldDirection {
    /// Applying a remote entity locally.
    Incoming,
    /// Sending a local entity to the remote side.
    Outgoing,
    /// Updating an entity that already exists locally via sync. Checks the
    /// sync-update set *and* the incoming set (sync-update is a superset).
    SyncUpdate,
    /// Local change tracking: mutations to these fields must not mark the
    /// entity as locally modified.
    ChangeTracking,
}

/// The four named exclusion sets for one entity type.
///
/// A field present in a set is skipped for that kind of write. The
/// sync-update direction is a superset of incoming: anything excluded from
/// incoming apply is also excluded from sync-triggered updates, plus fields
/// that must never change once an entity is first created via sync.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSets {
    incoming: BTreeSet<String>,
    outgoing: BTreeSet<String>,
    sync_update: BTreeSet<String>,
    change_tracking: BTreeSet<String>,
}

impl ExclusionSets {
    /// Creates empty sets (every field applied in every direction).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes a field from every direction, builder style.
    ///
    /// This is the default policy shape for primary keys and
    /// navigation/collection fields.
    #[must_use]
    pub fn exclude_everywhere(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.incoming.insert(field.clone());
        self.outgoing.insert(field.clone());
        self.sync_update.insert(field.clone());
        self.change_tracking.insert(field);
        self
    }

    /// Excludes a field from incoming apply, builder style.
    #[must_use]
    pub fn exclude_incoming(mut self, field: impl Into<String>) -> Self {
        self.incoming.insert(field.into());
        self
    }

    /// Excludes a field from outbound transfer, builder style.
    #[must_use]
    pub fn exclude_outgoing(mut self, field: impl Into<String>) -> Self {
        self.outgoing.insert(field.into());
        self
    }

    /// Excludes a field from sync-triggered updates, builder style.
    ///
    /// Use for fields that must never change once an entity has been created
    /// via sync, e.g. relationship ids.
    #[must_use]
    pub fn exclude_sync_update(mut self, field: impl Into<String>) -> Self {
        self.sync_update.insert(field.into());
        self
    }

    /// Excludes a field from local change tracking, builder style.
    ///
    /// Use for computed/volatile fields.
    #[must_use]
    pub fn exclude_change_tracking(mut self, field: impl Into<String>) -> Self {
        self.change_tracking.insert(field.into());
        self
    }

    /// Returns true if `field` is excluded for `direction`.
    #[must_use]
    pub fn excludes(&self, field: &str, direction: FieldDirection) -> bool {
        match direction {
            FieldDirection::Incoming => self.incoming.contains(field),
            FieldDirection::Outgoing => self.outgoing.contains(field),
            FieldDirection::SyncUpdate => {
                // Superset invariant applied at lookup time
                self.sync_update.contains(field) || self.incoming.contains(field)
            }
            FieldDirection::ChangeTracking => self.change_tracking.contains(field),
        }
    }
}

/// Immutable lookup table of exclusion sets per entity type.
///
/// Populated once at startup via explicit registration, then shared by
/// reference. Lookup is on the hot path of every entity applied during a
/// cycle, so override resolution happens at registration, not per apply.
#[derive(Debug, Default)]
pub struct ExclusionRegistry {
    defaults: ExclusionSets,
    types: HashMap<String, ExclusionSets>,
}

impl ExclusionRegistry {
    /// Creates a registry with empty defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry whose defaults apply to unregistered types.
    #[must_use]
    pub fn with_defaults(defaults: ExclusionSets) -> Self {
        Self {
            defaults,
            types: HashMap::new(),
        }
    }

    /// Registers the exclusion sets for one entity type, replacing any
    /// previous registration. Call during startup only.
    pub fn register(&mut self, type_name: impl Into<String>, sets: ExclusionSets) {
        self.types.insert(type_name.into(), sets);
    }

    /// Returns the sets for a type, falling back to the defaults.
    #[must_use]
    pub fn sets_for(&self, type_name: &str) -> &ExclusionSets {
        self.types.get(type_name).unwrap_or(&self.defaults)
    }

    /// Returns true if `field` of `type_name` should be written for
    /// `direction`.
    #[must_use]
    pub fn should_apply_field(
        &self,
        type_name: &str,
        field: &str,
        direction: FieldDirection,
    ) -> bool {
        !self.sets_for(type_name).excludes(field, direction)
    }

    /// Returns true if mutating `field` should mark the entity as locally
    /// modified (bump `modified_on` and make it sync-eligible).
    ///
    /// Application write paths consult this so computed or volatile fields
    /// do not churn the change stream.
    #[must_use]
    pub fn tracks_change(&self, type_name: &str, field: &str) -> bool {
        self.should_apply_field(type_name, field, FieldDirection::ChangeTracking)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sets_apply_everything() {
        let sets = ExclusionSets::new();
        for direction in [
            FieldDirection::Incoming,
            FieldDirection::Outgoing,
            FieldDirection::SyncUpdate,
            FieldDirection::ChangeTracking,
        ] {
            assert!(!sets.excludes("anything", direction));
        }
    }

    #[test]
    fn exclude_everywhere_covers_all_directions() {
        let sets = ExclusionSets::new().exclude_everywhere("id");
        for direction in [
            FieldDirection::Incoming,
            FieldDirection::Outgoing,
            FieldDirection::SyncUpdate,
            FieldDirection::ChangeTracking,
        ] {
            assert!(sets.excludes("id", direction));
        }
    }

    #[test]
    fn sync_update_is_superset_of_incoming() {
        let sets = ExclusionSets::new().exclude_incoming("email");
        assert!(sets.excludes("email", FieldDirection::Incoming));
        assert!(sets.excludes("email", FieldDirection::SyncUpdate));
        // But not the other way around
        let sets = ExclusionSets::new().exclude_sync_update("owner");
        assert!(sets.excludes("owner", FieldDirection::SyncUpdate));
        assert!(!sets.excludes("owner", FieldDirection::Incoming));
    }

    #[test]
    fn change_tracking_silences_volatile_fields() {
        let mut registry = ExclusionRegistry::new();
        registry.register(
            "contact",
            ExclusionSets::new().exclude_change_tracking("search_index"),
        );

        assert!(!registry.tracks_change("contact", "search_index"));
        assert!(registry.tracks_change("contact", "name"));
    }

    #[test]
    fn registry_falls_back_to_defaults() {
        let mut registry =
            ExclusionRegistry::with_defaults(ExclusionSets::new().exclude_everywhere("row_id"));
        registry.register(
            "contact",
            ExclusionSets::new().exclude_incoming("email_hash"),
        );

        // Registered type uses its own sets, not defaults
        assert!(registry.should_apply_field("contact", "row_id", FieldDirection::Incoming));
        assert!(!registry.should_apply_field("contact", "email_hash", FieldDirection::Incoming));

        // Unregistered type uses defaults
        assert!(!registry.should_apply_field("invoice", "row_id", FieldDirection::Incoming));
        assert!(registry.should_apply_field("invoice", "total", FieldDirection::Incoming));
    }
}
