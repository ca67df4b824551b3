//! In-memory reference repository.

use crate::error::{StoreError, StoreResult};
use crate::repository::{LocalKey, SyncRepository};
use converge_model::{EntityRecord, SyncId};
use converge_protocol::{ChangeCursor, Page};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
struct Row {
    local_key: LocalKey,
    record: EntityRecord,
    resolved_refs: BTreeMap<String, LocalKey>,
}

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<SyncId, Row>,
    next_key: LocalKey,
}

/// An in-memory repository for one entity type.
///
/// Rows are keyed by sync id with auto-increment local keys, mirroring a
/// storage backend with an integer primary key plus a unique sync-id index.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows, including soft-deleted ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().rows.len()
    }

    /// Returns true if the repository holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().rows.is_empty()
    }

    /// Snapshot of every record, in `(modified_on, sync_id)` order.
    #[must_use]
    pub fn records(&self) -> Vec<EntityRecord> {
        let inner = self.inner.read();
        let mut records: Vec<_> = inner.rows.values().map(|r| r.record.clone()).collect();
        records.sort_by_key(EntityRecord::sort_key);
        records
    }

    /// The resolved local key bound to a relationship field, if any.
    #[must_use]
    pub fn bound_reference(&self, owner: SyncId, field: &str) -> Option<LocalKey> {
        self.inner
            .read()
            .rows
            .get(&owner)
            .and_then(|row| row.resolved_refs.get(field).copied())
    }
}

impl SyncRepository for MemoryRepository {
    fn changes_since(
        &self,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> StoreResult<Page<EntityRecord>> {
        let inner = self.inner.read();
        let mut eligible: Vec<_> = inner
            .rows
            .values()
            .filter(|row| !row.record.is_deleted && cursor.admits(row.record.sort_key()))
            .map(|row| row.record.clone())
            .collect();
        eligible.sort_by_key(EntityRecord::sort_key);

        let has_more = eligible.len() > limit;
        eligible.truncate(limit);
        Ok(Page::from_ordered(eligible, *cursor, has_more))
    }

    fn find_by_sync_id(&self, sync_id: SyncId) -> StoreResult<Option<EntityRecord>> {
        Ok(self
            .inner
            .read()
            .rows
            .get(&sync_id)
            .map(|row| row.record.clone()))
    }

    fn upsert(&self, record: EntityRecord) -> StoreResult<LocalKey> {
        if record.sync_id.is_nil() {
            return Err(StoreError::MissingSyncId);
        }

        let mut inner = self.inner.write();
        if let Some(row) = inner.rows.get_mut(&record.sync_id) {
            row.record = record;
            return Ok(row.local_key);
        }

        inner.next_key += 1;
        let local_key = inner.next_key;
        inner.rows.insert(
            record.sync_id,
            Row {
                local_key,
                record,
                resolved_refs: BTreeMap::new(),
            },
        );
        Ok(local_key)
    }

    fn mark_deleted(&self, sync_id: SyncId) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        match inner.rows.get_mut(&sync_id) {
            Some(row) => {
                row.record.is_deleted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove(&self, sync_id: SyncId) -> StoreResult<bool> {
        Ok(self.inner.write().rows.remove(&sync_id).is_some())
    }

    fn contains(&self, sync_id: SyncId) -> StoreResult<bool> {
        Ok(self.inner.read().rows.contains_key(&sync_id))
    }

    fn resolve_local_key(&self, sync_id: SyncId) -> StoreResult<Option<LocalKey>> {
        Ok(self
            .inner
            .read()
            .rows
            .get(&sync_id)
            .map(|row| row.local_key))
    }

    fn bind_reference(&self, owner: SyncId, field: &str, target: LocalKey) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let row = inner
            .rows
            .get_mut(&owner)
            .ok_or(StoreError::NotFound { sync_id: owner })?;
        row.resolved_refs.insert(field.to_string(), target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta};
    use converge_model::Timestamp;

    fn at(secs: i64) -> Timestamp {
        DateTime::UNIX_EPOCH + TimeDelta::seconds(secs)
    }

    fn record(secs: i64) -> EntityRecord {
        EntityRecord::new(SyncId::new(), at(secs))
    }

    #[test]
    fn upsert_assigns_stable_local_keys() {
        let repo = MemoryRepository::new();
        let mut r = record(1);
        r.set_field("name", "Ada");

        let key = repo.upsert(r.clone()).unwrap();

        r.set_field("name", "Grace");
        let key_again = repo.upsert(r.clone()).unwrap();

        assert_eq!(key, key_again);
        let stored = repo.find_by_sync_id(r.sync_id).unwrap().unwrap();
        assert_eq!(stored.field("name").and_then(|v| v.as_text()), Some("Grace"));
    }

    #[test]
    fn upsert_rejects_nil_identity() {
        let repo = MemoryRepository::new();
        let r = EntityRecord::new(SyncId::nil(), at(0));
        assert!(matches!(repo.upsert(r), Err(StoreError::MissingSyncId)));
    }

    #[test]
    fn changes_since_orders_and_pages() {
        let repo = MemoryRepository::new();
        for secs in [3, 1, 2] {
            repo.upsert(record(secs)).unwrap();
        }

        let cursor = ChangeCursor::at(at(0));
        let page = repo.changes_since(&cursor, 2).unwrap();
        assert_eq!(page.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.items[0].modified_on, at(1));
        assert_eq!(page.items[1].modified_on, at(2));

        let rest = repo.changes_since(&page.next, 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert!(!rest.has_more);
        assert_eq!(rest.items[0].modified_on, at(3));
    }

    #[test]
    fn changes_since_skips_soft_deleted_rows() {
        let repo = MemoryRepository::new();
        let r = record(1);
        let id = r.sync_id;
        repo.upsert(r).unwrap();
        repo.upsert(record(2)).unwrap();

        repo.mark_deleted(id).unwrap();

        let page = repo.changes_since(&ChangeCursor::at(at(0)), 10).unwrap();
        assert_eq!(page.len(), 1);
        // The deleted row still exists and is findable
        assert!(repo.contains(id).unwrap());
        assert!(repo.find_by_sync_id(id).unwrap().unwrap().is_deleted);
    }

    #[test]
    fn changes_since_is_idempotent() {
        let repo = MemoryRepository::new();
        for secs in [1, 2, 3] {
            repo.upsert(record(secs)).unwrap();
        }

        let cursor = ChangeCursor::at(at(2));
        let first = repo.changes_since(&cursor, 10).unwrap();
        let second = repo.changes_since(&cursor, 10).unwrap();
        assert_eq!(first, second);
        // Inclusive lower bound: the row at exactly t=2 is delivered
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn reference_binding_resolves_local_keys() {
        let repo = MemoryRepository::new();
        let target = record(1);
        let target_id = target.sync_id;
        let owner = record(2).with_field("team", target_id);
        let owner_id = owner.sync_id;

        let target_key = repo.upsert(target).unwrap();
        repo.upsert(owner).unwrap();

        let resolved = repo.resolve_local_key(target_id).unwrap().unwrap();
        assert_eq!(resolved, target_key);

        repo.bind_reference(owner_id, "team", resolved).unwrap();
        assert_eq!(repo.bound_reference(owner_id, "team"), Some(target_key));
    }

    #[test]
    fn remove_is_permanent() {
        let repo = MemoryRepository::new();
        let r = record(1);
        let id = r.sync_id;
        repo.upsert(r).unwrap();

        assert!(repo.remove(id).unwrap());
        assert!(!repo.contains(id).unwrap());
        assert!(!repo.remove(id).unwrap());
    }
}
