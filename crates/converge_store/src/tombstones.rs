//! Append-only tombstone store.

use crate::error::{StoreError, StoreResult};
use converge_model::{SyncId, Timestamp, Tombstone};
use converge_protocol::{ChangeCursor, Page};
use parking_lot::RwLock;

/// The deletion-record store of one endpoint.
///
/// # Contract
///
/// - `record` is called in the same transaction as the soft or hard delete
///   and fails if the entity never had a sync id assigned. Recording the
///   same `(sync_id, type_name)` again is a no-op; tombstones are created
///   exactly once and never updated.
/// - `changes_since` returns tombstones in `(created_on, sync_id)` order
///   with an inclusive lower bound; ties at the cursor are re-delivered and
///   idempotent apply absorbs them.
/// - `purge_before` removes old tombstones. The caller must pass a cutoff
///   no later than the oldest checkpoint of any known peer, or deletions
///   can be missed by a lagging peer.
pub trait TombstoneStore: Send + Sync {
    /// Records a deletion. Errors with [`StoreError::MissingSyncId`] if the
    /// tombstone carries the nil identity.
    fn record(&self, tombstone: Tombstone) -> StoreResult<()>;

    /// Returns up to `limit` tombstones of `type_name` at or beyond
    /// `cursor`.
    fn changes_since(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> StoreResult<Page<Tombstone>>;

    /// The most recent tombstone for an identity of a type, if any.
    fn latest_for(&self, sync_id: SyncId, type_name: &str) -> StoreResult<Option<Tombstone>>;

    /// Removes tombstones strictly older than `cutoff`, returning how many
    /// were purged.
    fn purge_before(&self, cutoff: Timestamp) -> StoreResult<usize>;
}

/// An in-memory tombstone store.
#[derive(Debug, Default)]
pub struct MemoryTombstoneStore {
    entries: RwLock<Vec<Tombstone>>,
}

impl MemoryTombstoneStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tombstones held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if no tombstones are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl TombstoneStore for MemoryTombstoneStore {
    fn record(&self, tombstone: Tombstone) -> StoreResult<()> {
        if tombstone.sync_id.is_nil() {
            return Err(StoreError::MissingSyncId);
        }

        let mut entries = self.entries.write();
        let exists = entries
            .iter()
            .any(|t| t.sync_id == tombstone.sync_id && t.type_name == tombstone.type_name);
        if !exists {
            entries.push(tombstone);
        }
        Ok(())
    }

    fn changes_since(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> StoreResult<Page<Tombstone>> {
        let entries = self.entries.read();
        let mut eligible: Vec<_> = entries
            .iter()
            .filter(|t| t.type_name == type_name && cursor.admits(t.sort_key()))
            .cloned()
            .collect();
        eligible.sort_by_key(Tombstone::sort_key);

        let has_more = eligible.len() > limit;
        eligible.truncate(limit);
        Ok(Page::from_ordered(eligible, *cursor, has_more))
    }

    fn latest_for(&self, sync_id: SyncId, type_name: &str) -> StoreResult<Option<Tombstone>> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|t| t.sync_id == sync_id && t.type_name == type_name)
            .max_by_key(|t| t.created_on)
            .cloned())
    }

    fn purge_before(&self, cutoff: Timestamp) -> StoreResult<usize> {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|t| t.created_on >= cutoff);
        Ok(before - entries.len())
    }
}
