//! The per-type storage contract.

use crate::error::StoreResult;
use converge_model::{EntityRecord, SyncId};
use converge_protocol::{ChangeCursor, Page};

/// Storage-local key of a row. Meaningful only within one endpoint; never
/// transmitted as the join key between endpoints.
pub type LocalKey = u64;

/// The storage contract one entity type is synchronized through.
///
/// One repository backs one entity type. The engine reads changes through
/// [`changes_since`](SyncRepository::changes_since) and writes through the
/// apply methods; it never bypasses this trait to reach storage directly.
///
/// # Contract
///
/// - `changes_since` returns non-deleted rows in `(modified_on, sync_id)`
///   order, a stable, resumable cursor. Re-querying with the same cursor
///   returns the same logical set (idempotent pull). Soft-deleted rows are
///   excluded; deletions travel as tombstones.
/// - `upsert` is all-or-nothing per entity: a failed write must never leave
///   a half-written row.
/// - Local keys are assigned by the repository and stay stable across
///   updates of the same sync id.
pub trait SyncRepository: Send + Sync {
    /// Returns up to `limit` changed entities at or beyond `cursor`.
    fn changes_since(
        &self,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> StoreResult<Page<EntityRecord>>;

    /// Looks up a row by its durable identity.
    fn find_by_sync_id(&self, sync_id: SyncId) -> StoreResult<Option<EntityRecord>>;

    /// Inserts or replaces the row carrying `record.sync_id`, returning its
    /// local key.
    fn upsert(&self, record: EntityRecord) -> StoreResult<LocalKey>;

    /// Soft-deletes the row with the given identity. Returns false if no
    /// such row exists.
    fn mark_deleted(&self, sync_id: SyncId) -> StoreResult<bool>;

    /// Permanently removes the row with the given identity. Returns false
    /// if no such row exists.
    fn remove(&self, sync_id: SyncId) -> StoreResult<bool>;

    /// Returns true if a row (deleted or not) carries the given identity.
    fn contains(&self, sync_id: SyncId) -> StoreResult<bool>;

    /// Re-resolves a peer sync id to the local key of the matching row.
    fn resolve_local_key(&self, sync_id: SyncId) -> StoreResult<Option<LocalKey>>;

    /// Records the resolved local key for a relationship field of `owner`.
    ///
    /// Called by the apply post-pass once every entity of a batch has been
    /// written, so forward references within a batch resolve regardless of
    /// arrival order.
    fn bind_reference(&self, owner: SyncId, field: &str, target: LocalKey) -> StoreResult<()>;
}
