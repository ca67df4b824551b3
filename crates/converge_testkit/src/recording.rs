//! Endpoint wrapper that counts calls per method.

use converge_engine::{SyncEndpoint, SyncResult};
use converge_model::{EntityRecord, Tombstone};
use converge_protocol::{ApplyOutcome, ChangeCursor, ClientDetails, Page};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps any endpoint and counts how often each method is called.
///
/// Used to assert batching behavior, e.g. that three pending entities at a
/// batch size of one are transferred in exactly three `get_changes` calls.
pub struct RecordingEndpoint {
    inner: Arc<dyn SyncEndpoint>,
    details_calls: AtomicUsize,
    get_changes_calls: AtomicUsize,
    get_tombstones_calls: AtomicUsize,
    apply_calls: AtomicUsize,
}

impl RecordingEndpoint {
    /// Wraps an endpoint.
    #[must_use]
    pub fn new(inner: Arc<dyn SyncEndpoint>) -> Self {
        Self {
            inner,
            details_calls: AtomicUsize::new(0),
            get_changes_calls: AtomicUsize::new(0),
            get_tombstones_calls: AtomicUsize::new(0),
            apply_calls: AtomicUsize::new(0),
        }
    }

    /// How many times `client_details` was called.
    #[must_use]
    pub fn details_calls(&self) -> usize {
        self.details_calls.load(Ordering::SeqCst)
    }

    /// How many times `get_changes` was called.
    #[must_use]
    pub fn get_changes_calls(&self) -> usize {
        self.get_changes_calls.load(Ordering::SeqCst)
    }

    /// How many times `get_tombstones` was called.
    #[must_use]
    pub fn get_tombstones_calls(&self) -> usize {
        self.get_tombstones_calls.load(Ordering::SeqCst)
    }

    /// How many times `apply_batch` was called.
    #[must_use]
    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

impl SyncEndpoint for RecordingEndpoint {
    fn client_details(&self) -> SyncResult<ClientDetails> {
        self.details_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.client_details()
    }

    fn get_changes(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> SyncResult<Page<EntityRecord>> {
        self.get_changes_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_changes(type_name, cursor, limit)
    }

    fn get_tombstones(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> SyncResult<Page<Tombstone>> {
        self.get_tombstones_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.get_tombstones(type_name, cursor, limit)
    }

    fn apply_batch(
        &self,
        type_name: &str,
        entities: Vec<EntityRecord>,
        tombstones: Vec<Tombstone>,
    ) -> SyncResult<ApplyOutcome> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_batch(type_name, entities, tombstones)
    }
}
