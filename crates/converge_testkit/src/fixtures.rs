//! Wired test harnesses and record builders.

use chrono::{DateTime, TimeDelta};
use converge_engine::{
    ConverterRegistry, RepositoryFilter, StoreEndpoint, SyncManager, SyncOptions, SyncProfile,
};
use converge_model::{EntityRecord, ExclusionRegistry, ManualClock, SyncId, Timestamp};
use converge_store::{MemoryCheckpointStore, MemoryRepository, MemoryTombstoneStore};
use std::sync::Arc;

/// Seconds after the Unix epoch, as a timestamp.
#[must_use]
pub fn at(secs: i64) -> Timestamp {
    DateTime::UNIX_EPOCH + TimeDelta::seconds(secs)
}

/// A contact record with a name field, created and modified at `secs`.
#[must_use]
pub fn contact(name: &str, secs: i64) -> EntityRecord {
    EntityRecord::new(SyncId::new(), at(secs)).with_field("name", name)
}

/// A converter registry with the identity pair for one type.
#[must_use]
pub fn identity_converters(type_name: &str) -> Arc<ConverterRegistry> {
    let mut registry = ConverterRegistry::new();
    registry.register_identity(type_name);
    Arc::new(registry)
}

/// Two store-backed endpoints over fresh in-memory stores, wired for one
/// entity type, with handles onto every store for assertions.
pub struct MemoryEndpointPair {
    /// The entity type both endpoints serve.
    pub type_name: String,
    /// The local side's entity rows.
    pub local_repo: Arc<MemoryRepository>,
    /// The remote side's entity rows.
    pub remote_repo: Arc<MemoryRepository>,
    /// The local side's tombstones.
    pub local_tombstones: Arc<MemoryTombstoneStore>,
    /// The remote side's tombstones.
    pub remote_tombstones: Arc<MemoryTombstoneStore>,
    /// The local endpoint.
    pub local: Arc<StoreEndpoint>,
    /// The remote endpoint.
    pub remote: Arc<StoreEndpoint>,
}

impl MemoryEndpointPair {
    /// Wires a pair with empty exclusion registries.
    #[must_use]
    pub fn new(type_name: &str) -> Self {
        Self::with_exclusions(type_name, ExclusionRegistry::new(), ExclusionRegistry::new())
    }

    /// Wires a pair with explicit per-side exclusion registries.
    #[must_use]
    pub fn with_exclusions(
        type_name: &str,
        local_exclusions: ExclusionRegistry,
        remote_exclusions: ExclusionRegistry,
    ) -> Self {
        let local_repo = Arc::new(MemoryRepository::new());
        let remote_repo = Arc::new(MemoryRepository::new());
        let local_tombstones = Arc::new(MemoryTombstoneStore::new());
        let remote_tombstones = Arc::new(MemoryTombstoneStore::new());

        let local = Arc::new(
            StoreEndpoint::new(
                "local",
                Arc::clone(&local_tombstones) as Arc<dyn converge_store::TombstoneStore>,
                Arc::new(local_exclusions),
            )
            .with_filter(RepositoryFilter::new(type_name, Arc::clone(&local_repo) as Arc<dyn converge_store::SyncRepository>)),
        );
        let remote = Arc::new(
            StoreEndpoint::new(
                "remote",
                Arc::clone(&remote_tombstones) as Arc<dyn converge_store::TombstoneStore>,
                Arc::new(remote_exclusions),
            )
            .with_filter(RepositoryFilter::new(type_name, Arc::clone(&remote_repo) as Arc<dyn converge_store::SyncRepository>)),
        );

        Self {
            type_name: type_name.to_string(),
            local_repo,
            remote_repo,
            local_tombstones,
            remote_tombstones,
            local,
            remote,
        }
    }

    /// A manager over this pair with identity converters, an in-memory
    /// checkpoint store, and a manual clock, registered under `sync_type`.
    #[must_use]
    pub fn manager(&self, sync_type: &str, clock: Arc<ManualClock>) -> SyncManager {
        self.manager_with_options(
            SyncOptions::new(sync_type).with_type(&self.type_name),
            clock,
        )
    }

    /// Same as [`manager`](Self::manager) with explicit options.
    #[must_use]
    pub fn manager_with_options(&self, options: SyncOptions, clock: Arc<ManualClock>) -> SyncManager {
        let mut manager = SyncManager::new(Arc::new(MemoryCheckpointStore::new()), clock);
        manager
            .register(SyncProfile::new(
                options,
                Arc::clone(&self.local) as Arc<dyn converge_engine::SyncEndpoint>,
                Arc::clone(&self.remote) as Arc<dyn converge_engine::SyncEndpoint>,
                identity_converters(&self.type_name),
            ))
            .expect("profile registration failed");
        manager
    }
}
