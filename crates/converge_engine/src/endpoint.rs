//! Endpoint abstraction over one side's storage.

use crate::apply;
use crate::error::{SyncError, SyncResult};
use converge_model::{EntityRecord, ExclusionRegistry, FieldDirection, Tombstone};
use converge_protocol::{ApplyOutcome, ChangeCursor, ClientDetails, Page};
use converge_store::{SyncRepository, TombstoneStore};
use std::collections::HashMap;
use std::sync::Arc;

/// A handle over one side's storage, local or remote, with the same interface
/// regardless of transport.
///
/// Implementations own their storage exclusively: the engine never writes
/// to storage it does not own, it only calls through this trait. All
/// methods are synchronous; network or storage I/O inside them is the only
/// place a cycle is expected to block.
pub trait SyncEndpoint: Send + Sync {
    /// Identity and supported entity types, checked before a cycle begins.
    fn client_details(&self) -> SyncResult<ClientDetails>;

    /// Up to `limit` changed entities of `type_name` at or beyond `cursor`,
    /// in `(modified_on, sync_id)` order. Idempotent: re-querying with the
    /// same cursor after a partial failure returns the same logical set.
    fn get_changes(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> SyncResult<Page<EntityRecord>>;

    /// Up to `limit` tombstones of `type_name` at or beyond `cursor`, same
    /// ordering and idempotence contract as [`get_changes`](Self::get_changes).
    fn get_tombstones(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> SyncResult<Page<Tombstone>>;

    /// Applies a batch of entities and tombstones. Partial application is
    /// allowed (entities fail independently, each failure an issue), but
    /// every entity write is all-or-nothing.
    fn apply_batch(
        &self,
        type_name: &str,
        entities: Vec<EntityRecord>,
        tombstones: Vec<Tombstone>,
    ) -> SyncResult<ApplyOutcome>;
}

/// Predicate restricting which rows of a type are eligible for sync.
pub type EligibilityPredicate = Arc<dyn Fn(&EntityRecord) -> bool + Send + Sync>;

/// Per entity-type binding: the repository backing the type plus an
/// optional eligibility predicate (e.g. only non-archived rows).
///
/// Constructed once per endpoint configuration, immutable thereafter.
#[derive(Clone)]
pub struct RepositoryFilter {
    type_name: String,
    repository: Arc<dyn SyncRepository>,
    predicate: Option<EligibilityPredicate>,
}

impl RepositoryFilter {
    /// Binds a type to the repository backing it.
    #[must_use]
    pub fn new(type_name: impl Into<String>, repository: Arc<dyn SyncRepository>) -> Self {
        Self {
            type_name: type_name.into(),
            repository,
            predicate: None,
        }
    }

    /// Restricts eligibility, builder style.
    #[must_use]
    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&EntityRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    /// The bound entity type.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl std::fmt::Debug for RepositoryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryFilter")
            .field("type_name", &self.type_name)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

/// The store-backed endpoint: repositories per type, a tombstone store,
/// and the exclusion registry consulted on every entity write.
pub struct StoreEndpoint {
    identifier: String,
    filters: HashMap<String, RepositoryFilter>,
    tombstones: Arc<dyn TombstoneStore>,
    exclusions: Arc<ExclusionRegistry>,
    permanent_deletions: bool,
}

impl StoreEndpoint {
    /// Creates an endpoint over a tombstone store and exclusion registry.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        tombstones: Arc<dyn TombstoneStore>,
        exclusions: Arc<ExclusionRegistry>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            filters: HashMap::new(),
            tombstones,
            exclusions,
            permanent_deletions: false,
        }
    }

    /// Registers a per-type repository binding, builder style.
    #[must_use]
    pub fn with_filter(mut self, filter: RepositoryFilter) -> Self {
        self.filters.insert(filter.type_name.clone(), filter);
        self
    }

    /// Hard-delete rows on tombstone apply instead of soft-deleting.
    #[must_use]
    pub fn with_permanent_deletions(mut self, permanent: bool) -> Self {
        self.permanent_deletions = permanent;
        self
    }

    /// The tombstone store this endpoint owns.
    #[must_use]
    pub fn tombstone_store(&self) -> &Arc<dyn TombstoneStore> {
        &self.tombstones
    }

    fn filter(&self, type_name: &str) -> SyncResult<&RepositoryFilter> {
        self.filters
            .get(type_name)
            .ok_or_else(|| SyncError::ClientIncompatible {
                endpoint: self.identifier.clone(),
                type_name: type_name.to_string(),
            })
    }
}

impl SyncEndpoint for StoreEndpoint {
    fn client_details(&self) -> SyncResult<ClientDetails> {
        let mut supported: Vec<String> = self.filters.keys().cloned().collect();
        supported.sort();
        Ok(ClientDetails::new(
            self.identifier.clone(),
            env!("CARGO_PKG_VERSION"),
            supported,
        ))
    }

    fn get_changes(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> SyncResult<Page<EntityRecord>> {
        let filter = self.filter(type_name)?;
        let mut page = filter.repository.changes_since(cursor, limit)?;
        // The page's next cursor was derived from the unfiltered tail, so
        // dropping ineligible rows here cannot stall paging.
        if let Some(predicate) = &filter.predicate {
            page.items.retain(|record| predicate(record));
        }
        // Outgoing exclusions: these fields never leave this endpoint.
        for record in &mut page.items {
            record.fields.retain(|name, _| {
                self.exclusions
                    .should_apply_field(type_name, name, FieldDirection::Outgoing)
            });
        }
        Ok(page)
    }

    fn get_tombstones(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> SyncResult<Page<Tombstone>> {
        self.filter(type_name)?;
        Ok(self.tombstones.changes_since(type_name, cursor, limit)?)
    }

    fn apply_batch(
        &self,
        type_name: &str,
        entities: Vec<EntityRecord>,
        tombstones: Vec<Tombstone>,
    ) -> SyncResult<ApplyOutcome> {
        let filter = self.filter(type_name)?;
        let repo = filter.repository.as_ref();

        let mut outcome = apply::apply_entities(
            repo,
            self.tombstones.as_ref(),
            &self.exclusions,
            type_name,
            entities,
        );
        outcome.merge(apply::apply_tombstones(
            repo,
            self.tombstones.as_ref(),
            type_name,
            tombstones,
            self.permanent_deletions,
        ));
        Ok(outcome)
    }
}
