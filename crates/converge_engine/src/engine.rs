//! The sync engine: one full cycle between two endpoints.

use crate::cancel::CancelToken;
use crate::config::SyncOptions;
use crate::convert::{ConverterRegistry, EntityConverter};
use crate::endpoint::SyncEndpoint;
use crate::error::{SyncError, SyncResult};
use crate::results::SyncResults;
use crate::state::{PhaseTracker, SyncPhase};
use converge_model::EntityRecord;
use converge_protocol::{ChangeCursor, ClientDetails, Page, SyncIssue};
use converge_store::Checkpoint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One pull stream of a cycle (entity changes or tombstones, one side).
/// Once a stream reports no more pages it is not queried again within the
/// cycle.
struct PullStream {
    cursor: ChangeCursor,
    exhausted: bool,
}

impl PullStream {
    fn at(cursor: ChangeCursor) -> Self {
        Self {
            cursor,
            exhausted: false,
        }
    }

    fn advance<T>(&mut self, page: &Page<T>) {
        self.cursor = page.next;
        self.exhausted = !page.has_more;
    }
}

/// Orchestrates sync cycles between a local and a remote endpoint for one
/// sync type.
///
/// The engine owns the running flag that enforces single-flight for its
/// sync type, and a [`PhaseTracker`] that callers poll for progress. It
/// does not own checkpoints: a cycle is handed the checkpoint to read from,
/// and advancing it afterwards is the manager's job.
pub struct SyncEngine {
    options: SyncOptions,
    local: Arc<dyn SyncEndpoint>,
    remote: Arc<dyn SyncEndpoint>,
    converters: Arc<ConverterRegistry>,
    phase: Arc<PhaseTracker>,
    running: AtomicBool,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("options", &self.options)
            .field("phase", &self.phase)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates an engine bound to two endpoints and a converter registry.
    ///
    /// Fails with [`SyncError::MissingConverter`] if any configured entity
    /// type has no registered converter pair: a configuration error is
    /// surfaced here, never mid-cycle.
    pub fn new(
        options: SyncOptions,
        local: Arc<dyn SyncEndpoint>,
        remote: Arc<dyn SyncEndpoint>,
        converters: Arc<ConverterRegistry>,
    ) -> SyncResult<Self> {
        for type_name in &options.types {
            converters.require(type_name)?;
        }
        Ok(Self {
            options,
            local,
            remote,
            converters,
            phase: Arc::new(PhaseTracker::new()),
            running: AtomicBool::new(false),
        })
    }

    /// The sync type this engine serves.
    #[must_use]
    pub fn sync_type(&self) -> &str {
        &self.options.sync_type
    }

    /// The phase the current (or last) cycle is in.
    #[must_use]
    pub fn phase(&self) -> SyncPhase {
        self.phase.current()
    }

    /// Shared handle for polling progress from another thread.
    #[must_use]
    pub fn phase_tracker(&self) -> Arc<PhaseTracker> {
        Arc::clone(&self.phase)
    }

    /// Returns true while a cycle is in flight.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Claims the running flag. Returns false if a cycle is already in
    /// flight; at most one cycle per engine runs at any time.
    pub fn try_begin(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Releases the running flag after a cycle reached a terminal state.
    pub fn finish_run(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Claims the engine, runs one cycle, and releases it.
    ///
    /// Returns a skipped result if a cycle is already in flight. Callers
    /// that need checkpoint advancement to happen before the flag is
    /// released (the manager) claim explicitly via
    /// [`try_begin`](Self::try_begin) and call
    /// [`run_cycle`](Self::run_cycle) themselves.
    pub fn sync(&self, checkpoint: Checkpoint, token: &CancelToken) -> SyncResults {
        if !self.try_begin() {
            return SyncResults::skipped(self.sync_type());
        }
        let results = self.run_cycle(checkpoint, token);
        self.finish_run();
        results
    }

    /// Runs one full cycle against the given checkpoint.
    ///
    /// The caller must hold the running flag, claimed via
    /// [`try_begin`](Self::try_begin). Never panics out of the batch loop:
    /// per-entity problems become issues, fatal conditions become a
    /// `Failed` result, cancellation becomes a `Cancelled` result.
    pub fn run_cycle(&self, checkpoint: Checkpoint, token: &CancelToken) -> SyncResults {
        debug_assert!(self.is_running(), "run_cycle requires the running flag");
        let started = Instant::now();
        self.phase.reset();

        info!(
            sync_type = self.sync_type(),
            types = self.options.types.len(),
            batch = self.options.items_per_batch,
            "starting sync cycle"
        );

        let mut issues = Vec::new();
        let results = match self.execute(&checkpoint, token, &mut issues) {
            Ok(()) => {
                self.phase.transition(SyncPhase::Completed);
                SyncResults::completed(self.sync_type(), issues, started.elapsed())
            }
            Err(SyncError::Cancelled) => {
                self.phase.transition(SyncPhase::Cancelled);
                info!(sync_type = self.sync_type(), "sync cycle cancelled");
                SyncResults::cancelled(self.sync_type(), issues, started.elapsed())
            }
            Err(err) => {
                self.phase.transition(SyncPhase::Failed);
                warn!(sync_type = self.sync_type(), error = %err, "sync cycle failed");
                SyncResults::failed(self.sync_type(), issues, started.elapsed(), err.to_string())
            }
        };

        let results = self.redact(results);
        info!(
            sync_type = self.sync_type(),
            outcome = ?results.outcome,
            issues = results.issues.len(),
            elapsed_ms = results.elapsed.as_millis() as u64,
            "sync cycle finished"
        );
        results
    }

    fn execute(
        &self,
        checkpoint: &Checkpoint,
        token: &CancelToken,
        issues: &mut Vec<SyncIssue>,
    ) -> SyncResult<()> {
        self.phase.transition(SyncPhase::Starting);
        token.check()?;

        let local_details = self.local.client_details()?;
        let remote_details = self.remote.client_details()?;
        self.check_compatibility(&local_details)?;
        self.check_compatibility(&remote_details)?;

        for type_name in &self.options.types {
            self.sync_entity_type(type_name, checkpoint, token, issues)?;
        }
        Ok(())
    }

    fn check_compatibility(&self, details: &ClientDetails) -> SyncResult<()> {
        for type_name in &self.options.types {
            if !details.supports(type_name) {
                return Err(SyncError::ClientIncompatible {
                    endpoint: details.identifier.clone(),
                    type_name: type_name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Batch loop for one entity type: four pull streams, each drained
    /// until it reports no more pages. Tombstones of a batch are applied
    /// after the same batch's entity writes and before the next batch's
    /// pulls, so a delete racing an update in the same window wins.
    fn sync_entity_type(
        &self,
        type_name: &str,
        checkpoint: &Checkpoint,
        token: &CancelToken,
        issues: &mut Vec<SyncIssue>,
    ) -> SyncResult<()> {
        let limit = self.options.items_per_batch;
        let pair = self.converters.require(type_name)?;

        let mut local_changes = PullStream::at(ChangeCursor::at(checkpoint.last_synced_on_local));
        let mut remote_changes = PullStream::at(ChangeCursor::at(checkpoint.last_synced_on_remote));
        let mut local_tombstones =
            PullStream::at(ChangeCursor::at(checkpoint.last_synced_on_local));
        let mut remote_tombstones =
            PullStream::at(ChangeCursor::at(checkpoint.last_synced_on_remote));

        loop {
            token.check()?;

            if !local_changes.exhausted {
                self.phase.transition(SyncPhase::PullingLocal);
                let page = self
                    .local
                    .get_changes(type_name, &local_changes.cursor, limit)?;
                local_changes.advance(&page);
                debug!(type_name, pulled = page.len(), side = "local", "pulled changes");

                self.phase.transition(SyncPhase::Converting);
                let outbound =
                    convert_batch(pair.outgoing.as_ref(), page.items, type_name, issues);

                if !outbound.is_empty() {
                    self.phase.transition(SyncPhase::ApplyingToRemote);
                    let outcome = self.remote.apply_batch(type_name, outbound, Vec::new())?;
                    issues.extend(outcome.issues);
                }
            }

            if !remote_changes.exhausted {
                self.phase.transition(SyncPhase::PullingRemote);
                let page = self
                    .remote
                    .get_changes(type_name, &remote_changes.cursor, limit)?;
                remote_changes.advance(&page);
                debug!(type_name, pulled = page.len(), side = "remote", "pulled changes");

                self.phase.transition(SyncPhase::Converting);
                let inbound =
                    convert_batch(pair.incoming.as_ref(), page.items, type_name, issues);

                if !inbound.is_empty() {
                    self.phase.transition(SyncPhase::ApplyingToLocal);
                    let outcome = self.local.apply_batch(type_name, inbound, Vec::new())?;
                    issues.extend(outcome.issues);
                }
            }

            if !local_tombstones.exhausted {
                self.phase.transition(SyncPhase::PullingLocal);
                let page =
                    self.local
                        .get_tombstones(type_name, &local_tombstones.cursor, limit)?;
                local_tombstones.advance(&page);

                if !page.is_empty() {
                    self.phase.transition(SyncPhase::ApplyingToRemote);
                    let outcome = self.remote.apply_batch(type_name, Vec::new(), page.items)?;
                    issues.extend(outcome.issues);
                }
            }

            if !remote_tombstones.exhausted {
                self.phase.transition(SyncPhase::PullingRemote);
                let page =
                    self.remote
                        .get_tombstones(type_name, &remote_tombstones.cursor, limit)?;
                remote_tombstones.advance(&page);

                if !page.is_empty() {
                    self.phase.transition(SyncPhase::ApplyingToLocal);
                    let outcome = self.local.apply_batch(type_name, Vec::new(), page.items)?;
                    issues.extend(outcome.issues);
                }
            }

            if local_changes.exhausted
                && remote_changes.exhausted
                && local_tombstones.exhausted
                && remote_tombstones.exhausted
            {
                return Ok(());
            }
        }
    }

    /// Reduces issue messages to kind labels when details were not asked
    /// for. Issues are never dropped.
    fn redact(&self, mut results: SyncResults) -> SyncResults {
        if !self.options.include_issue_details {
            results.issues = results.issues.iter().map(SyncIssue::redacted).collect();
        }
        results
    }
}

/// Runs a batch through one converter. A rejected entity becomes a
/// conversion issue and drops out of the batch; the rest continue.
fn convert_batch(
    converter: &dyn EntityConverter,
    records: Vec<EntityRecord>,
    type_name: &str,
    issues: &mut Vec<SyncIssue>,
) -> Vec<EntityRecord> {
    let mut converted = Vec::with_capacity(records.len());
    for record in records {
        match converter.convert(&record) {
            Ok(record) => converted.push(record),
            Err(err) => {
                warn!(type_name, sync_id = %record.sync_id, error = %err, "conversion failed");
                issues.push(SyncIssue::conversion(
                    record.sync_id,
                    type_name,
                    err.to_string(),
                ));
            }
        }
    }
    converted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::ConverterRegistry;
    use crate::endpoint::{RepositoryFilter, StoreEndpoint};
    use converge_model::ExclusionRegistry;
    use converge_store::{MemoryRepository, MemoryTombstoneStore};

    fn memory_endpoint(name: &str, repo: Arc<MemoryRepository>) -> Arc<StoreEndpoint> {
        Arc::new(
            StoreEndpoint::new(
                name,
                Arc::new(MemoryTombstoneStore::new()),
                Arc::new(ExclusionRegistry::new()),
            )
            .with_filter(RepositoryFilter::new("contact", repo)),
        )
    }

    fn registry() -> Arc<ConverterRegistry> {
        let mut registry = ConverterRegistry::new();
        registry.register_identity("contact");
        Arc::new(registry)
    }

    #[test]
    fn construction_requires_converters() {
        let local = memory_endpoint("local", Arc::new(MemoryRepository::new()));
        let remote = memory_endpoint("remote", Arc::new(MemoryRepository::new()));
        let options = SyncOptions::new("accounts").with_type("invoice");

        let err = SyncEngine::new(options, local, remote, registry()).unwrap_err();
        assert!(matches!(err, SyncError::MissingConverter { .. }));
    }

    #[test]
    fn incompatible_endpoint_fails_the_cycle() {
        let local = memory_endpoint("local", Arc::new(MemoryRepository::new()));
        // Remote endpoint has no filter registered for "contact"
        let remote = Arc::new(StoreEndpoint::new(
            "remote",
            Arc::new(MemoryTombstoneStore::new()),
            Arc::new(ExclusionRegistry::new()),
        ));
        let options = SyncOptions::new("accounts").with_type("contact");

        let engine = SyncEngine::new(options, local, remote, registry()).unwrap();
        let results = engine.sync(Checkpoint::epoch(), &CancelToken::new());

        assert_eq!(results.outcome, crate::SyncOutcome::Failed);
        assert!(results.error.unwrap().contains("contact"));
        assert_eq!(engine.phase(), SyncPhase::Failed);
    }

    #[test]
    fn empty_cycle_completes() {
        let local = memory_endpoint("local", Arc::new(MemoryRepository::new()));
        let remote = memory_endpoint("remote", Arc::new(MemoryRepository::new()));
        let options = SyncOptions::new("accounts").with_type("contact");

        let engine = SyncEngine::new(options, local, remote, registry()).unwrap();
        let results = engine.sync(Checkpoint::epoch(), &CancelToken::new());

        assert!(results.was_successful());
        assert_eq!(engine.phase(), SyncPhase::Completed);
        assert!(!engine.is_running());
    }

    #[test]
    fn pre_cancelled_token_yields_cancelled() {
        let local = memory_endpoint("local", Arc::new(MemoryRepository::new()));
        let remote = memory_endpoint("remote", Arc::new(MemoryRepository::new()));
        let options = SyncOptions::new("accounts").with_type("contact");

        let engine = SyncEngine::new(options, local, remote, registry()).unwrap();
        let token = CancelToken::new();
        token.cancel();

        let results = engine.sync(Checkpoint::epoch(), &token);
        assert_eq!(results.outcome, crate::SyncOutcome::Cancelled);
        assert_eq!(engine.phase(), SyncPhase::Cancelled);
    }

    #[test]
    fn second_concurrent_sync_is_skipped() {
        let local = memory_endpoint("local", Arc::new(MemoryRepository::new()));
        let remote = memory_endpoint("remote", Arc::new(MemoryRepository::new()));
        let options = SyncOptions::new("accounts").with_type("contact");

        let engine = SyncEngine::new(options, local, remote, registry()).unwrap();
        assert!(engine.try_begin());

        // The flag is held: a competing sync() must not start a cycle
        let results = engine.sync(Checkpoint::epoch(), &CancelToken::new());
        assert_eq!(results.outcome, crate::SyncOutcome::SkippedAlreadyRunning);

        engine.finish_run();
        assert!(!engine.is_running());
    }
}
