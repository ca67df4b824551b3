//! Process-facing sync coordination.

use crate::cancel::CancelToken;
use crate::config::SyncOptions;
use crate::convert::ConverterRegistry;
use crate::endpoint::SyncEndpoint;
use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};
use crate::results::{SyncOutcome, SyncResults};
use crate::state::SyncPhase;
use converge_model::Clock;
use converge_store::{Checkpoint, CheckpointStore, TombstoneStore};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Everything one sync type needs: its options, the two endpoints, and the
/// converter registry.
pub struct SyncProfile {
    /// Cycle configuration for this sync type.
    pub options: SyncOptions,
    /// The endpoint owning the local store.
    pub local: Arc<dyn SyncEndpoint>,
    /// The endpoint owning the remote store.
    pub remote: Arc<dyn SyncEndpoint>,
    /// Converter pairs for every configured entity type.
    pub converters: Arc<ConverterRegistry>,
}

impl SyncProfile {
    /// Bundles a profile.
    #[must_use]
    pub fn new(
        options: SyncOptions,
        local: Arc<dyn SyncEndpoint>,
        remote: Arc<dyn SyncEndpoint>,
        converters: Arc<ConverterRegistry>,
    ) -> Self {
        Self {
            options,
            local,
            remote,
            converters,
        }
    }
}

/// The per-type slot: the long-lived engine (whose running flag enforces
/// single-flight), the in-flight cancel token, and the condvar callers
/// wait on for completion.
struct ManagedSync {
    engine: Arc<SyncEngine>,
    timeout: Option<Duration>,
    cancel: Mutex<Option<CancelToken>>,
    idle_lock: Mutex<()>,
    idle: Condvar,
}

impl ManagedSync {
    /// Waits up to `wait` for the in-flight cycle to reach a terminal
    /// state. Returns false on timeout.
    fn wait_until_idle(&self, wait: Duration) -> bool {
        let deadline = Instant::now() + wait;
        let mut guard = self.idle_lock.lock();
        while self.engine.is_running() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let _ = self.idle.wait_for(&mut guard, deadline - now);
        }
        true
    }

    /// Waits indefinitely for the in-flight cycle to finish. Used after a
    /// forced cancel: the cycle observes the token cooperatively, at most
    /// one batch after the signal.
    fn wait_until_idle_forever(&self) {
        let mut guard = self.idle_lock.lock();
        while self.engine.is_running() {
            self.idle.wait(&mut guard);
        }
    }

    /// Releases the running flag and wakes waiters. Called only after any
    /// checkpoint mutation for the finished cycle has been persisted, so
    /// flag reset and checkpoint advancement are atomic with respect to a
    /// concurrent `run` for the same type.
    fn release(&self) {
        let _guard = self.idle_lock.lock();
        self.engine.finish_run();
        self.idle.notify_all();
    }
}

/// The process-facing coordinator.
///
/// Owns one checkpoint and one engine per sync type. Guarantees at most
/// one in-flight cycle per sync type, exposes cancel / force / wait-for-
/// completion semantics, and persists checkpoint advancement only on a
/// completed cycle. Different sync types may run concurrently; each is
/// single-flight on its own.
///
/// There is no process-wide state here: every manager instance owns its
/// slots outright.
pub struct SyncManager {
    slots: HashMap<String, ManagedSync>,
    checkpoints: Arc<dyn CheckpointStore>,
    clock: Arc<dyn Clock>,
}

impl SyncManager {
    /// Creates a manager over a checkpoint store and clock.
    #[must_use]
    pub fn new(checkpoints: Arc<dyn CheckpointStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            slots: HashMap::new(),
            checkpoints,
            clock,
        }
    }

    /// Registers a sync type, constructing its engine.
    ///
    /// Fails fast on configuration errors (missing converters). Call for
    /// every sync type before handing the manager out.
    pub fn register(&mut self, profile: SyncProfile) -> SyncResult<()> {
        let sync_type = profile.options.sync_type.clone();
        let timeout = profile.options.timeout;
        let engine = Arc::new(SyncEngine::new(
            profile.options,
            profile.local,
            profile.remote,
            profile.converters,
        )?);
        self.slots.insert(
            sync_type,
            ManagedSync {
                engine,
                timeout,
                cancel: Mutex::new(None),
                idle_lock: Mutex::new(()),
                idle: Condvar::new(),
            },
        );
        Ok(())
    }

    /// The registered sync types.
    #[must_use]
    pub fn sync_types(&self) -> Vec<&str> {
        self.slots.keys().map(String::as_str).collect()
    }

    /// The phase the given sync type's current (or last) cycle is in.
    pub fn current_phase(&self, sync_type: &str) -> SyncResult<SyncPhase> {
        Ok(self.slot(sync_type)?.engine.phase())
    }

    /// Returns true while a cycle for the sync type is in flight.
    pub fn is_running(&self, sync_type: &str) -> SyncResult<bool> {
        Ok(self.slot(sync_type)?.engine.is_running())
    }

    /// The sync type's checkpoint (epoch if none was ever persisted).
    pub fn checkpoint(&self, sync_type: &str) -> SyncResult<Checkpoint> {
        self.slot(sync_type)?;
        Ok(self
            .checkpoints
            .load(sync_type)?
            .unwrap_or_else(Checkpoint::epoch))
    }

    /// Signals cancellation to the in-flight cycle, if any. Returns true
    /// if a cycle was in flight to signal.
    pub fn cancel(&self, sync_type: &str) -> SyncResult<bool> {
        let slot = self.slot(sync_type)?;
        match slot.cancel.lock().as_ref() {
            Some(token) => {
                token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Runs one sync cycle for `sync_type`.
    ///
    /// - No cycle in flight: starts one immediately on the calling thread.
    /// - In flight, `wait_for` is `None`: returns a
    ///   [`SyncOutcome::SkippedAlreadyRunning`] result immediately.
    /// - In flight, `wait_for` set: blocks up to that long. If the cycle is
    ///   still running and `force` is false, reports failure ("previous
    ///   cycle never completed"). If `force` is true, signals cancellation
    ///   to the in-flight cycle, waits for it to reach a terminal state,
    ///   then starts the new one.
    ///
    /// A failed or cancelled cycle may simply be retried by calling `run`
    /// again: the checkpoint did not advance and batches are idempotent.
    pub fn run(
        &self,
        sync_type: &str,
        wait_for: Option<Duration>,
        force: bool,
    ) -> SyncResult<SyncResults> {
        let slot = self.slot(sync_type)?;

        if !slot.engine.try_begin() {
            let Some(wait) = wait_for else {
                debug!(sync_type, "cycle already in flight, skipping");
                return Ok(SyncResults::skipped(sync_type));
            };

            if !slot.wait_until_idle(wait) {
                if !force {
                    return Ok(SyncResults::failed(
                        sync_type,
                        Vec::new(),
                        Duration::ZERO,
                        "previous sync cycle never completed",
                    ));
                }
                info!(sync_type, "forcing cancellation of in-flight cycle");
                if let Some(token) = slot.cancel.lock().clone() {
                    token.cancel();
                }
                slot.wait_until_idle_forever();
            }

            if !slot.engine.try_begin() {
                // Another caller claimed the slot between our wait and now.
                return Ok(SyncResults::skipped(sync_type));
            }
        }

        let results = self.execute(sync_type, slot);
        slot.release();
        Ok(results)
    }

    /// Purges tombstones older than the oldest checkpoint of any known
    /// sync type, the newest instant that is provably safe: no lagging
    /// peer can still need a deletion from before its own watermark.
    ///
    /// With no persisted checkpoints, nothing is purged.
    pub fn purge_tombstones(&self, store: &dyn TombstoneStore) -> SyncResult<usize> {
        let checkpoints = self.checkpoints.all()?;
        let Some(cutoff) = checkpoints.iter().map(|(_, cp)| cp.oldest()).min() else {
            return Ok(0);
        };
        let purged = store.purge_before(cutoff)?;
        if purged > 0 {
            info!(purged, "purged tombstones behind the oldest checkpoint");
        }
        Ok(purged)
    }

    fn slot(&self, sync_type: &str) -> SyncResult<&ManagedSync> {
        self.slots
            .get(sync_type)
            .ok_or_else(|| SyncError::UnknownSyncType {
                sync_type: sync_type.to_string(),
            })
    }

    /// Runs the claimed cycle and, on completion, persists the checkpoint
    /// advanced to the instant captured *before* the first batch. Writes
    /// that land during the cycle are picked up by the next one; the
    /// watermark stays conservative under partial failure.
    fn execute(&self, sync_type: &str, slot: &ManagedSync) -> SyncResults {
        let started_at = self.clock.now();

        let checkpoint = match self.checkpoints.load(sync_type) {
            Ok(checkpoint) => checkpoint.unwrap_or_else(Checkpoint::epoch),
            Err(err) => {
                let err = SyncError::from(err);
                warn!(sync_type, error = %err, "failed to load checkpoint");
                return SyncResults::failed(sync_type, Vec::new(), Duration::ZERO, err.to_string());
            }
        };

        let token = match slot.timeout {
            Some(timeout) => CancelToken::with_timeout(timeout),
            None => CancelToken::new(),
        };
        *slot.cancel.lock() = Some(token.clone());

        let mut results = slot.engine.run_cycle(checkpoint, &token);

        *slot.cancel.lock() = None;

        if results.outcome == SyncOutcome::Completed {
            let advanced = checkpoint.advanced_to(started_at);
            match self.checkpoints.save(sync_type, advanced) {
                Ok(()) => {
                    debug!(sync_type, watermark = %started_at, "checkpoint advanced");
                }
                Err(err) => {
                    let err = SyncError::CheckpointPersistence(err);
                    warn!(sync_type, error = %err, "checkpoint persistence failed");
                    results = SyncResults::failed(
                        sync_type,
                        results.issues,
                        results.elapsed,
                        err.to_string(),
                    );
                }
            }
        }

        results
    }
}
