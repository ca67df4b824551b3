//! Sync cycle state machine.

use parking_lot::RwLock;

/// The phase a sync cycle is in.
///
/// `Cancelled` and `Failed` are terminal and reachable from any
/// non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// No cycle has started.
    NotStarted,
    /// Validating endpoint compatibility.
    Starting,
    /// Pulling changes or tombstones from the local endpoint.
    PullingLocal,
    /// Pulling changes or tombstones from the remote endpoint.
    PullingRemote,
    /// Running entities through the converter pipeline.
    Converting,
    /// Applying a batch to the local endpoint.
    ApplyingToLocal,
    /// Applying a batch to the remote endpoint.
    ApplyingToRemote,
    /// The cycle finished without a fatal error.
    Completed,
    /// The cycle observed cancellation at a batch boundary.
    Cancelled,
    /// The cycle aborted on a fatal error.
    Failed,
}

impl SyncPhase {
    /// Returns true if the cycle has reached a terminal phase.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncPhase::Completed | SyncPhase::Cancelled | SyncPhase::Failed
        )
    }

    /// Returns true if a cycle is actively transferring.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !matches!(self, SyncPhase::NotStarted) && !self.is_terminal()
    }
}

/// Progress reporting as an explicit transition record.
///
/// Callers poll [`current`](PhaseTracker::current) or read the accumulated
/// [`transitions`](PhaseTracker::transitions) after the fact; there are no
/// callbacks, so the state machine is testable in isolation and cannot
/// re-enter the caller.
#[derive(Debug)]
pub struct PhaseTracker {
    current: RwLock<SyncPhase>,
    transitions: RwLock<Vec<SyncPhase>>,
}

impl PhaseTracker {
    /// Creates a tracker in `NotStarted`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: RwLock::new(SyncPhase::NotStarted),
            transitions: RwLock::new(Vec::new()),
        }
    }

    /// The phase the cycle is currently in.
    #[must_use]
    pub fn current(&self) -> SyncPhase {
        *self.current.read()
    }

    /// Moves to `phase`, recording the transition. Consecutive duplicates
    /// are collapsed (batch loops revisit the same phases many times).
    pub fn transition(&self, phase: SyncPhase) {
        let mut current = self.current.write();
        if *current == phase {
            return;
        }
        *current = phase;
        self.transitions.write().push(phase);
    }

    /// The transitions recorded since the last reset.
    #[must_use]
    pub fn transitions(&self) -> Vec<SyncPhase> {
        self.transitions.read().clone()
    }

    /// Clears history and returns to `NotStarted` for the next cycle.
    pub fn reset(&self) {
        *self.current.write() = SyncPhase::NotStarted;
        self.transitions.write().clear();
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}
