//! Terminal output of a sync cycle.

use converge_protocol::SyncIssue;
use std::time::Duration;

/// How a cycle (or a run request) ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The cycle ran to the end without a fatal error. Inspect the issue
    /// list before treating this as full success.
    Completed,
    /// A fatal error aborted the cycle; the checkpoint did not advance.
    Failed,
    /// Cancellation (or deadline expiry) was observed at a batch boundary.
    /// Not an error: partially applied batches remain applied and a rerun
    /// re-converges.
    Cancelled,
    /// No cycle ran: one was already in flight for this sync type.
    SkippedAlreadyRunning,
}

/// What a sync cycle produced.
#[derive(Debug, Clone)]
pub struct SyncResults {
    /// The sync type the cycle ran for.
    pub sync_type: String,
    /// How the cycle ended.
    pub outcome: SyncOutcome,
    /// Per-entity problems collected along the way. Never silently
    /// truncated.
    pub issues: Vec<SyncIssue>,
    /// Wall-clock duration of the cycle.
    pub elapsed: Duration,
    /// The fatal error message, when `outcome` is `Failed`.
    pub error: Option<String>,
}

impl SyncResults {
    /// A completed cycle.
    #[must_use]
    pub fn completed(sync_type: impl Into<String>, issues: Vec<SyncIssue>, elapsed: Duration) -> Self {
        Self {
            sync_type: sync_type.into(),
            outcome: SyncOutcome::Completed,
            issues,
            elapsed,
            error: None,
        }
    }

    /// A failed cycle.
    #[must_use]
    pub fn failed(
        sync_type: impl Into<String>,
        issues: Vec<SyncIssue>,
        elapsed: Duration,
        error: impl Into<String>,
    ) -> Self {
        Self {
            sync_type: sync_type.into(),
            outcome: SyncOutcome::Failed,
            issues,
            elapsed,
            error: Some(error.into()),
        }
    }

    /// A cancelled cycle.
    #[must_use]
    pub fn cancelled(sync_type: impl Into<String>, issues: Vec<SyncIssue>, elapsed: Duration) -> Self {
        Self {
            sync_type: sync_type.into(),
            outcome: SyncOutcome::Cancelled,
            issues,
            elapsed,
            error: None,
        }
    }

    /// A run request that found a cycle already in flight.
    #[must_use]
    pub fn skipped(sync_type: impl Into<String>) -> Self {
        Self {
            sync_type: sync_type.into(),
            outcome: SyncOutcome::SkippedAlreadyRunning,
            issues: Vec::new(),
            elapsed: Duration::ZERO,
            error: None,
        }
    }

    /// True only when the cycle completed *and* produced no issues.
    #[must_use]
    pub fn was_successful(&self) -> bool {
        self.outcome == SyncOutcome::Completed && self.issues.is_empty()
    }
}
