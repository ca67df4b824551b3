//! Non-fatal per-entity problems collected during a cycle.

use converge_model::SyncId;
use serde::{Deserialize, Serialize};

/// Classification of a per-entity sync problem.
///
/// All kinds here are non-fatal: they are recorded and the batch loop
/// continues. Cycle-aborting conditions are errors, not issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// A converter rejected the entity.
    Conversion,
    /// A relationship's sync id could not be resolved locally after the
    /// batch post-pass.
    UnresolvedReference,
    /// The storage layer rejected the write (constraint violation).
    Constraint,
    /// Any other per-entity apply failure.
    Apply,
}

impl IssueKind {
    /// Short label used when issue details are suppressed.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            IssueKind::Conversion => "conversion failed",
            IssueKind::UnresolvedReference => "unresolved reference",
            IssueKind::Constraint => "constraint violation",
            IssueKind::Apply => "apply failed",
        }
    }
}

/// A non-fatal, per-entity problem observed during a sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncIssue {
    /// The affected entity's sync id, when known.
    pub sync_id: Option<SyncId>,
    /// Human-meaningful reference to the affected entity.
    pub reference: String,
    /// The entity type involved.
    pub type_name: String,
    /// Description of what went wrong.
    pub message: String,
    /// Classification.
    pub kind: IssueKind,
}

impl SyncIssue {
    /// Creates an issue.
    #[must_use]
    pub fn new(
        sync_id: Option<SyncId>,
        type_name: impl Into<String>,
        message: impl Into<String>,
        kind: IssueKind,
    ) -> Self {
        let reference = sync_id.map(|id| id.to_string()).unwrap_or_default();
        Self {
            sync_id,
            reference,
            type_name: type_name.into(),
            message: message.into(),
            kind,
        }
    }

    /// A conversion failure for one entity.
    #[must_use]
    pub fn conversion(sync_id: SyncId, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Some(sync_id), type_name, message, IssueKind::Conversion)
    }

    /// An unresolved relationship reference.
    #[must_use]
    pub fn unresolved_reference(
        sync_id: SyncId,
        type_name: impl Into<String>,
        field: &str,
        target: SyncId,
    ) -> Self {
        Self::new(
            Some(sync_id),
            type_name,
            format!("reference field '{field}' targets unknown sync id {target}"),
            IssueKind::UnresolvedReference,
        )
    }

    /// A storage constraint violation.
    #[must_use]
    pub fn constraint(sync_id: SyncId, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Some(sync_id), type_name, message, IssueKind::Constraint)
    }

    /// Returns a copy with the message reduced to the kind label.
    ///
    /// Used when the caller did not ask for issue details; the issue itself
    /// is never dropped.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            message: self.kind.label().to_string(),
            ..self.clone()
        }
    }
}
