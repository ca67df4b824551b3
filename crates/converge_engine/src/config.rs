//! Configuration for sync cycles.

use std::time::Duration;

/// Configuration of one sync type: a named logical partition of the
/// dataset synchronized together as one unit.
///
/// Per-type repository bindings and eligibility predicates live on the
/// [`StoreEndpoint`](crate::StoreEndpoint); converter pairs live in the
/// [`ConverterRegistry`](crate::ConverterRegistry). The checkpoints
/// themselves are owned by the manager's
/// [`CheckpointStore`](converge_store::CheckpointStore).
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Name of the sync type (e.g. `"accounts"`, `"all"`).
    pub sync_type: String,
    /// Maximum entities or tombstones per transferred batch.
    pub items_per_batch: usize,
    /// Hard-delete rows when applying tombstones instead of soft-deleting.
    pub permanent_deletions: bool,
    /// Keep full issue messages; when false, messages are reduced to the
    /// issue-kind label (issues are never dropped either way).
    pub include_issue_details: bool,
    /// Wall-clock budget for one cycle; expiry behaves as cancellation.
    pub timeout: Option<Duration>,
    /// The entity types this sync type covers, in sync order.
    pub types: Vec<String>,
}

impl SyncOptions {
    /// Creates options with defaults: 100 items per batch, soft deletions,
    /// full issue details, no timeout.
    #[must_use]
    pub fn new(sync_type: impl Into<String>) -> Self {
        Self {
            sync_type: sync_type.into(),
            items_per_batch: 100,
            permanent_deletions: false,
            include_issue_details: true,
            timeout: None,
            types: Vec::new(),
        }
    }

    /// Adds an entity type to this sync type, builder style.
    #[must_use]
    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.types.push(type_name.into());
        self
    }

    /// Sets the batch size.
    #[must_use]
    pub fn with_items_per_batch(mut self, items: usize) -> Self {
        self.items_per_batch = items.max(1);
        self
    }

    /// Enables hard deletion on tombstone apply.
    #[must_use]
    pub fn with_permanent_deletions(mut self, permanent: bool) -> Self {
        self.permanent_deletions = permanent;
        self
    }

    /// Controls issue message verbosity.
    #[must_use]
    pub fn with_issue_details(mut self, include: bool) -> Self {
        self.include_issue_details = include;
        self
    }

    /// Sets the per-cycle wall-clock timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_accumulates() {
        let options = SyncOptions::new("accounts")
            .with_type("contact")
            .with_type("invoice")
            .with_items_per_batch(25)
            .with_permanent_deletions(true)
            .with_timeout(Duration::from_secs(30));

        assert_eq!(options.sync_type, "accounts");
        assert_eq!(options.types, vec!["contact", "invoice"]);
        assert_eq!(options.items_per_batch, 25);
        assert!(options.permanent_deletions);
        assert!(options.include_issue_details);
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn batch_size_has_a_floor() {
        let options = SyncOptions::new("all").with_items_per_batch(0);
        assert_eq!(options.items_per_batch, 1);
    }
}
