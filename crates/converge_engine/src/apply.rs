//! Batch application semantics.
//!
//! Everything here is all-or-nothing *per entity* and idempotent *per
//! batch*: applying the same `(entities, tombstones)` batch twice produces
//! the same final state as applying it once.

use converge_model::{EntityRecord, ExclusionRegistry, FieldDirection, Tombstone};
use converge_protocol::{ApplyOutcome, IssueKind, SyncIssue};
use converge_store::{StoreError, SyncRepository, TombstoneStore};
use tracing::debug;

/// Applies a batch of incoming entities to a repository.
///
/// Entities are applied in `(modified_on, sync_id)` order. For each:
/// - a local tombstone dated at or after the entity's `modified_on` makes
///   the entity a stale update and it is skipped (delete wins);
/// - an existing row with a later `modified_on` wins (last writer wins)
///   and the incoming payload is skipped;
/// - otherwise the row is created (incoming exclusions) or merged
///   (sync-update exclusions) and written in one piece.
///
/// Once every entity of the batch is written, a post-pass re-resolves each
/// `Reference` field to a local key, so forward references within the
/// batch resolve regardless of arrival order. An unresolvable reference
/// becomes an [`IssueKind::UnresolvedReference`] issue.
pub(crate) fn apply_entities(
    repo: &dyn SyncRepository,
    tombstones: &dyn TombstoneStore,
    exclusions: &ExclusionRegistry,
    type_name: &str,
    mut entities: Vec<EntityRecord>,
) -> ApplyOutcome {
    entities.sort_by_key(EntityRecord::sort_key);

    let mut applied = 0;
    let mut issues = Vec::new();
    let mut written: Vec<EntityRecord> = Vec::new();

    for incoming in entities {
        if incoming.sync_id.is_nil() {
            issues.push(SyncIssue::new(
                None,
                type_name,
                "entity arrived without a sync id",
                IssueKind::Apply,
            ));
            continue;
        }

        match tombstones.latest_for(incoming.sync_id, type_name) {
            Ok(Some(tombstone)) if tombstone.created_on >= incoming.modified_on => {
                debug!(
                    sync_id = %incoming.sync_id,
                    type_name,
                    "skipping update older than local tombstone"
                );
                continue;
            }
            Ok(_) => {}
            Err(err) => {
                issues.push(apply_issue(&incoming, type_name, &err));
                continue;
            }
        }

        let existing = match repo.find_by_sync_id(incoming.sync_id) {
            Ok(existing) => existing,
            Err(err) => {
                issues.push(apply_issue(&incoming, type_name, &err));
                continue;
            }
        };

        let merged = match existing {
            None => build_created(&incoming, exclusions, type_name),
            Some(current) => {
                if current.modified_on > incoming.modified_on {
                    // Local copy is newer; it propagates the other way.
                    continue;
                }
                merge_update(current, &incoming, exclusions, type_name)
            }
        };

        match repo.upsert(merged.clone()) {
            Ok(_) => {
                applied += 1;
                written.push(merged);
            }
            Err(StoreError::Constraint { message }) => {
                issues.push(SyncIssue::constraint(incoming.sync_id, type_name, message));
            }
            Err(err) => issues.push(apply_issue(&incoming, type_name, &err)),
        }
    }

    for record in &written {
        for (field, target) in record.references() {
            match repo.resolve_local_key(target) {
                Ok(Some(local_key)) => {
                    if let Err(err) = repo.bind_reference(record.sync_id, field, local_key) {
                        issues.push(apply_issue(record, type_name, &err));
                    }
                }
                Ok(None) => {
                    issues.push(SyncIssue::unresolved_reference(
                        record.sync_id,
                        type_name,
                        field,
                        target,
                    ));
                }
                Err(err) => issues.push(apply_issue(record, type_name, &err)),
            }
        }
    }

    ApplyOutcome::new(applied, issues)
}

/// Applies a batch of incoming tombstones to a repository.
///
/// The matching row is soft-deleted (or removed when `permanent` is set),
/// and the tombstone is recorded locally *with the incoming `created_on`*,
/// so the deletion instant survives further propagation. A tombstone whose
/// row is unknown here is still recorded: the row may arrive later from a
/// third endpoint, and the deletion must not be lost. A row modified after
/// the deletion instant is a re-creation and is left in place.
pub(crate) fn apply_tombstones(
    repo: &dyn SyncRepository,
    tombstones: &dyn TombstoneStore,
    type_name: &str,
    mut batch: Vec<Tombstone>,
    permanent: bool,
) -> ApplyOutcome {
    batch.sort_by_key(Tombstone::sort_key);

    let mut applied = 0;
    let mut issues = Vec::new();

    for tombstone in batch {
        if tombstone.sync_id.is_nil() {
            issues.push(SyncIssue::new(
                None,
                type_name,
                "tombstone arrived without a sync id",
                IssueKind::Apply,
            ));
            continue;
        }

        // A row written after the deletion instant is a re-creation; a
        // re-delivered tombstone must not wipe it. Ties delete: an update
        // and a delete at the same instant resolve delete-wins.
        let recreated = match repo.find_by_sync_id(tombstone.sync_id) {
            Ok(Some(row)) => row.modified_on > tombstone.created_on,
            Ok(None) => false,
            Err(err) => {
                issues.push(SyncIssue::new(
                    Some(tombstone.sync_id),
                    type_name,
                    err.to_string(),
                    IssueKind::Apply,
                ));
                continue;
            }
        };

        let deleted = if recreated {
            Ok(false)
        } else if permanent {
            repo.remove(tombstone.sync_id)
        } else {
            repo.mark_deleted(tombstone.sync_id)
        };

        if let Err(err) = deleted {
            issues.push(SyncIssue::new(
                Some(tombstone.sync_id),
                type_name,
                err.to_string(),
                IssueKind::Apply,
            ));
            continue;
        }

        match tombstones.record(tombstone.clone()) {
            Ok(()) => applied += 1,
            Err(err) => issues.push(SyncIssue::new(
                Some(tombstone.sync_id),
                type_name,
                err.to_string(),
                IssueKind::Apply,
            )),
        }
    }

    ApplyOutcome::new(applied, issues)
}

/// The created row: incoming metadata plus every field the type's
/// *incoming* exclusions admit.
fn build_created(
    incoming: &EntityRecord,
    exclusions: &ExclusionRegistry,
    type_name: &str,
) -> EntityRecord {
    let mut created = EntityRecord::new(incoming.sync_id, incoming.created_on);
    created.modified_on = incoming.modified_on;
    created.is_deleted = incoming.is_deleted;
    for (name, value) in &incoming.fields {
        if exclusions.should_apply_field(type_name, name, FieldDirection::Incoming) {
            created.fields.insert(name.clone(), value.clone());
        }
    }
    created
}

/// The merged row: the current row with every field the type's
/// *sync-update* exclusions admit overwritten from the incoming record.
/// Excluded fields and fields the incoming record does not carry keep
/// their current values. `created_on` never changes; `modified_on` takes
/// the incoming value (a suppressed touch: stamping local time here would
/// make every applied row re-eligible for outbound transfer).
fn merge_update(
    mut current: EntityRecord,
    incoming: &EntityRecord,
    exclusions: &ExclusionRegistry,
    type_name: &str,
) -> EntityRecord {
    current.modified_on = incoming.modified_on;
    current.is_deleted = incoming.is_deleted;
    for (name, value) in &incoming.fields {
        if exclusions.should_apply_field(type_name, name, FieldDirection::SyncUpdate) {
            current.fields.insert(name.clone(), value.clone());
        }
    }
    current
}

fn apply_issue(record: &EntityRecord, type_name: &str, err: &StoreError) -> SyncIssue {
    SyncIssue::new(
        Some(record.sync_id),
        type_name,
        err.to_string(),
        IssueKind::Apply,
    )
}
