//! End-to-end cycle tests over in-memory endpoints.

use converge_engine::{
    ConvertError, ConverterPair, ConverterRegistry, IdentityConvert, SyncEndpoint, SyncManager,
    SyncOptions, SyncOutcome, SyncProfile, SyncResult,
};
use converge_model::{
    EntityRecord, ExclusionRegistry, ExclusionSets, FieldValue, ManualClock, SyncId, Tombstone,
};
use converge_protocol::{ApplyOutcome, ChangeCursor, ClientDetails, IssueKind, Page};
use converge_store::{MemoryCheckpointStore, SyncRepository, TombstoneStore};
use converge_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Wraps an endpoint and sleeps on every pull, so cycles span a
/// controllable amount of wall-clock time.
struct SlowEndpoint {
    inner: Arc<dyn SyncEndpoint>,
    delay: Duration,
}

impl SlowEndpoint {
    fn new(inner: Arc<dyn SyncEndpoint>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl SyncEndpoint for SlowEndpoint {
    fn client_details(&self) -> SyncResult<ClientDetails> {
        self.inner.client_details()
    }

    fn get_changes(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> SyncResult<Page<EntityRecord>> {
        std::thread::sleep(self.delay);
        self.inner.get_changes(type_name, cursor, limit)
    }

    fn get_tombstones(
        &self,
        type_name: &str,
        cursor: &ChangeCursor,
        limit: usize,
    ) -> SyncResult<Page<Tombstone>> {
        self.inner.get_tombstones(type_name, cursor, limit)
    }

    fn apply_batch(
        &self,
        type_name: &str,
        entities: Vec<EntityRecord>,
        tombstones: Vec<Tombstone>,
    ) -> SyncResult<ApplyOutcome> {
        self.inner.apply_batch(type_name, entities, tombstones)
    }
}

fn manager_over(
    pair: &MemoryEndpointPair,
    local: Arc<dyn SyncEndpoint>,
    options: SyncOptions,
    clock: Arc<ManualClock>,
) -> SyncManager {
    let mut manager = SyncManager::new(Arc::new(MemoryCheckpointStore::new()), clock);
    manager
        .register(SyncProfile::new(
            options,
            local,
            Arc::clone(&pair.remote) as Arc<dyn SyncEndpoint>,
            identity_converters(&pair.type_name),
        ))
        .unwrap();
    manager
}

// Scenario A: a locally created entity propagates with its sync id, and
// the checkpoint advances past its modification time.
#[test]
fn local_create_reaches_the_remote_store() {
    let pair = MemoryEndpointPair::new("contact");
    let e1 = contact("Ada", 10);
    let u1 = e1.sync_id;
    pair.local_repo.upsert(e1).unwrap();

    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = pair.manager("accounts", Arc::clone(&clock));

    let results = manager.run("accounts", None, false).unwrap();
    assert!(results.was_successful());

    let remote = pair.remote_repo.find_by_sync_id(u1).unwrap().unwrap();
    assert_eq!(remote.sync_id, u1);
    assert_eq!(remote.field("name").and_then(FieldValue::as_text), Some("Ada"));
    assert_eq!(remote.modified_on, at(10));

    let checkpoint = manager.checkpoint("accounts").unwrap();
    assert!(checkpoint.last_synced_on_local >= at(10));
}

// Scenario B: a remote tombstone soft-deletes the local row and is
// recorded locally with the remote deletion instant.
#[test]
fn remote_tombstone_deletes_locally() {
    let pair = MemoryEndpointPair::new("contact");
    let e1 = contact("Ada", 10);
    let u1 = e1.sync_id;
    pair.local_repo.upsert(e1.clone()).unwrap();

    // The remote side soft-deleted its copy at t2 and holds the tombstone
    let mut remote_copy = e1;
    remote_copy.is_deleted = true;
    pair.remote_repo.upsert(remote_copy).unwrap();
    pair.remote_tombstones
        .record(Tombstone::new(u1.to_string(), u1, "contact", at(20)))
        .unwrap();

    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = pair.manager("accounts", clock);
    manager.run("accounts", None, false).unwrap();

    let local = pair.local_repo.find_by_sync_id(u1).unwrap().unwrap();
    assert!(local.is_deleted);

    let tombstone = pair
        .local_tombstones
        .latest_for(u1, "contact")
        .unwrap()
        .unwrap();
    assert_eq!(tombstone.created_on, at(20));
}

// Scenario C: three pending entities at batch size one transfer in exactly
// three get_changes calls against the local endpoint.
#[test]
fn batching_pages_through_pending_changes() {
    let pair = MemoryEndpointPair::new("contact");
    for (name, secs) in [("Ada", 10), ("Grace", 20), ("Edsger", 30)] {
        pair.local_repo.upsert(contact(name, secs)).unwrap();
    }

    let recording = Arc::new(RecordingEndpoint::new(
        Arc::clone(&pair.local) as Arc<dyn SyncEndpoint>
    ));
    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = manager_over(
        &pair,
        Arc::clone(&recording) as Arc<dyn SyncEndpoint>,
        SyncOptions::new("accounts")
            .with_type("contact")
            .with_items_per_batch(1),
        clock,
    );

    let results = manager.run("accounts", None, false).unwrap();
    assert!(results.was_successful());

    assert_eq!(recording.get_changes_calls(), 3);
    assert_eq!(pair.remote_repo.len(), 3);
}

// Scenario D: one conversion failure yields exactly one issue referencing
// the failing entity; the rest of the batch still applies.
#[test]
fn conversion_failure_is_isolated_to_one_entity() {
    let pair = MemoryEndpointPair::new("contact");
    let good_a = contact("Ada", 10);
    let bad = contact("reject-me", 20);
    let good_b = contact("Grace", 30);
    let bad_id = bad.sync_id;
    for record in [good_a, bad.clone(), good_b] {
        pair.local_repo.upsert(record).unwrap();
    }

    let mut converters = ConverterRegistry::new();
    converters.register(
        "contact",
        ConverterPair::new(
            Arc::new(IdentityConvert),
            Arc::new(|record: &EntityRecord| {
                if record.field("name").and_then(FieldValue::as_text) == Some("reject-me") {
                    Err(ConvertError::new("name is not transferable"))
                } else {
                    Ok(record.clone())
                }
            }),
        ),
    );

    let clock = Arc::new(ManualClock::at(at(100)));
    let mut manager = SyncManager::new(Arc::new(MemoryCheckpointStore::new()), clock);
    manager
        .register(SyncProfile::new(
            SyncOptions::new("accounts").with_type("contact"),
            Arc::clone(&pair.local) as Arc<dyn SyncEndpoint>,
            Arc::clone(&pair.remote) as Arc<dyn SyncEndpoint>,
            Arc::new(converters),
        ))
        .unwrap();

    let results = manager.run("accounts", None, false).unwrap();
    assert_eq!(results.outcome, SyncOutcome::Completed);
    assert!(!results.was_successful());

    assert_eq!(results.issues.len(), 1);
    assert_eq!(results.issues[0].sync_id, Some(bad_id));
    assert_eq!(results.issues[0].kind, IssueKind::Conversion);

    // Both healthy entities crossed over; the rejected one did not
    assert_eq!(pair.remote_repo.len(), 2);
    assert!(pair.remote_repo.find_by_sync_id(bad_id).unwrap().is_none());
}

// Exclusion enforcement: an incoming update never changes a field in the
// type's incoming exclusions, even when the payload differs.
#[test]
fn incoming_exclusions_survive_a_cycle() {
    let mut local_exclusions = ExclusionRegistry::new();
    local_exclusions.register("contact", ExclusionSets::new().exclude_incoming("email"));
    let pair =
        MemoryEndpointPair::with_exclusions("contact", local_exclusions, ExclusionRegistry::new());

    let mut local = contact("Ada", 10).with_field("email", "ada@local");
    let u1 = SyncId::new();
    local.sync_id = u1;
    pair.local_repo.upsert(local).unwrap();

    let mut remote = EntityRecord::new(u1, at(10))
        .with_field("name", "Ada L.")
        .with_field("email", "ada@remote");
    remote.modified_on = at(50);
    pair.remote_repo.upsert(remote).unwrap();

    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = pair.manager("accounts", clock);
    manager.run("accounts", None, false).unwrap();

    let merged = pair.local_repo.find_by_sync_id(u1).unwrap().unwrap();
    assert_eq!(
        merged.field("name").and_then(FieldValue::as_text),
        Some("Ada L.")
    );
    assert_eq!(
        merged.field("email").and_then(FieldValue::as_text),
        Some("ada@local")
    );
}

// Delete-wins: a tombstone and a conflicting update dated within the same
// window leave the entity deleted after the cycle.
#[test]
fn delete_wins_against_a_racing_update() {
    let pair = MemoryEndpointPair::new("contact");

    let e1 = contact("Ada", 10);
    let u1 = e1.sync_id;
    // Local updated the row at t=30
    let mut updated = e1.clone();
    updated.set_field("name", "Ada L.");
    updated.modified_on = at(30);
    pair.local_repo.upsert(updated).unwrap();

    // Remote deleted the row at t=30 in the same window
    pair.remote_tombstones
        .record(Tombstone::new(u1.to_string(), u1, "contact", at(30)))
        .unwrap();

    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = pair.manager("accounts", clock);
    let results = manager.run("accounts", None, false).unwrap();
    assert_eq!(results.outcome, SyncOutcome::Completed);

    // The local row is deleted; the stale update did not resurrect the
    // remote copy either
    assert!(pair.local_repo.find_by_sync_id(u1).unwrap().unwrap().is_deleted);
    match pair.remote_repo.find_by_sync_id(u1).unwrap() {
        Some(row) => assert!(row.is_deleted),
        None => {}
    }
}

// Running the same cycle twice converges to the same state (batches are
// idempotent; the second cycle re-delivers at most boundary duplicates).
#[test]
fn rerunning_a_cycle_is_idempotent() {
    let pair = MemoryEndpointPair::new("contact");
    for (name, secs) in [("Ada", 10), ("Grace", 20)] {
        pair.local_repo.upsert(contact(name, secs)).unwrap();
    }
    let gone = contact("Edsger", 5);
    let gone_id = gone.sync_id;
    pair.local_repo.upsert(gone).unwrap();
    pair.local_repo.mark_deleted(gone_id).unwrap();
    pair.local_tombstones
        .record(Tombstone::new(gone_id.to_string(), gone_id, "contact", at(6)))
        .unwrap();

    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = pair.manager("accounts", Arc::clone(&clock));

    manager.run("accounts", None, false).unwrap();
    let after_first = (
        pair.local_repo.records(),
        pair.remote_repo.records(),
        pair.remote_tombstones.len(),
    );

    clock.advance_secs(10);
    manager.run("accounts", None, false).unwrap();
    let after_second = (
        pair.local_repo.records(),
        pair.remote_repo.records(),
        pair.remote_tombstones.len(),
    );

    assert_eq!(after_first, after_second);
}

// Checkpoints never advance past a failed cycle and are monotone across
// successful ones.
#[test]
fn checkpoints_survive_failures_unchanged() {
    let pair = MemoryEndpointPair::new("contact");
    pair.local_repo.upsert(contact("Ada", 10)).unwrap();

    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = pair.manager("accounts", Arc::clone(&clock));

    manager.run("accounts", None, false).unwrap();
    let advanced = manager.checkpoint("accounts").unwrap();
    assert_eq!(advanced.last_synced_on_local, at(100));

    // A second manager over the same profile name but an incompatible
    // remote: the cycle fails and the (fresh) checkpoint stays at epoch
    let broken = MemoryEndpointPair::new("invoice");
    let clock2 = Arc::new(ManualClock::at(at(200)));
    let mut failing = SyncManager::new(Arc::new(MemoryCheckpointStore::new()), clock2);
    failing
        .register(SyncProfile::new(
            SyncOptions::new("accounts").with_type("contact"),
            Arc::clone(&pair.local) as Arc<dyn SyncEndpoint>,
            Arc::clone(&broken.remote) as Arc<dyn SyncEndpoint>,
            identity_converters("contact"),
        ))
        .unwrap();

    let results = failing.run("accounts", None, false).unwrap();
    assert_eq!(results.outcome, SyncOutcome::Failed);
    assert_eq!(
        failing.checkpoint("accounts").unwrap(),
        converge_store::Checkpoint::epoch()
    );
}

// Single-flight: a concurrent run for the same sync type never starts a
// second cycle.
#[test]
fn concurrent_run_is_skipped() {
    let pair = MemoryEndpointPair::new("contact");
    for secs in [10, 20, 30] {
        pair.local_repo.upsert(contact("Ada", secs)).unwrap();
    }

    let slow = Arc::new(SlowEndpoint::new(
        Arc::clone(&pair.local) as Arc<dyn SyncEndpoint>,
        Duration::from_millis(80),
    ));
    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = Arc::new(manager_over(
        &pair,
        slow as Arc<dyn SyncEndpoint>,
        SyncOptions::new("accounts")
            .with_type("contact")
            .with_items_per_batch(1),
        clock,
    ));

    let background = {
        let manager = Arc::clone(&manager);
        std::thread::spawn(move || manager.run("accounts", None, false).unwrap())
    };

    // Give the background cycle time to claim the slot
    std::thread::sleep(Duration::from_millis(30));
    let second = manager.run("accounts", None, false).unwrap();
    assert_eq!(second.outcome, SyncOutcome::SkippedAlreadyRunning);

    let first = background.join().unwrap();
    assert_eq!(first.outcome, SyncOutcome::Completed);
}

// Force: a waiting run cancels the in-flight cycle at a batch boundary
// and then runs its own.
#[test]
fn forced_run_cancels_the_previous_cycle() {
    let pair = MemoryEndpointPair::new("contact");
    for secs in [10, 20, 30, 40, 50] {
        pair.local_repo.upsert(contact("Ada", secs)).unwrap();
    }

    let slow = Arc::new(SlowEndpoint::new(
        Arc::clone(&pair.local) as Arc<dyn SyncEndpoint>,
        Duration::from_millis(60),
    ));
    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = Arc::new(manager_over(
        &pair,
        slow as Arc<dyn SyncEndpoint>,
        SyncOptions::new("accounts")
            .with_type("contact")
            .with_items_per_batch(1),
        clock,
    ));

    let background = {
        let manager = Arc::clone(&manager);
        std::thread::spawn(move || manager.run("accounts", None, false).unwrap())
    };

    std::thread::sleep(Duration::from_millis(30));
    let forced = manager
        .run("accounts", Some(Duration::from_millis(10)), true)
        .unwrap();
    let first = background.join().unwrap();

    assert_eq!(first.outcome, SyncOutcome::Cancelled);
    assert_eq!(forced.outcome, SyncOutcome::Completed);
    // The forced cycle re-ran against the unadvanced checkpoint, so every
    // entity still crossed over
    assert_eq!(pair.remote_repo.len(), 5);
}

// Waiting without force reports that the previous cycle never completed.
#[test]
fn waiting_without_force_reports_failure() {
    let pair = MemoryEndpointPair::new("contact");
    for secs in [10, 20, 30] {
        pair.local_repo.upsert(contact("Ada", secs)).unwrap();
    }

    let slow = Arc::new(SlowEndpoint::new(
        Arc::clone(&pair.local) as Arc<dyn SyncEndpoint>,
        Duration::from_millis(80),
    ));
    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = Arc::new(manager_over(
        &pair,
        slow as Arc<dyn SyncEndpoint>,
        SyncOptions::new("accounts")
            .with_type("contact")
            .with_items_per_batch(1),
        clock,
    ));

    let background = {
        let manager = Arc::clone(&manager);
        std::thread::spawn(move || manager.run("accounts", None, false).unwrap())
    };

    std::thread::sleep(Duration::from_millis(30));
    let waited = manager
        .run("accounts", Some(Duration::from_millis(10)), false)
        .unwrap();
    assert_eq!(waited.outcome, SyncOutcome::Failed);
    assert!(waited.error.unwrap().contains("never completed"));

    background.join().unwrap();
}

// A zero timeout expires before the first batch: the cycle reports
// cancelled, not failed, and may simply be rerun.
#[test]
fn timeout_behaves_as_cancellation() {
    let pair = MemoryEndpointPair::new("contact");
    pair.local_repo.upsert(contact("Ada", 10)).unwrap();

    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = pair.manager_with_options(
        SyncOptions::new("accounts")
            .with_type("contact")
            .with_timeout(Duration::ZERO),
        Arc::clone(&clock),
    );

    let results = manager.run("accounts", None, false).unwrap();
    assert_eq!(results.outcome, SyncOutcome::Cancelled);
    assert!(results.error.is_none());
    assert_eq!(
        manager.checkpoint("accounts").unwrap(),
        converge_store::Checkpoint::epoch()
    );
}

// Suppressed issue details keep the issue but drop the message detail.
#[test]
fn issue_details_can_be_suppressed() {
    let pair = MemoryEndpointPair::new("contact");
    let orphan = contact("Ada", 10).with_field("team", SyncId::new());
    pair.local_repo.upsert(orphan).unwrap();

    let clock = Arc::new(ManualClock::at(at(100)));
    let manager = pair.manager_with_options(
        SyncOptions::new("accounts")
            .with_type("contact")
            .with_issue_details(false),
        clock,
    );

    let results = manager.run("accounts", None, false).unwrap();
    assert_eq!(results.issues.len(), 1);
    assert_eq!(results.issues[0].kind, IssueKind::UnresolvedReference);
    assert_eq!(results.issues[0].message, "unresolved reference");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Applying the same batch twice through an endpoint produces the same
    // final state as applying it once.
    #[test]
    fn batch_application_is_idempotent(
        records in prop::collection::vec(entity_record_strategy(), 1..8)
    ) {
        let pair = MemoryEndpointPair::new("contact");

        pair.local
            .apply_batch("contact", records.clone(), Vec::new())
            .unwrap();
        let once = pair.local_repo.records();

        pair.local
            .apply_batch("contact", records, Vec::new())
            .unwrap();
        let twice = pair.local_repo.records();

        prop_assert_eq!(once, twice);
    }
}
