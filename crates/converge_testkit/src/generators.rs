//! Property-based test generators using proptest.
//!
//! Strategies generate data that maintains model invariants
//! (`modified_on >= created_on`, non-nil sync ids).

use crate::fixtures::at;
use converge_model::{EntityRecord, FieldValue, SyncId, Timestamp};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for non-nil sync ids.
pub fn sync_id_strategy() -> impl Strategy<Value = SyncId> {
    prop::array::uniform16(any::<u8>())
        .prop_map(SyncId::from_bytes)
        .prop_filter("sync id must not be nil", |id| !id.is_nil())
}

/// Strategy for timestamps within a bounded window after the epoch.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (0i64..1_000_000).prop_map(at)
}

/// Strategy for field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("invalid regex")
}

/// Strategy for field values.
///
/// No floats: NaN breaks the equality assertions idempotence tests rely
/// on.
pub fn field_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::Null),
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i64>().prop_map(FieldValue::Integer),
        "[a-zA-Z0-9 ]{0,24}".prop_map(FieldValue::Text),
        prop::collection::vec(any::<u8>(), 0..32).prop_map(FieldValue::Bytes),
        timestamp_strategy().prop_map(FieldValue::Timestamp),
        sync_id_strategy().prop_map(FieldValue::Reference),
    ]
}

/// Strategy for field maps.
pub fn fields_strategy() -> impl Strategy<Value = BTreeMap<String, FieldValue>> {
    prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..6)
}

/// Strategy for whole entity records with `modified_on >= created_on`.
pub fn entity_record_strategy() -> impl Strategy<Value = EntityRecord> {
    (
        sync_id_strategy(),
        0i64..500_000,
        0i64..500_000,
        fields_strategy(),
    )
        .prop_map(|(sync_id, created_secs, age_secs, fields)| {
            let mut record = EntityRecord::new(sync_id, at(created_secs));
            record.modified_on = at(created_secs + age_secs);
            record.fields = fields;
            record
        })
}
