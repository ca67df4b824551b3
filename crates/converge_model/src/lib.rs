//! # Converge Model
//!
//! Entity identity, field values, and exclusion policy for Converge.
//!
//! This crate provides:
//! - `SyncId` for durable, storage-independent entity identity
//! - `EntityRecord` and `FieldValue` for the transfer shape of an entity
//! - `ExclusionRegistry` for per-type, per-direction field authority rules
//! - `Tombstone` for deletion propagation records
//! - `Clock` abstraction for deterministic time in tests
//!
//! This is a pure model crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod entity;
mod exclusion;
mod id;
mod tombstone;
mod value;

pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use entity::EntityRecord;
pub use exclusion::{ExclusionRegistry, ExclusionSets, FieldDirection};
pub use id::SyncId;
pub use tombstone::Tombstone;
pub use value::FieldValue;
