//! # Converge Store
//!
//! Storage collaborator contracts and reference stores for Converge.
//!
//! This crate provides:
//! - `SyncRepository`, the per-type storage contract the engine reads and
//!   writes entities through
//! - `TombstoneStore`, the append-only deletion record store
//! - `CheckpointStore`, persistence for per-sync-type watermarks
//! - In-memory reference implementations of all three, plus a JSON-file
//!   checkpoint store that survives process restart
//!
//! The engine never touches storage it does not own: each endpoint mutates
//! only its own repositories and tombstone store, and checkpoints are
//! mutated only by the sync manager.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod checkpoint;
mod error;
mod memory;
mod repository;
mod tombstones;

pub use checkpoint::{Checkpoint, CheckpointStore, JsonCheckpointStore, MemoryCheckpointStore};
pub use error::{StoreError, StoreResult};
pub use memory::MemoryRepository;
pub use repository::{LocalKey, SyncRepository};
pub use tombstones::{MemoryTombstoneStore, TombstoneStore};
