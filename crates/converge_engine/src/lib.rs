//! # Converge Engine
//!
//! Bidirectional sync engine and manager for Converge.
//!
//! This crate provides:
//! - Sync state machine (`NotStarted` → pulling/converting/applying →
//!   `Completed`, with `Cancelled`/`Failed` terminals)
//! - Converter pipeline between remote and local entity shapes
//! - `SyncEndpoint` abstraction over one side's storage, with a
//!   store-backed reference implementation
//! - `SyncManager` owning checkpoints, single-flight, and cancellation
//!
//! ## Architecture
//!
//! A cycle moves data symmetrically between two endpoints, one bounded
//! batch at a time, per configured entity type:
//! 1. Pull local changes, convert outgoing, apply to remote
//! 2. Pull remote changes, convert incoming, apply to local
//! 3. Pull and apply tombstones from both sides, after the same batch's
//!    entity writes (delete wins within a window)
//!
//! ## Key Invariants
//!
//! - Batches are individually idempotent; a resumed cycle re-converges
//! - Per-entity failures are issues, never cycle aborts
//! - Checkpoints advance to the cycle-*start* capture, only on success
//! - Cancellation is observed at batch boundaries only
//! - At most one cycle per sync type is in flight at any time

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod cancel;
mod config;
mod convert;
mod endpoint;
mod engine;
mod error;
mod manager;
mod results;
mod state;

pub use cancel::CancelToken;
pub use config::SyncOptions;
pub use convert::{ConvertError, ConverterPair, ConverterRegistry, EntityConverter, IdentityConvert};
pub use endpoint::{EligibilityPredicate, RepositoryFilter, StoreEndpoint, SyncEndpoint};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use manager::{SyncManager, SyncProfile};
pub use results::{SyncOutcome, SyncResults};
pub use state::{PhaseTracker, SyncPhase};
