//! # Converge Protocol
//!
//! Sync protocol types for Converge.
//!
//! This crate provides:
//! - `ChangeCursor` and `Page` for resumable, idempotent incremental pull
//! - `ClientDetails` for endpoint compatibility checks
//! - `ApplyOutcome` for batch application results
//! - `SyncIssue` for non-fatal per-entity problems
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod issue;
mod messages;
mod page;

pub use issue::{IssueKind, SyncIssue};
pub use messages::{ApplyOutcome, ClientDetails};
pub use page::{ChangeCursor, ChangeOrdered, Page};
