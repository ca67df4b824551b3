//! Per-sync-type watermark persistence.

use crate::error::StoreResult;
use converge_model::Timestamp;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The watermarks of one sync type: the `modified_on` instants up to which
/// each side's changes have been fully incorporated by the other.
///
/// Advanced by the sync manager to the timestamp captured at cycle *start*,
/// and only after a fully successful cycle, staying conservative under partial
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Watermark for changes pulled from the local side.
    pub last_synced_on_local: Timestamp,
    /// Watermark for changes pulled from the remote side.
    pub last_synced_on_remote: Timestamp,
}

impl Checkpoint {
    /// A checkpoint at the Unix epoch, meaning "nothing synced yet".
    #[must_use]
    pub fn epoch() -> Self {
        Self {
            last_synced_on_local: chrono::DateTime::UNIX_EPOCH,
            last_synced_on_remote: chrono::DateTime::UNIX_EPOCH,
        }
    }

    /// Returns a checkpoint with both watermarks advanced to `at`.
    ///
    /// Watermarks never move backwards.
    #[must_use]
    pub fn advanced_to(&self, at: Timestamp) -> Self {
        Self {
            last_synced_on_local: self.last_synced_on_local.max(at),
            last_synced_on_remote: self.last_synced_on_remote.max(at),
        }
    }

    /// The older of the two watermarks.
    #[must_use]
    pub fn oldest(&self) -> Timestamp {
        self.last_synced_on_local.min(self.last_synced_on_remote)
    }
}

/// Persistence for per-sync-type checkpoints.
///
/// Checkpoints must survive process restart; the manager reads them at
/// startup and writes them back only on a successful cycle.
pub trait CheckpointStore: Send + Sync {
    /// Loads the checkpoint for a sync type, if one was ever saved.
    fn load(&self, sync_type: &str) -> StoreResult<Option<Checkpoint>>;

    /// Saves the checkpoint for a sync type.
    fn save(&self, sync_type: &str, checkpoint: Checkpoint) -> StoreResult<()>;

    /// Every known `(sync type, checkpoint)` pair.
    ///
    /// Used to compute the safe tombstone-purge cutoff: the oldest watermark
    /// across all peers.
    fn all(&self) -> StoreResult<Vec<(String, Checkpoint)>>;
}

/// An in-memory checkpoint store for tests and embedded use.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: RwLock<HashMap<String, Checkpoint>>,
}

impl MemoryCheckpointStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, sync_type: &str) -> StoreResult<Option<Checkpoint>> {
        Ok(self.checkpoints.read().get(sync_type).copied())
    }

    fn save(&self, sync_type: &str, checkpoint: Checkpoint) -> StoreResult<()> {
        self.checkpoints
            .write()
            .insert(sync_type.to_string(), checkpoint);
        Ok(())
    }

    fn all(&self) -> StoreResult<Vec<(String, Checkpoint)>> {
        Ok(self
            .checkpoints
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }
}

/// A checkpoint store persisted as a JSON file.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// crash mid-save leaves the previous checkpoint intact.
#[derive(Debug)]
pub struct JsonCheckpointStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, Checkpoint>>,
}

impl JsonCheckpointStore {
    /// Opens (or initializes) the store at `path`.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        let cache = if path.exists() {
            let bytes = fs::read(&path)?;
            serde_json::from_slice(&bytes)?
        } else {
            HashMap::new()
        };
        debug!(path = %path.display(), entries = cache.len(), "opened checkpoint store");
        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// The file this store persists to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, cache: &HashMap<String, Checkpoint>) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(cache)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self, sync_type: &str) -> StoreResult<Option<Checkpoint>> {
        Ok(self.cache.read().get(sync_type).copied())
    }

    fn save(&self, sync_type: &str, checkpoint: Checkpoint) -> StoreResult<()> {
        let mut cache = self.cache.write();
        cache.insert(sync_type.to_string(), checkpoint);
        self.persist(&cache)
    }

    fn all(&self) -> StoreResult<Vec<(String, Checkpoint)>> {
        Ok(self
            .cache
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }
}
