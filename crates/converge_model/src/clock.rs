//! Injectable time source.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;

/// The timestamp type used for modification ordering, tombstones, and
/// checkpoints.
pub type Timestamp = DateTime<Utc>;

/// A source of "current time".
///
/// Everything time-dependent in the sync core (entity `modified_on`,
/// tombstone `created_on`, checkpoint capture) reads through this trait so
/// test suites can control time deterministically.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Timestamp;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }
}

/// A manually driven clock for tests.
///
/// Starts at the Unix epoch unless constructed with [`ManualClock::at`];
/// advances only when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<Timestamp>,
}

impl ManualClock {
    /// Creates a clock pinned to the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        Self::at(DateTime::UNIX_EPOCH)
    }

    /// Creates a clock pinned to the given instant.
    #[must_use]
    pub fn at(now: Timestamp) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Moves the clock to the given instant.
    pub fn set(&self, now: Timestamp) {
        *self.now.write() = now;
    }

    /// Advances the clock by the given number of seconds.
    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.write();
        *now = *now + TimeDelta::seconds(secs);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.read()
    }
}
