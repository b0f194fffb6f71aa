//! In-flight task registry.
//!
//! Holds the keys currently being generated, nothing else. Lives as long
//! as the process; deduplication is therefore per process.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use super::GenerationKey;

/// Set of in-flight generation keys (in-memory, lock-free).
#[derive(Clone, Default)]
pub struct TaskRegistry {
    /// Key -> time the owning worker was admitted
    in_flight: Arc<DashMap<GenerationKey, DateTime<Utc>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `key` if absent.
    ///
    /// Returns `true` iff this caller now owns the in-flight task. Exactly
    /// one of any number of concurrent callers wins.
    pub fn try_acquire(&self, key: GenerationKey) -> bool {
        match self.in_flight.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Utc::now());
                debug!("Acquired {}", key);
                true
            }
        }
    }

    /// Remove `key` unconditionally.
    pub fn release(&self, key: GenerationKey) {
        if let Some((_, started)) = self.in_flight.remove(&key) {
            let elapsed = Utc::now() - started;
            debug!("Released {} after {}ms", key, elapsed.num_milliseconds());
        }
    }

    /// Acquire `key` and tie its release to the returned guard.
    pub fn acquire(&self, key: GenerationKey) -> Option<InFlightGuard> {
        self.try_acquire(key).then(|| InFlightGuard {
            registry: self.clone(),
            key,
        })
    }

    pub fn contains(&self, key: &GenerationKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.in_flight.len()
    }
}

/// Ownership of one in-flight key. Dropping it releases the key, so the
/// key is freed on success, failure, timeout and panic alike.
#[must_use = "dropping the guard releases the key immediately"]
pub struct InFlightGuard {
    registry: TaskRegistry,
    key: GenerationKey,
}

impl InFlightGuard {
    pub fn key(&self) -> GenerationKey {
        self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.release(self.key);
    }
}

impl std::fmt::Debug for InFlightGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightGuard").field("key", &self.key).finish()
    }
}
