//! Per-object serialization of reconciliations
//!
//! Reconciling an HPA is a read-decide-write on its annotations and floor.
//! Two of those running at once for the same HPA could both act on the same
//! stale snapshot, so notifications for one object are processed one at a
//! time while different objects proceed in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async mutexes keyed by object (`namespace/name`)
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        // Clone the Arc out so the shard lock is released before awaiting
        let mutex = self.locks.entry(key.to_string()).or_default().clone();
        mutex.lock_owned().await
    }

    /// Drop the entry for `key` unless someone is holding or waiting on it
    pub fn forget(&self, key: &str) {
        self.locks
            .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Number of keys currently tracked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// True when no keys are tracked
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
