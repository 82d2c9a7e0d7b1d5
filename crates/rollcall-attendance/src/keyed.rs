//! Per-key async locks.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, MutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

/// A lazily populated map of async mutexes, one per key.
///
/// Entries are removed again once nobody holds or waits on them, so the
/// map only ever contains keys with work in flight. The map itself sits
/// behind a std mutex that is never held across an await.
#[derive(Debug)]
pub(crate) struct KeyedLocks<K> {
    locks: std::sync::Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

/// Exclusive access to one key. Dropping it releases the key, whether the
/// work finished or the future holding it was cancelled.
pub(crate) struct KeyGuard<'a, K: Eq + Hash> {
    owner: &'a KeyedLocks<K>,
    key: K,
    slot: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<K, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for exclusive access to `key`.
    pub(crate) async fn acquire(&self, key: K) -> KeyGuard<'_, K> {
        let slot = Arc::clone(self.map().entry(key.clone()).or_default());
        // Built before waiting so a cancelled acquire still cleans up.
        let mut held = KeyGuard {
            owner: self,
            key,
            slot,
            guard: None,
        };
        held.guard = Some(Arc::clone(&held.slot).lock_owned().await);
        held
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map().len()
    }
}

impl<K: Eq + Hash> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.owner.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one in `slot`: nobody else is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            locks.remove(&self.key);
        }
    }
}
