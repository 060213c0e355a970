//! Key Lock Module
//!
//! Per-key async locks used to collapse concurrent loads of the same missing key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type KeyMutex = Arc<AsyncMutex<()>>;

// == Key Lock Table ==
/// Registry of per-key exclusive locks.
///
/// A lock is created the first time its key is locked and dropped from the
/// table once the last holder releases it with nobody waiting, so the table
/// only holds keys that are currently contended.
#[derive(Debug)]
pub struct KeyLockTable<K> {
    locks: Mutex<HashMap<K, KeyMutex>>,
}

impl<K> Default for KeyLockTable<K> {
    fn default() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<K> KeyLockTable<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    // == Lock ==
    /// Waits for exclusive access to `key`.
    ///
    /// Access is released when the returned guard is dropped.
    pub async fn lock(&self, key: &K) -> KeyLockGuard<'_, K> {
        let mutex = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(key.clone()).or_default())
        };

        let guard = mutex.lock_owned().await;
        KeyLockGuard {
            table: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    // == Length ==
    /// Returns the number of keys with a live lock.
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Key Lock Guard ==
/// Exclusive access to one key of a [`KeyLockTable`].
#[derive(Debug)]
pub struct KeyLockGuard<'a, K>
where
    K: Hash + Eq,
{
    table: &'a KeyLockTable<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K> Drop for KeyLockGuard<'_, K>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        // Waiters clone the mutex under the table lock, so the count is stable here
        let mut locks = self.table.locks.lock();
        let Some(guard) = self.guard.take() else {
            return;
        };
        let mutex = Arc::clone(OwnedMutexGuard::mutex(&guard));
        drop(guard);

        // One reference in the table, one here
        if Arc::strong_count(&mutex) == 2 {
            locks.remove(&self.key);
        }
    }
}
