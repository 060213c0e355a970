//! Cache Store Module
//!
//! Eviction engine combining a HashMap index with the recency list and lazy TTL expiration.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::cache::{CacheEntry, CacheStats, RecencyList};

// == Removal Notification ==
/// Why an entry left the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalCause {
    /// Dropped as least recently used to make room for a new key
    Evicted,
    /// Removed by an explicit delete
    Deleted,
    /// Removed by a bulk clear
    Cleared,
}

/// Observer called with the key and value of every entry that leaves the store.
pub type RemovalHook<K, V> = Arc<dyn Fn(&K, &V, RemovalCause) + Send + Sync>;

// == Lookup Result ==
/// Outcome of a store lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    /// Present and within its TTL
    Fresh(V),
    /// Present but past its TTL; the stale value is still returned
    Expired(V),
    /// Not in the store
    Missing,
}

impl<V> Lookup<V> {
    /// Returns the value of a fresh lookup.
    pub fn fresh(self) -> Option<V> {
        match self {
            Lookup::Fresh(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Lookup::Missing)
    }
}

// == Store State ==
/// Everything guarded by the store mutex.
struct StoreState<K, V> {
    /// Key to recency list handle
    index: HashMap<K, usize>,
    /// Entries in recency order
    order: RecencyList<K, V>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    capacity: NonZeroUsize,
    /// TTL for entries set without an explicit one
    default_ttl: Option<Duration>,
}

impl<K, V> StoreState<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    fn lookup(&mut self, key: &K, now: Instant) -> Lookup<V> {
        let Some(&handle) = self.index.get(key) else {
            self.stats.record_miss();
            return Lookup::Missing;
        };
        let Some(entry) = self.order.get(handle) else {
            self.stats.record_miss();
            return Lookup::Missing;
        };

        let value = entry.value.clone();
        if entry.is_expired_at(now) {
            // Expired entries keep their position until overwritten or evicted
            self.stats.record_expired();
            return Lookup::Expired(value);
        }

        self.stats.record_hit();
        self.order.move_to_front(handle);
        Lookup::Fresh(value)
    }

    fn peek_fresh(&mut self, key: &K, now: Instant) -> Option<V> {
        let handle = *self.index.get(key)?;
        let entry = self.order.get(handle)?;
        if entry.is_expired_at(now) {
            return None;
        }
        let value = entry.value.clone();
        self.order.move_to_front(handle);
        Some(value)
    }

    fn insert(&mut self, key: K, value: V, ttl: Option<Duration>) -> Vec<CacheEntry<K, V>> {
        let ttl = ttl.or(self.default_ttl);

        // Overwrite keeps the slot, only the position moves
        if let Some(&handle) = self.index.get(&key) {
            if let Some(entry) = self.order.get_mut(handle) {
                entry.refresh(value, ttl);
            }
            self.order.move_to_front(handle);
            return Vec::new();
        }

        let handle = self.order.push_front(CacheEntry::new(key.clone(), value, ttl));
        self.index.insert(key, handle);

        // One tail per insert, more only if the capacity was lowered
        let mut evicted = Vec::new();
        while self.order.len() > self.capacity.get() {
            let Some(entry) = self.order.pop_back() else {
                break;
            };
            self.index.remove(&entry.key);
            self.stats.record_eviction();
            evicted.push(entry);
        }

        self.stats.set_total_entries(self.index.len());
        evicted
    }

    fn remove(&mut self, key: &K) -> Option<CacheEntry<K, V>> {
        let handle = self.index.remove(key)?;
        let entry = self.order.remove(handle);
        self.stats.set_total_entries(self.index.len());
        entry
    }

    fn drain(&mut self) -> Vec<CacheEntry<K, V>> {
        self.index.clear();
        self.stats.set_total_entries(0);
        self.order.drain()
    }
}

// == Eviction Store ==
/// Fixed-capacity LRU store with lazy expiration.
///
/// All reads and writes of the index and the recency list happen under one
/// mutex, so every operation is atomic with respect to the others. No
/// operation blocks on I/O.
///
/// The removal hook runs after the mutex has been released, so it may call
/// back into the store. Hooks for a single operation run in removal order.
pub struct EvictionStore<K, V> {
    state: Mutex<StoreState<K, V>>,
    removal_hook: RwLock<Option<RemovalHook<K, V>>>,
}

impl<K, V> EvictionStore<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    // == Constructor ==
    /// Creates an empty store with the given capacity and no default TTL.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_ttl(capacity, None)
    }

    /// Creates an empty store with the given capacity and default TTL.
    pub fn with_ttl(capacity: NonZeroUsize, default_ttl: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                index: HashMap::new(),
                order: RecencyList::new(),
                stats: CacheStats::new(),
                capacity,
                default_ttl: normalize_ttl(default_ttl),
            }),
            removal_hook: RwLock::new(None),
        }
    }

    // == Configure ==
    /// Replaces the capacity and the default TTL.
    ///
    /// Lowering the capacity does not evict anything by itself. The next
    /// insert of a new key then evicts as many tail entries as it takes to get
    /// back within the new capacity, not just one; in steady state each
    /// insert into a full store evicts exactly one entry.
    pub fn configure(&self, capacity: NonZeroUsize, default_ttl: Option<Duration>) {
        let mut state = self.state.lock();
        state.capacity = capacity;
        state.default_ttl = normalize_ttl(default_ttl);
    }

    // == Removal Hook ==
    /// Installs the observer notified on eviction, delete and clear.
    pub fn register_removal_hook(&self, hook: RemovalHook<K, V>) {
        *self.removal_hook.write() = Some(hook);
    }

    // == Get ==
    /// Looks a key up.
    ///
    /// A fresh hit moves the entry to the front. An expired entry is reported
    /// with its stale value and left where it is.
    pub fn get(&self, key: &K) -> Lookup<V> {
        self.state.lock().lookup(key, Instant::now())
    }

    // == Peek Fresh ==
    /// Returns the value if the key is present and fresh, without touching stats.
    ///
    /// A fresh entry still moves to the front. Used to re-check a key that was
    /// already counted as a miss.
    pub fn peek_fresh(&self, key: &K) -> Option<V> {
        self.state.lock().peek_fresh(key, Instant::now())
    }

    // == Set ==
    /// Stores a value, using the default TTL when `ttl` is None.
    ///
    /// Overwriting an existing key replaces its value, restarts its expiry for
    /// a non-zero TTL and marks it most recently used. Inserting a new key into
    /// a full store evicts the least recently used entry.
    pub fn set(&self, key: K, value: V, ttl: Option<Duration>) {
        let evicted = self.state.lock().insert(key, value, ttl);
        if !evicted.is_empty() {
            debug!("LRU eviction: removed {} entries", evicted.len());
        }
        self.notify(evicted, RemovalCause::Evicted);
    }

    // == Delete ==
    /// Removes an entry, returning whether the key was present.
    pub fn delete(&self, key: &K) -> bool {
        let removed = self.state.lock().remove(key);
        let found = removed.is_some();
        self.notify(removed, RemovalCause::Deleted);
        found
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&self) {
        let drained = self.state.lock().drain();
        debug!("Store cleared: removed {} entries", drained.len());
        self.notify(drained, RemovalCause::Cleared);
    }

    // == Contains ==
    /// Checks for a key without touching its recency or stats.
    pub fn contains(&self, key: &K) -> bool {
        self.state.lock().index.contains_key(key)
    }

    // == Keys ==
    /// Returns the keys from most to least recently used.
    pub fn keys(&self) -> Vec<K> {
        let state = self.state.lock();
        state.order.iter().map(|entry| entry.key.clone()).collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let mut stats = state.stats.clone();
        stats.set_total_entries(state.index.len());
        stats
    }

    // == Length ==
    /// Returns the number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.state.lock().capacity
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.state.lock().default_ttl
    }

    fn notify<I>(&self, removed: I, cause: RemovalCause)
    where
        I: IntoIterator<Item = CacheEntry<K, V>>,
    {
        let Some(hook) = self.removal_hook.read().clone() else {
            return;
        };
        for entry in removed {
            hook(&entry.key, &entry.value, cause);
        }
    }
}

fn normalize_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| !ttl.is_zero())
}
