//! Cache-Aside Orchestrator Module
//!
//! Puts the eviction store in front of an optional backing source.
//!
//! Reads are served from the store when fresh. A missing key is loaded from the
//! source once, however many callers ask for it at the same time. An expired key
//! is reloaded without coalescing and, with downgrade enabled, the stale value
//! is served if the reload fails. Writes go to the store first and then to the
//! source.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::cache::{
    CacheOptions, CacheStats, ContextSource, EvictionStore, KeyLockTable, Lookup,
};
use crate::config::Config;
use crate::error::{CacheError, Result};

// == LRU Cache ==
/// LRU cache with lazy expiration and cache-aside loading.
///
/// Share it between tasks with an `Arc`.
pub struct LruCache<K, V> {
    store: EvictionStore<K, V>,
    source: Option<Arc<dyn ContextSource<K, V>>>,
    downgrade: bool,
    key_locks: KeyLockTable<K>,
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    // == Constructors ==
    /// Creates a cache with no source, no default TTL and downgrade off.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_options(capacity, CacheOptions::new())
    }

    /// Creates a cache from the environment-driven configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::with_options(config.capacity, CacheOptions::from_config(config))
    }

    pub fn with_options(capacity: NonZeroUsize, options: CacheOptions<K, V>) -> Self {
        let store = EvictionStore::with_ttl(capacity, options.expire_time);
        if let Some(hook) = options.removal_hook {
            store.register_removal_hook(hook);
        }

        Self {
            store,
            source: options.source,
            downgrade: options.downgrade,
            key_locks: KeyLockTable::new(),
        }
    }

    // == Get ==
    /// Returns the value for `key`, loading it from the source when needed.
    ///
    /// Without a source, a missing key is [`CacheError::NotFound`] and an
    /// expired one is [`CacheError::Expired`] carrying the stale value.
    pub async fn get(&self, key: &K) -> Result<V, V> {
        self.get_cancellable(&CancellationToken::new(), key).await
    }

    /// Same as [`LruCache::get`], handing `ctx` to the source.
    pub async fn get_cancellable(&self, ctx: &CancellationToken, key: &K) -> Result<V, V> {
        match self.store.get(key) {
            Lookup::Fresh(value) => {
                trace!("Cache hit");
                Ok(value)
            }
            Lookup::Missing => match &self.source {
                Some(source) => self.load_missing(source.as_ref(), ctx, key).await,
                None => Err(CacheError::NotFound),
            },
            Lookup::Expired(stale) => match &self.source {
                Some(source) => self.refresh_expired(source.as_ref(), ctx, key, stale).await,
                None => Err(CacheError::Expired { stale }),
            },
        }
    }

    /// Loads a missing key, one load per key at a time.
    async fn load_missing(
        &self,
        source: &dyn ContextSource<K, V>,
        ctx: &CancellationToken,
        key: &K,
    ) -> Result<V, V> {
        let _guard = self.key_locks.lock(key).await;

        // Another caller may have loaded it while we waited
        if let Some(value) = self.store.peek_fresh(key) {
            debug!("Missing key loaded by a concurrent caller");
            return Ok(value);
        }

        debug!("Cache miss: loading from source");
        let value = source.get(ctx, key).await?;
        self.store.set(key.clone(), value.clone(), None);
        Ok(value)
    }

    /// Reloads an expired key, serving `stale` on failure when downgrading.
    async fn refresh_expired(
        &self,
        source: &dyn ContextSource<K, V>,
        ctx: &CancellationToken,
        key: &K,
        stale: V,
    ) -> Result<V, V> {
        debug!("Cache entry expired: refreshing from source");
        match source.get(ctx, key).await {
            Ok(value) => {
                self.store.set(key.clone(), value.clone(), None);
                Ok(value)
            }
            Err(err) if self.downgrade => {
                warn!("Source refresh failed, serving stale value: {}", err);
                Ok(stale)
            }
            Err(err) => Err(err.into()),
        }
    }

    // == Set ==
    /// Stores a value with the default TTL and writes it through to the source.
    ///
    /// The store is updated before the source is called and is not rolled
    /// back if the source fails, so a returned error means the cache and the
    /// source may disagree about `key`.
    pub async fn set(&self, key: K, value: V) -> Result<(), V> {
        self.set_cancellable(&CancellationToken::new(), key, value)
            .await
    }

    pub async fn set_cancellable(&self, ctx: &CancellationToken, key: K, value: V) -> Result<(), V> {
        self.write(ctx, key, value, None).await
    }

    /// Stores a value with its own TTL and writes it through to the source.
    ///
    /// A zero TTL makes a new entry never expire. For an existing entry it keeps
    /// an expiry that is still ahead and clears one that has already passed.
    pub async fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> Result<(), V> {
        self.set_with_ttl_cancellable(&CancellationToken::new(), key, value, ttl)
            .await
    }

    pub async fn set_with_ttl_cancellable(
        &self,
        ctx: &CancellationToken,
        key: K,
        value: V,
        ttl: Duration,
    ) -> Result<(), V> {
        self.write(ctx, key, value, Some(ttl)).await
    }

    async fn write(
        &self,
        ctx: &CancellationToken,
        key: K,
        value: V,
        ttl: Option<Duration>,
    ) -> Result<(), V> {
        let Some(source) = &self.source else {
            self.store.set(key, value, ttl);
            return Ok(());
        };

        self.store.set(key.clone(), value.clone(), ttl);
        source.set(ctx, &key, &value).await.map_err(|err| {
            warn!("Write-through to source failed: {}", err);
            CacheError::from(err)
        })
    }

    // == Delete ==
    /// Removes a key from the cache and then from the source.
    ///
    /// A source error is returned as is. Otherwise the result is
    /// [`CacheError::NotFound`] when the key was not in the cache, whatever
    /// the source had.
    pub async fn delete(&self, key: &K) -> Result<(), V> {
        self.delete_cancellable(&CancellationToken::new(), key).await
    }

    pub async fn delete_cancellable(&self, ctx: &CancellationToken, key: &K) -> Result<(), V> {
        let found = self.store.delete(key);

        if let Some(source) = &self.source {
            source.delete(ctx, key).await?;
        }

        if found {
            Ok(())
        } else {
            Err(CacheError::NotFound)
        }
    }

    // == Length ==
    /// Returns the number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    // == Clear ==
    /// Empties the cache. The source is left alone.
    pub fn clear(&self) {
        self.store.clear();
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }

    pub fn capacity(&self) -> NonZeroUsize {
        self.store.capacity()
    }

    /// Whether a backing source is configured.
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }
}
