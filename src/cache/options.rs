//! Cache Options Module
//!
//! Builder applied once when a cache is constructed.

use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{ContextSource, LruCache, RemovalCause, RemovalHook, Source, SyncSource};
use crate::config::Config;

// == Cache Options ==
/// Optional settings for an [`LruCache`].
///
/// ```
/// use std::num::NonZeroUsize;
/// use std::time::Duration;
/// use lrucache::cache::{CacheOptions, EmptySource};
///
/// let cache = CacheOptions::<String, String>::new()
///     .expire_time(Duration::from_secs(60))
///     .source(EmptySource::default())
///     .downgrade()
///     .build(NonZeroUsize::new(100).unwrap());
/// assert_eq!(cache.len(), 0);
/// ```
pub struct CacheOptions<K, V> {
    pub(crate) expire_time: Option<Duration>,
    pub(crate) source: Option<Arc<dyn ContextSource<K, V>>>,
    pub(crate) downgrade: bool,
    pub(crate) removal_hook: Option<RemovalHook<K, V>>,
}

impl<K, V> Default for CacheOptions<K, V> {
    fn default() -> Self {
        Self {
            expire_time: None,
            source: None,
            downgrade: false,
            removal_hook: None,
        }
    }
}

impl<K, V> CacheOptions<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates options from the environment-driven configuration.
    pub fn from_config(config: &Config) -> Self {
        let options = Self::new();
        let options = match config.expire_time {
            Some(ttl) => options.expire_time(ttl),
            None => options,
        };
        if config.downgrade {
            options.downgrade()
        } else {
            options
        }
    }

    // == Expire Time ==
    /// Default TTL for entries set without one. Zero means never expire.
    pub fn expire_time(mut self, ttl: Duration) -> Self {
        self.expire_time = Some(ttl);
        self
    }

    // == Source ==
    /// Backs the cache with a blocking source.
    pub fn source<S>(mut self, source: S) -> Self
    where
        S: Source<K, V> + 'static,
    {
        self.source = Some(Arc::new(SyncSource(source)));
        self
    }

    /// Backs the cache with a cancellation-aware source.
    pub fn context_source<S>(mut self, source: S) -> Self
    where
        S: ContextSource<K, V> + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }

    /// Backs the cache with a shared cancellation-aware source.
    pub fn shared_source(mut self, source: Arc<dyn ContextSource<K, V>>) -> Self {
        self.source = Some(source);
        self
    }

    // == Downgrade ==
    /// Serves the stale value when refreshing an expired entry fails.
    pub fn downgrade(mut self) -> Self {
        self.downgrade = true;
        self
    }

    // == Removal Hook ==
    /// Observes entries leaving the cache by eviction, delete or clear.
    pub fn removal_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&K, &V, RemovalCause) + Send + Sync + 'static,
    {
        self.removal_hook = Some(Arc::new(hook));
        self
    }

    // == Build ==
    pub fn build(self, capacity: NonZeroUsize) -> LruCache<K, V> {
        LruCache::with_options(capacity, self)
    }
}
