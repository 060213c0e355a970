//! Integration Tests for the Cache
//!
//! Exercises the public cache API end to end, with and without a backing source.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lrucache::cache::{CacheOptions, ContextSource, RemovalCause, Source};
use lrucache::{CacheError, LruCache, SourceError};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

// == Helper Types ==

/// Async source backed by a map, counting calls and optionally failing.
#[derive(Default)]
struct TestSource {
    rows: Mutex<HashMap<String, u32>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    deletes: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl TestSource {
    fn with_rows(rows: &[(&str, u32)]) -> Self {
        let source = Self::default();
        for (key, value) in rows {
            source.rows.lock().insert(key.to_string(), *value);
        }
        source
    }

    fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("source unavailable").into());
        }
        Ok(())
    }
}

#[async_trait]
impl ContextSource<String, u32> for TestSource {
    async fn get(&self, ctx: &CancellationToken, key: &String) -> Result<u32, SourceError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = ctx.cancelled() => return Err(anyhow::anyhow!("cancelled").into()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        self.check()?;
        self.rows.lock().get(key).copied().ok_or(SourceError::NotFound)
    }

    async fn set(&self, _ctx: &CancellationToken, key: &String, value: &u32) -> Result<(), SourceError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.rows.lock().insert(key.clone(), *value);
        Ok(())
    }

    async fn delete(&self, _ctx: &CancellationToken, key: &String) -> Result<(), SourceError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.rows.lock().remove(key);
        Ok(())
    }
}

/// Blocking source that always fails.
struct BrokenSource;

impl Source<String, u32> for BrokenSource {
    fn get(&self, _key: &String) -> Result<u32, SourceError> {
        Err(anyhow::anyhow!("connection refused").into())
    }

    fn set(&self, _key: &String, _value: &u32) -> Result<(), SourceError> {
        Err(anyhow::anyhow!("connection refused").into())
    }

    fn delete(&self, _key: &String) -> Result<(), SourceError> {
        Err(anyhow::anyhow!("connection refused").into())
    }
}

// == Helper Functions ==

fn capacity(n: usize) -> NonZeroUsize {
    NonZeroUsize::new(n).unwrap()
}

fn key(k: &str) -> String {
    k.to_string()
}

fn cache_with_source(
    n: usize,
    source: Arc<TestSource>,
    configure: impl FnOnce(CacheOptions<String, u32>) -> CacheOptions<String, u32>,
) -> LruCache<String, u32> {
    configure(CacheOptions::new().shared_source(source)).build(capacity(n))
}

// == Eviction Tests ==

#[tokio::test]
async fn test_lru_eviction_order() {
    let cache = LruCache::new(capacity(2));

    cache.set(key("a"), 1).await.unwrap();
    cache.set(key("b"), 2).await.unwrap();
    cache.set(key("c"), 3).await.unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.get(&key("a")).await.unwrap_err().is_not_found());
    assert_eq!(cache.get(&key("b")).await.unwrap(), 2);
    assert_eq!(cache.get(&key("c")).await.unwrap(), 3);
}

#[tokio::test]
async fn test_recency_update_on_read() {
    let cache = LruCache::new(capacity(2));

    cache.set(key("a"), 1).await.unwrap();
    cache.set(key("b"), 2).await.unwrap();
    cache.get(&key("a")).await.unwrap();
    cache.set(key("c"), 3).await.unwrap();

    assert_eq!(cache.get(&key("a")).await.unwrap(), 1);
    assert_eq!(cache.get(&key("c")).await.unwrap(), 3);
    assert!(cache.get(&key("b")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_update_semantics() {
    let cache = LruCache::new(capacity(10));

    cache.set(key("a"), 1).await.unwrap();
    cache.set(key("a"), 2).await.unwrap();

    assert_eq!(cache.get(&key("a")).await.unwrap(), 2);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn test_capacity_bound() {
    let cache = LruCache::new(capacity(5));

    for i in 0..50u32 {
        cache.set(format!("k{}", i), i).await.unwrap();
        assert!(cache.len() <= 5);
    }
}

#[tokio::test]
async fn test_removal_hook_sees_evictions() {
    let removed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&removed);
    let cache = CacheOptions::<String, u32>::new()
        .removal_hook(move |k, v, cause| sink.lock().push((k.clone(), *v, cause)))
        .build(capacity(1));

    cache.set(key("a"), 1).await.unwrap();
    cache.set(key("b"), 2).await.unwrap();
    cache.delete(&key("b")).await.unwrap();

    assert_eq!(
        *removed.lock(),
        vec![
            (key("a"), 1, RemovalCause::Evicted),
            (key("b"), 2, RemovalCause::Deleted),
        ]
    );
}

// == Expiration Tests ==

#[tokio::test]
async fn test_expiration_reporting() {
    let cache = CacheOptions::<String, u32>::new()
        .expire_time(Duration::from_millis(100))
        .build(capacity(10));

    cache.set(key("a"), 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    match cache.get(&key("a")).await {
        Err(CacheError::Expired { stale }) => assert_eq!(stale, 1),
        other => panic!("expected Expired, got {:?}", other),
    }

    cache.set(key("a"), 1).await.unwrap();
    assert_eq!(cache.get(&key("a")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_expired_entry_is_refreshed_from_source() {
    let source = Arc::new(TestSource::with_rows(&[("a", 10)]));
    let cache = cache_with_source(10, Arc::clone(&source), |o| {
        o.expire_time(Duration::from_millis(20))
    });

    cache.set(key("a"), 1).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Write-through replaced the row, so the refresh sees the written value
    assert_eq!(cache.get(&key("a")).await.unwrap(), 1);
    assert_eq!(source.gets.load(Ordering::SeqCst), 1);

    // Fresh again: served from the store
    assert_eq!(cache.get(&key("a")).await.unwrap(), 1);
    assert_eq!(source.gets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_entry_ttl_refresh_from_source_is_fresh() {
    let source = Arc::new(TestSource::default());
    let cache = cache_with_source(10, Arc::clone(&source), |o| o);

    cache
        .set_with_ttl(key("a"), 1, Duration::from_millis(10))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    // First read refreshes from the source, the rest are cache hits
    for _ in 0..3 {
        assert_eq!(cache.get(&key("a")).await.unwrap(), 1);
    }
    assert_eq!(source.gets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_set_after_entry_ttl_expiry_is_fresh() {
    let cache = LruCache::new(capacity(10));

    cache
        .set_with_ttl(key("a"), 1, Duration::from_millis(10))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(cache.get(&key("a")).await.unwrap_err().is_expired());

    cache.set(key("a"), 2).await.unwrap();
    assert_eq!(cache.get(&key("a")).await.unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expired_refreshes_are_not_coalesced() {
    let source = Arc::new(TestSource::default().slow(Duration::from_millis(200)));
    let cache = Arc::new(cache_with_source(10, Arc::clone(&source), |o| o));

    cache
        .set_with_ttl(key("a"), 5, Duration::from_millis(10))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(&key("a")).await })
        })
        .collect();

    for reader in readers {
        assert_eq!(reader.await.unwrap().unwrap(), 5);
    }
    // Every reader saw the expired entry and refreshed on its own
    assert_eq!(source.gets.load(Ordering::SeqCst), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_coalesced_misses_count_one_miss_each() {
    let source = Arc::new(TestSource::with_rows(&[("k", 42)]).slow(Duration::from_millis(50)));
    let cache = Arc::new(cache_with_source(10, Arc::clone(&source), |o| o));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(&key("k")).await })
        })
        .collect();
    for reader in readers {
        assert_eq!(reader.await.unwrap().unwrap(), 42);
    }

    let stats = cache.stats();
    assert_eq!(stats.misses, 4);
    assert_eq!(stats.hits, 0);
}

// == Delete Tests ==

#[tokio::test]
async fn test_delete_semantics() {
    let cache = LruCache::new(capacity(10));

    cache.set(key("a"), 1).await.unwrap();
    assert!(cache.delete(&key("a")).await.is_ok());
    assert!(cache.get(&key("a")).await.unwrap_err().is_not_found());
    assert!(cache.delete(&key("a")).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_delete_propagates_source_error_after_local_delete() {
    let source = Arc::new(TestSource::default());
    let cache = cache_with_source(10, Arc::clone(&source), |o| o);

    cache.set(key("a"), 1).await.unwrap();
    source.fail(true);

    let err = cache.delete(&key("a")).await.unwrap_err();
    assert!(matches!(err, CacheError::Source(SourceError::Other(_))));
    // The local delete is final
    assert_eq!(cache.len(), 0);
    assert_eq!(source.deletes.load(Ordering::SeqCst), 1);
}

// == Source Tests ==

#[tokio::test]
async fn test_missing_key_loaded_from_source() {
    let source = Arc::new(TestSource::with_rows(&[("a", 7)]));
    let cache = cache_with_source(10, Arc::clone(&source), |o| o);

    assert_eq!(cache.get(&key("a")).await.unwrap(), 7);
    assert_eq!(cache.len(), 1);

    // Second read is a cache hit
    assert_eq!(cache.get(&key("a")).await.unwrap(), 7);
    assert_eq!(source.gets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_missing_key_absent_from_source() {
    let source = Arc::new(TestSource::default());
    let cache = cache_with_source(10, Arc::clone(&source), |o| o);

    let err = cache.get(&key("nope")).await.unwrap_err();
    assert!(matches!(err, CacheError::Source(SourceError::NotFound)));
    assert!(cache.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_misses_are_coalesced() {
    let source = Arc::new(TestSource::with_rows(&[("k", 42)]).slow(Duration::from_millis(50)));
    let cache = Arc::new(cache_with_source(10, Arc::clone(&source), |o| o));

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(&key("k")).await })
        })
        .collect();

    for reader in readers {
        assert_eq!(reader.await.unwrap().unwrap(), 42);
    }
    assert_eq!(source.gets.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_write_through_and_divergence_on_failure() {
    let source = Arc::new(TestSource::default());
    let cache = cache_with_source(10, Arc::clone(&source), |o| o);

    cache.set(key("a"), 1).await.unwrap();
    assert_eq!(source.rows.lock().get("a"), Some(&1));

    source.fail(true);
    let err = cache.set(key("a"), 2).await.unwrap_err();
    assert!(matches!(err, CacheError::Source(_)));

    // Local write is kept, the source still has the old value
    source.fail(false);
    assert_eq!(cache.get(&key("a")).await.unwrap(), 2);
    assert_eq!(source.rows.lock().get("a"), Some(&1));
    assert_eq!(source.sets.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_set_with_ttl_overrides_default() {
    let source = Arc::new(TestSource::default());
    let cache = cache_with_source(10, Arc::clone(&source), |o| o);

    cache
        .set_with_ttl(key("a"), 1, Duration::from_millis(20))
        .await
        .unwrap();
    cache.set(key("b"), 2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    source.fail(true);
    // "a" expired and the refresh fails; "b" has no TTL
    assert!(matches!(
        cache.get(&key("a")).await,
        Err(CacheError::Source(_))
    ));
    assert_eq!(cache.get(&key("b")).await.unwrap(), 2);
}

#[tokio::test]
async fn test_cancellation_token_reaches_source() {
    let source = Arc::new(TestSource::with_rows(&[("a", 1)]).slow(Duration::from_secs(10)));
    let cache = cache_with_source(10, Arc::clone(&source), |o| o);

    let ctx = CancellationToken::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        canceller.cancel();
    });

    let err = cache.get_cancellable(&ctx, &key("a")).await.unwrap_err();
    assert!(matches!(err, CacheError::Source(SourceError::Other(_))));
    assert!(cache.is_empty());
}

// == Downgrade Tests ==

#[tokio::test]
async fn test_refresh_failure_without_downgrade() {
    let cache = CacheOptions::<String, u32>::new()
        .expire_time(Duration::from_millis(1))
        .source(BrokenSource)
        .build(capacity(1));

    // Write-through fails but the value is cached
    assert!(cache.set(key("a"), 1).await.is_err());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(matches!(
        cache.get(&key("a")).await,
        Err(CacheError::Source(SourceError::Other(_)))
    ));
}

#[tokio::test]
async fn test_refresh_failure_with_downgrade() {
    let cache = CacheOptions::<String, u32>::new()
        .expire_time(Duration::from_millis(1))
        .source(BrokenSource)
        .downgrade()
        .build(capacity(1));

    assert!(cache.set(key("a"), 1).await.is_err());
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(cache.get(&key("a")).await.unwrap(), 1);
}

#[tokio::test]
async fn test_downgrade_does_not_apply_to_missing_keys() {
    let cache = CacheOptions::<String, u32>::new()
        .source(BrokenSource)
        .downgrade()
        .build(capacity(1));

    assert!(matches!(
        cache.get(&key("a")).await,
        Err(CacheError::Source(_))
    ));
}

#[tokio::test]
async fn test_clear_leaves_source_alone() {
    let source = Arc::new(TestSource::default());
    let cache = cache_with_source(10, Arc::clone(&source), |o| o);

    cache.set(key("a"), 1).await.unwrap();
    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(source.deletes.load(Ordering::SeqCst), 0);
    // Reloaded from the source on the next read
    assert_eq!(cache.get(&key("a")).await.unwrap(), 1);
}
