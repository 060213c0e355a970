//! lrucache demo
//!
//! Runs a cache in front of an in-memory source and logs what happens.
//! Configure with `CACHE_CAPACITY`, `CACHE_EXPIRE_MS`, `CACHE_DOWNGRADE` and `RUST_LOG`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lrucache::cache::{CacheOptions, RemovalCause, Source};
use lrucache::{Config, LruCache, SourceError};

/// In-memory system of record for the demo.
#[derive(Default)]
struct MemorySource {
    rows: Mutex<HashMap<String, String>>,
}

impl Source<String, String> for MemorySource {
    fn get(&self, key: &String) -> Result<String, SourceError> {
        self.rows.lock().get(key).cloned().ok_or(SourceError::NotFound)
    }

    fn set(&self, key: &String, value: &String) -> Result<(), SourceError> {
        self.rows.lock().insert(key.clone(), value.clone());
        Ok(())
    }

    fn delete(&self, key: &String) -> Result<(), SourceError> {
        self.rows.lock().remove(key);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lrucache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Configuration loaded: capacity={}, expire_time={:?}, downgrade={}",
        config.capacity, config.expire_time, config.downgrade
    );

    let source = MemorySource::default();
    for i in 0..5 {
        source.set(&format!("user:{}", i), &format!("name-{}", i))?;
    }

    let cache: Arc<LruCache<String, String>> = Arc::new(
        CacheOptions::<String, String>::from_config(&config)
            .source(source)
            .removal_hook(|key: &String, _: &String, cause: RemovalCause| {
                info!("Entry {} left the cache: {:?}", key, cause);
            })
            .build(config.capacity),
    );

    // Concurrent reads of the same missing key share one source load
    let readers: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get(&"user:1".to_string()).await })
        })
        .collect();
    for reader in readers {
        match reader.await? {
            Ok(value) => info!("Read user:1 = {}", value),
            Err(err) => warn!("Read user:1 failed: {}", err),
        }
    }

    cache
        .set("user:9".to_string(), "name-9".to_string())
        .await?;
    if let Err(err) = cache.get(&"user:42".to_string()).await {
        info!("Read user:42: {}", err);
    }
    cache.delete(&"user:9".to_string()).await?;

    info!("Cache stats: {}", serde_json::to_string(&cache.stats())?);
    Ok(())
}
