//! Cache Module
//!
//! Provides an in-memory LRU cache with lazy TTL expiration and cache-aside
//! loading from an optional backing source.

mod entry;
mod key_lock;
mod lru;
mod options;
mod orchestrator;
mod source;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use key_lock::{KeyLockGuard, KeyLockTable};
pub use lru::RecencyList;
pub use options::CacheOptions;
pub use orchestrator::LruCache;
pub use source::{ContextSource, EmptyContextSource, EmptySource, Source, SyncSource};
pub use stats::CacheStats;
pub use store::{EvictionStore, Lookup, RemovalCause, RemovalHook};
