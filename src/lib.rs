//! lrucache - An in-memory LRU cache
//!
//! Provides least-recently-used eviction with lazy TTL expiration, and
//! cache-aside loading from a backing source with single-flight miss loads.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheOptions, ContextSource, LruCache, Source};
pub use config::Config;
pub use error::{CacheError, SourceError};
