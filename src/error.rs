//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Source Error ==
/// Error reported by a backing source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The source has no value for the key
    #[error("Not found in source")]
    NotFound,

    /// Any other failure of the source
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// == Cache Error Enum ==
/// Unified error type for cache operations.
///
/// `V` is the value type of the cache, carried by [`CacheError::Expired`] so the
/// caller can still use the stale value.
#[derive(Error, Debug)]
pub enum CacheError<V> {
    /// Key not found in cache (and not resolvable from a source)
    #[error("Not found")]
    NotFound,

    /// Key is present but past its TTL
    #[error("Expired")]
    Expired {
        /// The value that was cached before it expired
        stale: V,
    },

    /// The backing source failed
    #[error("Source error: {0}")]
    Source(#[from] SourceError),
}

impl<V> CacheError<V> {
    // == Stale Value ==
    /// Returns the stale value carried by an `Expired` error.
    pub fn stale(&self) -> Option<&V> {
        match self {
            CacheError::Expired { stale } => Some(stale),
            _ => None,
        }
    }

    /// Consumes the error, returning the stale value of an `Expired` error.
    pub fn into_stale(self) -> Option<V> {
        match self {
            CacheError::Expired { stale } => Some(stale),
            _ => None,
        }
    }

    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }

    /// Returns true for `Expired`.
    pub fn is_expired(&self) -> bool {
        matches!(self, CacheError::Expired { .. })
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations over values of type `V`.
pub type Result<T, V> = std::result::Result<T, CacheError<V>>;
