//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use std::time::{Duration, Instant};

// == Cache Entry ==
/// Represents a single cache entry with its key, value and expiry.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// The key the entry is indexed under
    pub key: K,
    /// The stored value
    pub value: V,
    /// Expiration instant, None = no expiration
    pub expires_at: Option<Instant>,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new cache entry with optional TTL.
    ///
    /// A zero TTL is the same as no TTL: the entry never expires.
    pub fn new(key: K, value: V, ttl: Option<Duration>) -> Self {
        Self {
            key,
            value,
            expires_at: deadline(ttl),
        }
    }

    // == Refresh ==
    /// Replaces the value and, for a non-zero TTL, restarts the expiry clock.
    ///
    /// A zero or absent TTL keeps the previous expiry while it is still ahead,
    /// and clears it once it has passed so the entry is fresh again.
    pub fn refresh(&mut self, value: V, ttl: Option<Duration>) {
        self.value = value;
        match deadline(ttl) {
            Some(expires_at) => self.expires_at = Some(expires_at),
            None if self.is_expired() => self.expires_at = None,
            None => {}
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired only once `now` is strictly past
    /// its expiration instant. At exactly the expiration instant it is still fresh.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(expires) => now > expires,
            None => false,
        }
    }

    /// Checks if the entry has expired now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    // == Time To Live ==
    /// Returns the remaining TTL, or None if no expiration is set.
    ///
    /// Returns `Some(Duration::ZERO)` once the entry has expired.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires| expires.saturating_duration_since(Instant::now()))
    }
}

// == Utility Functions ==
/// Turns a TTL into an absolute deadline; zero means none.
fn deadline(ttl: Option<Duration>) -> Option<Instant> {
    ttl.filter(|ttl| !ttl.is_zero())
        .and_then(|ttl| Instant::now().checked_add(ttl))
}
