//! Configuration Module
//!
//! Handles loading cache defaults from environment variables.

use std::env;
use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_CAPACITY: usize = 1000;

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub capacity: NonZeroUsize,
    /// Default TTL for entries without explicit TTL, None = never expire
    pub expire_time: Option<Duration>,
    /// Serve stale values when refreshing an expired entry fails
    pub downgrade: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_CAPACITY` - Maximum cache entries, must be positive (default: 1000)
    /// - `CACHE_EXPIRE_MS` - Default TTL in milliseconds, 0 = never (default: 0)
    /// - `CACHE_DOWNGRADE` - `true` or `1` to serve stale on refresh failure (default: false)
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            capacity: env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(Self::default_capacity()),
            expire_time: env::var("CACHE_EXPIRE_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            downgrade: env::var("CACHE_DOWNGRADE")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true"))
                .unwrap_or(false),
        }
    }

    fn default_capacity() -> NonZeroUsize {
        NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: Self::default_capacity(),
            expire_time: None,
            downgrade: false,
        }
    }
}
