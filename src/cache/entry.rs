//! Stored cache entry.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A serialized value with its creation time and lifetime.
///
/// This is also the on-disk layout of the persistent backend:
/// `{"value": "...", "timestamp": <ms since epoch>, "ttl": <ms>}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// JSON text of the cached value.
    pub value: String,
    /// Creation time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Time-to-live in milliseconds.
    pub ttl: u64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(value: String, ttl: Duration) -> Self {
        Self::at(value, ttl, now_millis())
    }

    /// Create an entry with an explicit creation time.
    pub fn at(value: String, ttl: Duration, timestamp: u64) -> Self {
        Self {
            value,
            timestamp,
            ttl: u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Whether the entry has outlived its TTL at `now` (ms since epoch).
    ///
    /// An entry is still valid when exactly `ttl` milliseconds have passed.
    pub fn is_expired_at(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > self.ttl
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
