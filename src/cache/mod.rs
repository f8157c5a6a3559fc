//! Caching subsystem.
//!
//! [`CacheStore`] is a typed key/value cache with per-entry TTL over two
//! backends:
//!
//! - [`MemoryBackend`]: bounded, in-process, evicts the oldest-inserted
//!   entry when full. Always present.
//! - [`FileBackend`]: optional persistent directory, so results and
//!   performance history survive across processes.
//!
//! Values are always serialized to JSON on write and deserialized on read,
//! so callers get an owned copy and can never mutate a cached value in
//! place. Storage failures never reach the caller: they are logged and
//! treated as a miss (reads) or dropped (writes).
//!
//! Result keys are derived with [`fingerprint`](fingerprint::fingerprint).

pub mod backend;
pub mod entry;
pub mod fingerprint;

pub use backend::{CacheBackend, FileBackend, MemoryBackend};
pub use entry::CacheEntry;
pub use fingerprint::{fingerprint, result_key};

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::Result;
use crate::telemetry;

/// Which backend(s) an operation targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Storage {
    /// In-process memory only.
    #[default]
    Memory,
    /// The persistent backend only. A no-op (or miss) when none is configured.
    Persistent,
    /// Both: writes go to each backend, reads try memory first.
    All,
}

impl Storage {
    fn as_str(&self) -> &'static str {
        match self {
            Storage::Memory => "memory",
            Storage::Persistent => "persistent",
            Storage::All => "all",
        }
    }
}

/// Per-write options.
///
/// ```rust
/// # use vizgen::cache::{CacheOptions, Storage};
/// # use std::time::Duration;
/// let options = CacheOptions::new()
///     .ttl(Duration::from_secs(24 * 3600))
///     .storage(Storage::All);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheOptions {
    /// Lifetime of the entry. `None` uses the store's default TTL.
    pub ttl: Option<Duration>,
    pub storage: Storage,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn storage(mut self, storage: Storage) -> Self {
        self.storage = storage;
        self
    }
}

/// Configuration for a [`CacheStore`].
///
/// ```rust
/// # use vizgen::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_memory_entries(500)
///     .default_ttl(Duration::from_secs(600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Capacity of the memory backend. Default: 100.
    pub max_memory_entries: usize,
    /// TTL used when a write does not specify one. Default: 30 minutes.
    pub default_ttl: Duration,
    /// Directory for the persistent backend. Default: none.
    pub persistent_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_memory_entries: backend::DEFAULT_MEMORY_ENTRIES,
            default_ttl: Duration::from_secs(30 * 60),
            persistent_dir: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_memory_entries(mut self, n: usize) -> Self {
        self.max_memory_entries = n;
        self
    }

    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn persistent_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.persistent_dir = Some(dir.into());
        self
    }
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub memory_entries: usize,
    pub memory_limit: usize,
}

impl CacheStats {
    /// Hits as a percentage of lookups, 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64 * 100.0
        }
    }
}

/// Typed TTL cache over a memory backend and an optional persistent one.
pub struct CacheStore {
    memory: MemoryBackend,
    persistent: Option<Box<dyn CacheBackend>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
}

impl CacheStore {
    /// Create a store from configuration, opening the persistent directory
    /// if one is configured.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let mut store = Self::in_memory(config.max_memory_entries).default_ttl(config.default_ttl);
        if let Some(dir) = &config.persistent_dir {
            store = store.with_persistent_backend(FileBackend::open(dir)?);
        }
        Ok(store)
    }

    /// A memory-only store.
    pub fn in_memory(max_entries: usize) -> Self {
        Self {
            memory: MemoryBackend::new(max_entries),
            persistent: None,
            default_ttl: CacheConfig::default().default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
        }
    }

    /// Attach a persistent backend, replacing any existing one.
    pub fn with_persistent_backend(mut self, backend: impl CacheBackend + 'static) -> Self {
        self.persistent = Some(Box::new(backend));
        self
    }

    fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn has_persistent(&self) -> bool {
        self.persistent.is_some()
    }

    fn backends(&self, storage: Storage) -> Vec<&dyn CacheBackend> {
        let mut out: Vec<&dyn CacheBackend> = Vec::with_capacity(2);
        if matches!(storage, Storage::Memory | Storage::All) {
            out.push(&self.memory);
        }
        if matches!(storage, Storage::Persistent | Storage::All) {
            if let Some(p) = &self.persistent {
                out.push(p.as_ref());
            }
        }
        out
    }

    /// Store `value` under `key`, overwriting any existing entry.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: CacheOptions) {
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(e) => {
                warn!(key, error = %e, "cache value could not be serialized, not cached");
                return;
            }
        };
        let entry = CacheEntry::new(text, options.ttl.unwrap_or(self.default_ttl));

        for backend in self.backends(options.storage) {
            if let Err(e) = backend.put(key, entry.clone()) {
                warn!(key, backend = backend.name(), error = %e, "cache write failed");
            }
        }
        self.sets.fetch_add(1, Ordering::Relaxed);
        debug!(key, storage = options.storage.as_str(), "cache set");
    }

    /// Fetch a value if present and unexpired.
    ///
    /// Expired entries are deleted on the way. With [`Storage::All`], a hit
    /// in the persistent backend is copied into memory (keeping its
    /// original expiry).
    pub fn get<T: DeserializeOwned>(&self, key: &str, storage: Storage) -> Option<T> {
        for backend in self.backends(storage) {
            let entry = match backend.get(key) {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    warn!(key, backend = backend.name(), error = %e, "cache read failed");
                    continue;
                }
            };

            if entry.is_expired() {
                debug!(key, backend = backend.name(), "cache entry expired");
                self.remove_quietly(backend, key);
                continue;
            }

            match serde_json::from_str::<T>(&entry.value) {
                Ok(value) => {
                    if storage == Storage::All && backend.name() != self.memory.name() {
                        if let Err(e) = self.memory.put(key, entry) {
                            warn!(key, error = %e, "cache promotion to memory failed");
                        }
                    }
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(telemetry::CACHE_HITS_TOTAL, "storage" => backend.name())
                        .increment(1);
                    debug!(key, backend = backend.name(), "cache hit");
                    return Some(value);
                }
                Err(e) => {
                    warn!(key, backend = backend.name(), error = %e, "cached value unreadable, treating as miss");
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "storage" => storage.as_str())
            .increment(1);
        None
    }

    /// Remove `key` from the selected storage.
    pub fn delete(&self, key: &str, storage: Storage) {
        for backend in self.backends(storage) {
            self.remove_quietly(backend, key);
        }
    }

    /// Remove every entry from the selected storage.
    pub fn clear(&self, storage: Storage) {
        for backend in self.backends(storage) {
            if let Err(e) = backend.clear() {
                warn!(backend = backend.name(), error = %e, "cache clear failed");
            }
        }
        debug!(storage = storage.as_str(), "cache cleared");
    }

    /// Delete every expired or unreadable entry from all backends.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let now = entry::now_millis();
        let mut removed = 0;
        for backend in self.backends(Storage::All) {
            let keys = match backend.keys() {
                Ok(keys) => keys,
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "cache sweep could not list keys");
                    continue;
                }
            };
            for key in keys {
                let stale = match backend.get(&key) {
                    Ok(Some(entry)) => entry.is_expired_at(now),
                    Ok(None) => false,
                    Err(_) => true,
                };
                if stale {
                    self.remove_quietly(backend, &key);
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            memory_entries: self.memory.len().unwrap_or(0),
            memory_limit: self.memory.max_entries(),
        }
    }

    fn remove_quietly(&self, backend: &dyn CacheBackend, key: &str) {
        if let Err(e) = backend.remove(key) {
            warn!(key, backend = backend.name(), error = %e, "cache delete failed");
        }
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::in_memory(backend::DEFAULT_MEMORY_ENTRIES)
    }
}
