//! Cache storage backends.
//!
//! [`MemoryBackend`] is a bounded in-process map that evicts in insertion
//! order. [`FileBackend`] keeps one JSON file per entry in a directory, so
//! entries survive across processes.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::entry::CacheEntry;
use crate::telemetry;
use crate::{Result, VizgenError};

/// Default capacity of the memory backend.
pub const DEFAULT_MEMORY_ENTRIES: usize = 100;

/// Default file name prefix of the persistent backend.
pub const DEFAULT_FILE_PREFIX: &str = "vz_cache_";

/// Key/value storage for [`CacheEntry`] values.
///
/// Backends store entries verbatim; expiry is decided by
/// [`CacheStore`](super::CacheStore).
pub trait CacheBackend: Send + Sync {
    /// Backend name for logging/metrics.
    fn name(&self) -> &'static str;

    fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or overwrite an entry.
    fn put(&self, key: &str, entry: CacheEntry) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    fn clear(&self) -> Result<()>;

    /// All keys currently stored.
    fn keys(&self) -> Result<Vec<String>>;

    fn len(&self) -> Result<usize> {
        Ok(self.keys()?.len())
    }
}

// ============================================================================
// MemoryBackend
// ============================================================================

#[derive(Default)]
struct MemoryInner {
    entries: HashMap<String, CacheEntry>,
    /// Keys, oldest insertion first.
    order: VecDeque<String>,
}

/// Bounded in-memory backend.
///
/// When full, admitting a new key evicts the single oldest-inserted entry.
/// Reads do not affect eviction order. Overwriting a key moves it to the
/// newest position without evicting anything.
pub struct MemoryBackend {
    inner: Mutex<MemoryInner>,
    max_entries: usize,
}

impl MemoryBackend {
    /// Create a backend holding at most `max_entries` entries (minimum 1).
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(MemoryInner::default()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        // A panic while holding the lock cannot leave the map half-updated
        // in a way that matters for a cache, so recover the guard.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_ENTRIES)
    }
}

impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.lock().entries.get(key).cloned())
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let mut inner = self.lock();
        if inner.entries.contains_key(key) {
            inner.order.retain(|k| k != key);
        } else {
            while inner.entries.len() >= self.max_entries {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
                metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
                debug!(key = %oldest, "evicted oldest memory cache entry");
            }
        }
        inner.order.push_back(key.to_owned());
        inner.entries.insert(key.to_owned(), entry);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.lock();
        if inner.entries.remove(key).is_some() {
            inner.order.retain(|k| k != key);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock().order.iter().cloned().collect())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.lock().entries.len())
    }
}

// ============================================================================
// FileBackend
// ============================================================================

/// Persistent backend: one `<prefix><hex(key)>.json` file per entry.
///
/// Keys are hex-encoded so any key is a valid file name and can be
/// recovered from it. Files without the prefix are never touched.
pub struct FileBackend {
    dir: PathBuf,
    prefix: String,
}

impl FileBackend {
    /// Open (creating if needed) a backend rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_prefix(dir, DEFAULT_FILE_PREFIX)
    }

    pub fn with_prefix(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            VizgenError::Io(format!("failed to create cache directory {dir:?}: {e}"))
        })?;
        Ok(Self {
            dir,
            prefix: prefix.into(),
        })
    }

    /// Default location: `<user cache dir>/vizgen`.
    pub fn default_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("vizgen")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}{}.json", self.prefix, hex::encode(key.as_bytes())))
    }

    /// Recover the key from a file name, if the file belongs to this backend.
    fn key_from_file_name(&self, name: &str) -> Option<String> {
        let encoded = name.strip_prefix(&self.prefix)?.strip_suffix(".json")?;
        let bytes = hex::decode(encoded).ok()?;
        String::from_utf8(bytes).ok()
    }
}

impl CacheBackend for FileBackend {
    fn name(&self) -> &'static str {
        "persistent"
    }

    fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let text = match fs::read_to_string(self.path_for(key)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let text = serde_json::to_string(&entry)?;
        fs::write(self.path_for(key), text)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<()> {
        for key in self.keys()? {
            self.remove(&key)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let dir_entry = dir_entry?;
            if let Some(key) = dir_entry
                .file_name()
                .to_str()
                .and_then(|name| self.key_from_file_name(name))
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entry(value: &str) -> CacheEntry {
        CacheEntry::new(value.to_string(), Duration::from_secs(60))
    }

    #[test]
    fn memory_evicts_first_inserted_not_least_recently_read() {
        let backend = MemoryBackend::new(3);
        backend.put("a", entry("1")).unwrap();
        backend.put("b", entry("2")).unwrap();
        backend.put("c", entry("3")).unwrap();

        // Reading "a" must not protect it.
        assert!(backend.get("a").unwrap().is_some());

        backend.put("d", entry("4")).unwrap();
        assert!(backend.get("a").unwrap().is_none());
        assert!(backend.get("b").unwrap().is_some());
        assert!(backend.get("d").unwrap().is_some());
        assert_eq!(backend.len().unwrap(), 3);
    }

    #[test]
    fn memory_overwrite_does_not_evict() {
        let backend = MemoryBackend::new(2);
        backend.put("a", entry("1")).unwrap();
        backend.put("b", entry("2")).unwrap();
        backend.put("a", entry("3")).unwrap();

        assert_eq!(backend.len().unwrap(), 2);
        assert_eq!(backend.get("a").unwrap().unwrap().value, "3");

        // "a" was re-inserted, so "b" is now the oldest.
        backend.put("c", entry("4")).unwrap();
        assert!(backend.get("b").unwrap().is_none());
        assert!(backend.get("a").unwrap().is_some());
    }

    #[test]
    fn memory_remove_and_clear() {
        let backend = MemoryBackend::new(4);
        backend.put("a", entry("1")).unwrap();
        backend.put("b", entry("2")).unwrap();
        backend.remove("a").unwrap();
        assert_eq!(backend.keys().unwrap(), vec!["b".to_string()]);
        backend.clear().unwrap();
        assert_eq!(backend.len().unwrap(), 0);
    }

    #[test]
    fn memory_zero_capacity_is_clamped() {
        let backend = MemoryBackend::new(0);
        assert_eq!(backend.max_entries(), 1);
        backend.put("a", entry("1")).unwrap();
        backend.put("b", entry("2")).unwrap();
        assert_eq!(backend.keys().unwrap(), vec!["b".to_string()]);
    }

    #[test]
    fn file_round_trip_and_key_recovery() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();

        backend.put("api_performance", entry("[]")).unwrap();
        backend.put("weird key/with:chars", entry("1")).unwrap();

        assert_eq!(backend.get("api_performance").unwrap().unwrap().value, "[]");
        let mut keys = backend.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["api_performance", "weird key/with:chars"]);
    }

    #[test]
    fn file_clear_leaves_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        backend.put("a", entry("1")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "keep me").unwrap();

        backend.clear().unwrap();

        assert!(backend.get("a").unwrap().is_none());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn file_corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        std::fs::write(backend.path_for("bad"), "{not json").unwrap();
        assert!(backend.get("bad").is_err());
    }
}
