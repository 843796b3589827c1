//! Keyed, content-addressed entry stores.

use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use strokelab_common::error::{StrokeError, StrokeResult};

use crate::fingerprint::Fingerprint;

/// Address of one stage output: `(input, stage, config)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub input: Fingerprint,
    pub stage: String,
    pub config: Fingerprint,
}

impl CacheKey {
    pub fn new(input: Fingerprint, stage: impl Into<String>, config: Fingerprint) -> Self {
        Self {
            input,
            stage: stage.into(),
            config,
        }
    }

    /// Entry file name: `<input>-<stage>-<config>.json`.
    pub fn file_name(&self) -> String {
        format!("{self}.json")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.input, self.stage, self.config)
    }
}

/// Persistent store for serialized cache entries.
///
/// Implementations never expose a partially written entry.
pub trait CacheStore: Send + Sync {
    /// Read an entry, `None` if absent.
    fn get(&self, key: &CacheKey) -> StrokeResult<Option<Vec<u8>>>;

    /// Publish an entry unless one exists. Returns whether this call wrote it.
    fn put_if_absent(&self, key: &CacheKey, bytes: &[u8]) -> StrokeResult<bool>;

    /// Overwrite an entry unconditionally.
    fn replace(&self, key: &CacheKey, bytes: &[u8]) -> StrokeResult<()>;

    /// Drop every entry. Returns the number removed.
    fn invalidate_all(&self) -> StrokeResult<usize>;

    /// Store name for logging.
    fn name(&self) -> &str;
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory-backed store, one JSON file per entry.
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    /// Open (and create) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StrokeResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    fn write_temp(&self, key: &CacheKey, bytes: &[u8]) -> StrokeResult<PathBuf> {
        let sequence = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let temp = self
            .root
            .join(format!(".{key}.{}.{sequence}.tmp", std::process::id()));
        std::fs::write(&temp, bytes)
            .map_err(|e| StrokeError::cache(format!("Failed to write {}: {e}", temp.display())))?;
        Ok(temp)
    }
}

impl CacheStore for FsCacheStore {
    fn get(&self, key: &CacheKey) -> StrokeResult<Option<Vec<u8>>> {
        match std::fs::read(self.entry_path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put_if_absent(&self, key: &CacheKey, bytes: &[u8]) -> StrokeResult<bool> {
        let temp = self.write_temp(key, bytes)?;
        // hard_link fails if the target exists, so exactly one writer publishes
        let result = std::fs::hard_link(&temp, self.entry_path(key));
        std::fs::remove_file(&temp).ok();
        match result {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(StrokeError::cache(format!("Failed to publish {key}: {e}"))),
        }
    }

    fn replace(&self, key: &CacheKey, bytes: &[u8]) -> StrokeResult<()> {
        let temp = self.write_temp(key, bytes)?;
        std::fs::rename(&temp, self.entry_path(key)).map_err(|e| {
            std::fs::remove_file(&temp).ok();
            StrokeError::cache(format!("Failed to replace {key}: {e}"))
        })
    }

    fn invalidate_all(&self) -> StrokeResult<usize> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let is_entry = path.extension().is_some_and(|ext| ext == "json");
            let is_temp = path.extension().is_some_and(|ext| ext == "tmp");
            if is_entry || is_temp {
                std::fs::remove_file(&path)?;
                if is_entry {
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    fn name(&self) -> &str {
        "fs"
    }
}

/// In-process store, mainly for tests and one-shot runs.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StrokeResult<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.entries
            .lock()
            .map_err(|_| StrokeError::cache("memory store lock poisoned"))
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> StrokeResult<Option<Vec<u8>>> {
        Ok(self.lock()?.get(&key.to_string()).cloned())
    }

    fn put_if_absent(&self, key: &CacheKey, bytes: &[u8]) -> StrokeResult<bool> {
        let mut entries = self.lock()?;
        match entries.entry(key.to_string()) {
            std::collections::hash_map::Entry::Occupied(_) => Ok(false),
            std::collections::hash_map::Entry::Vacant(slot) => {
                slot.insert(bytes.to_vec());
                Ok(true)
            }
        }
    }

    fn replace(&self, key: &CacheKey, bytes: &[u8]) -> StrokeResult<()> {
        self.lock()?.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn invalidate_all(&self) -> StrokeResult<usize> {
        let mut entries = self.lock()?;
        let removed = entries.len();
        entries.clear();
        Ok(removed)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(stage: &str) -> CacheKey {
        CacheKey::new(Fingerprint(1), stage, Fingerprint(2))
    }

    fn temp_store(name: &str) -> FsCacheStore {
        let dir = std::env::temp_dir().join(format!("strokelab_test_store_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        FsCacheStore::open(dir).unwrap()
    }

    #[test]
    fn test_key_file_name() {
        assert_eq!(
            key("features").file_name(),
            "0000000000000001-features-0000000000000002.json"
        );
    }

    #[test]
    fn test_fs_first_writer_wins() {
        let store = temp_store("first_writer");
        assert!(store.get(&key("contact")).unwrap().is_none());
        assert!(store.put_if_absent(&key("contact"), b"one").unwrap());
        assert!(!store.put_if_absent(&key("contact"), b"two").unwrap());
        assert_eq!(store.get(&key("contact")).unwrap().unwrap(), b"one");

        store.replace(&key("contact"), b"three").unwrap();
        assert_eq!(store.get(&key("contact")).unwrap().unwrap(), b"three");
        std::fs::remove_dir_all(store.root()).ok();
    }

    #[test]
    fn test_fs_concurrent_writers_publish_once() {
        let store = temp_store("concurrent");
        let wins: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|i| {
                    let store = &store;
                    scope.spawn(move || {
                        let payload = format!("writer-{i}");
                        store.put_if_absent(&key("eval"), payload.as_bytes()).unwrap() as usize
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });
        assert_eq!(wins, 1);

        let stored = String::from_utf8(store.get(&key("eval")).unwrap().unwrap()).unwrap();
        assert!(stored.starts_with("writer-"));

        let temps = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
            .count();
        assert_eq!(temps, 0);
        std::fs::remove_dir_all(store.root()).ok();
    }

    #[test]
    fn test_fs_invalidate_all() {
        let store = temp_store("invalidate");
        store.put_if_absent(&key("a"), b"1").unwrap();
        store.put_if_absent(&key("b"), b"2").unwrap();
        assert_eq!(store.invalidate_all().unwrap(), 2);
        assert!(store.get(&key("a")).unwrap().is_none());
        std::fs::remove_dir_all(store.root()).ok();
    }

    #[test]
    fn test_memory_store_semantics() {
        let store = MemoryCacheStore::new();
        assert!(store.put_if_absent(&key("a"), b"1").unwrap());
        assert!(!store.put_if_absent(&key("a"), b"2").unwrap());
        store.replace(&key("a"), b"3").unwrap();
        assert_eq!(store.get(&key("a")).unwrap().unwrap(), b"3");
        assert_eq!(store.invalidate_all().unwrap(), 1);
        assert!(store.is_empty());
    }
}
