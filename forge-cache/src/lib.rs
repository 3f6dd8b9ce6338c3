//! Blueprint and route-export cache backends for Forge.
//!
//! Two backends share one [`CacheBackend`] trait: a [`FileBackend`] that
//! persists entries with an atomic temp-file-then-rename write, and a
//! [`NullBackend`] that degrades every operation to a no-op miss.
//! [`CacheManagerIntegration`] picks between them based on config, and a
//! caller can always ask [`CacheBackend::backend_kind`] for observability.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Which concrete backend is answering a given `get`/`set`, exposed for
/// observability per `spec.md`'s `getBackendKind()`.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum BackendKind {
    File,
    Null,
}

/// Why a read missed: absent entirely, or present but unreadable.
#[derive(Debug)]
pub enum CacheError {
    /// Entry bytes didn't deserialize; caller treats this the same as a
    /// miss and re-derives the value.
    Corrupted { key: String, reason: String },
    /// A write failed; the cache is left in its previous state.
    WriteFailed { key: String, reason: String },
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Corrupted { key, reason } => write!(f, "cache entry '{key}' corrupted: {reason}"),
            CacheError::WriteFailed { key, reason } => write!(f, "failed to write cache entry '{key}': {reason}"),
        }
    }
}

impl std::error::Error for CacheError {}

/// A generic cache backend keyed by string, storing arbitrary
/// serde-serializable values. Both the blueprint cache and the router's
/// route-export cache are built on top of this.
pub trait CacheBackend: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    fn set_raw(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError>;
    fn has(&self, key: &str) -> bool;
    fn count(&self) -> usize;
    fn backend_kind(&self) -> BackendKind;

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        Self: Sized,
    {
        match self.get_raw(key)? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|e| CacheError::Corrupted { key: key.to_string(), reason: e.to_string() }),
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        Self: Sized,
    {
        let bytes = serde_json::to_vec(value)
            .map_err(|e| CacheError::WriteFailed { key: key.to_string(), reason: e.to_string() })?;
        self.set_raw(key, &bytes)
    }
}

/// `get` -> miss, `set` -> noop, `has` -> false, `count` -> 0.
pub struct NullBackend;

impl CacheBackend for NullBackend {
    fn get_raw(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    fn set_raw(&self, _key: &str, _bytes: &[u8]) -> Result<(), CacheError> {
        Ok(())
    }

    fn has(&self, _key: &str) -> bool {
        false
    }

    fn count(&self) -> usize {
        0
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::Null
    }
}

/// One file per key under `dir`; writes land in a temp file then an
/// atomic rename so a reader never observes a partial write. A
/// per-key lock table serializes concurrent writers to the same file
/// without blocking readers or unrelated keys.
pub struct FileBackend {
    dir: PathBuf,
    ext: &'static str,
    locks: Mutex<HashMap<String, ()>>,
}

impl FileBackend {
    /// `ext` is the file extension (without the dot) used for every
    /// entry, e.g. `"json"`.
    pub fn new(dir: impl Into<PathBuf>, ext: &'static str) -> Self {
        Self {
            dir: dir.into(),
            ext,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", sanitize(key), self.ext))
    }

    fn temp_path_for(&self, key: &str) -> PathBuf {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        std::process::id().hash(&mut hasher);
        self.dir.join(format!("{}.{}.tmp-{:x}", sanitize(key), self.ext, hasher.finish()))
    }
}

/// Replace path separators with `_`, matching the blueprint cache's
/// filename derivation rule in `spec.md` §3.
fn sanitize(key: &str) -> String {
    key.replace(['/', '\\', ':'], "_")
}

impl CacheBackend for FileBackend {
    fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Corrupted { key: key.to_string(), reason: e.to_string() }),
        }
    }

    fn set_raw(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let _guard = self.locks.lock().expect("cache lock table poisoned");
        fs::create_dir_all(&self.dir)
            .map_err(|e| CacheError::WriteFailed { key: key.to_string(), reason: e.to_string() })?;
        let tmp = self.temp_path_for(key);
        fs::write(&tmp, bytes)
            .map_err(|e| CacheError::WriteFailed { key: key.to_string(), reason: e.to_string() })?;
        fs::rename(&tmp, self.path_for(key))
            .map_err(|e| CacheError::WriteFailed { key: key.to_string(), reason: e.to_string() })?;
        Ok(())
    }

    fn has(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    fn count(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| entries.filter_map(Result::ok).count())
            .unwrap_or(0)
    }

    fn backend_kind(&self) -> BackendKind {
        BackendKind::File
    }
}

/// Picks a concrete [`CacheBackend`] based on whether the caller
/// supplied a usable cache directory, degrading to [`NullBackend`] with
/// a warning when the directory isn't writable — matching `spec.md`
/// §4.2's "must tolerate directory non-writability gracefully".
pub struct CacheManagerIntegration;

impl CacheManagerIntegration {
    pub fn select(cache_dir: Option<&Path>, ext: &'static str) -> Box<dyn CacheBackend> {
        let Some(dir) = cache_dir else {
            return Box::new(NullBackend);
        };
        match fs::create_dir_all(dir) {
            Ok(()) => Box::new(FileBackend::new(dir, ext)),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cache directory not writable, degrading to null backend");
                Box::new(NullBackend)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Entry {
        value: i32,
    }

    #[test]
    fn null_backend_always_misses() {
        let b = NullBackend;
        b.set("k", &Entry { value: 1 }).unwrap();
        assert_eq!(b.get::<Entry>("k").unwrap(), None);
        assert!(!b.has("k"));
        assert_eq!(b.count(), 0);
    }

    #[test]
    fn file_backend_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let b = FileBackend::new(dir.path(), "json");
        assert_eq!(b.get::<Entry>("my::key").unwrap(), None);
        b.set("my::key", &Entry { value: 7 }).unwrap();
        assert!(b.has("my::key"));
        assert_eq!(b.get::<Entry>("my::key").unwrap(), Some(Entry { value: 7 }));
    }

    #[test]
    fn file_backend_overwrite_is_atomic_from_readers_view() {
        let dir = tempfile::tempdir().unwrap();
        let b = FileBackend::new(dir.path(), "json");
        b.set("k", &Entry { value: 1 }).unwrap();
        b.set("k", &Entry { value: 2 }).unwrap();
        assert_eq!(b.get::<Entry>("k").unwrap(), Some(Entry { value: 2 }));
    }

    #[test]
    fn corrupted_entry_reported_not_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let b = FileBackend::new(dir.path(), "json");
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join("bad.json"), b"not json").unwrap();
        let err = b.get::<Entry>("bad").unwrap_err();
        assert!(matches!(err, CacheError::Corrupted { .. }));
    }

    #[test]
    fn manager_degrades_to_null_without_dir() {
        let backend = CacheManagerIntegration::select(None, "json");
        assert_eq!(backend.backend_kind(), BackendKind::Null);
    }

    #[test]
    fn manager_selects_file_backend_with_dir() {
        let dir = tempfile::tempdir().unwrap();
        let backend = CacheManagerIntegration::select(Some(dir.path()), "json");
        assert_eq!(backend.backend_kind(), BackendKind::File);
    }
}
