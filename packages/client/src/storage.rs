//! Durable key-value storage for the session.
//!
//! The session keeps exactly two entries, [`AUTH_TOKEN_KEY`] and
//! [`USER_DATA_KEY`], and is the only component that touches the store.
//! Access is synchronous.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`MemoryStore`] | Tests and sessions that should not outlive the process |
//! | [`FileStore`] | Command-line use; one JSON document on disk |

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use tracing::warn;

/// Raw bearer token.
pub const AUTH_TOKEN_KEY: &str = "auth_token";

/// JSON-serialized [`Identity`](safetrack_api::Identity).
pub const USER_DATA_KEY: &str = "user_data";

/// Errors a store can return when writing.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode session data: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Client-local durable storage.
///
/// Reads never fail: an entry that cannot be read is reported as absent.
pub trait SessionStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removing a missing key succeeds.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Thread-safe, in-memory implementation of [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// [`SessionStore`] backed by a single JSON object on disk.
///
/// Every write rewrites the whole document through a temporary file and a
/// rename, so a crash never leaves a half-written session behind. A missing
/// file is an empty store; an unreadable or corrupt one is treated the same
/// way (with a warning) and replaced on the next write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, String> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return BTreeMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot read session file");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "session file is corrupt, ignoring it");
            BTreeMap::new()
        })
    }

    fn save(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn modify(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>) -> bool,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load();
        if apply(&mut entries) {
            self.save(&entries)?;
        }
        Ok(())
    }
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.modify(|entries| entries.remove(key).is_some())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session_file() -> (PathBuf, TempDir) {
        let dir = TempDir::new().unwrap();
        (dir.path().join("session.json"), dir)
    }

    #[test]
    fn memory_store_roundtrip() {
        let s = MemoryStore::new();
        assert!(s.get(AUTH_TOKEN_KEY).is_none());
        s.set(AUTH_TOKEN_KEY, "tok").unwrap();
        assert_eq!(s.get(AUTH_TOKEN_KEY).as_deref(), Some("tok"));
        s.remove(AUTH_TOKEN_KEY).unwrap();
        s.remove(AUTH_TOKEN_KEY).unwrap();
        assert!(s.is_empty());
    }

    #[test]
    fn file_store_persists_across_instances() {
        let (path, _dir) = session_file();
        FileStore::new(&path).set(AUTH_TOKEN_KEY, "tok").unwrap();
        FileStore::new(&path).set(USER_DATA_KEY, "{}").unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get(AUTH_TOKEN_KEY).as_deref(), Some("tok"));
        assert_eq!(reopened.get(USER_DATA_KEY).as_deref(), Some("{}"));

        reopened.remove(AUTH_TOKEN_KEY).unwrap();
        assert!(FileStore::new(&path).get(AUTH_TOKEN_KEY).is_none());
    }

    #[test]
    fn file_store_creates_missing_parent_dirs() {
        let (path, _dir) = session_file();
        let nested = path.with_file_name("nested").join("session.json");
        FileStore::new(&nested).set(AUTH_TOKEN_KEY, "tok").unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let (path, _dir) = session_file();
        let s = FileStore::new(path);
        assert!(s.get(AUTH_TOKEN_KEY).is_none());
        // Removing from a store that was never written creates nothing.
        s.remove(AUTH_TOKEN_KEY).unwrap();
        assert!(!s.path().exists());
    }

    #[test]
    fn file_store_corrupt_file_reads_empty_and_is_replaced() {
        let (path, _dir) = session_file();
        fs::write(&path, "not json").unwrap();

        let s = FileStore::new(&path);
        assert!(s.get(AUTH_TOKEN_KEY).is_none());
        s.set(AUTH_TOKEN_KEY, "tok").unwrap();
        assert_eq!(s.get(AUTH_TOKEN_KEY).as_deref(), Some("tok"));
    }
}
