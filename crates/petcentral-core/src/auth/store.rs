//! Persistent key/value slots backing the session state.
//!
//! Three backends are available:
//! - `FileStore`: a single JSON document in the cache directory (default)
//! - `KeyringStore`: one OS keychain entry per key
//! - `MemoryStore`: process-local, used by tests and ephemeral sessions

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Session file name in cache directory
pub const SESSION_FILE: &str = "session.json";

/// Service name used for keychain entries
const KEYRING_SERVICE: &str = "petcentral-admin";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access session file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse session file: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Session store lock poisoned")]
    Poisoned,
}

/// A namespaced string store whose contents survive a process restart.
///
/// Implementations use interior mutability so a single store can be shared
/// between the gateway and the session controller behind an `Arc`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// When the key was last written, if the backend tracks it.
    fn updated_at(&self, _key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(None)
    }
}

/// A stored slot with its write time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredValue {
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl StoredValue {
    fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
            updated_at: Utc::now(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex.lock().map_err(|_| StoreError::Poisoned)
}

// ============================================================================
// File backend
// ============================================================================

/// JSON document on disk holding every slot.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the document
    guard: Mutex<()>,
}

impl FileStore {
    /// Store the session document as `session.json` inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self::at_path(dir.as_ref().join(SESSION_FILE))
    }

    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read_document(&self) -> Result<BTreeMap<String, StoredValue>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_document(&self, document: &BTreeMap<String, StoredValue>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let contents = serde_json::to_string_pretty(document)?;
        std::fs::write(&self.path, contents).map_err(|e| self.io_error(e))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = lock(&self.guard)?;
        Ok(self.read_document()?.remove(key).map(|v| v.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.guard)?;
        let mut document = self.read_document()?;
        document.insert(key.to_string(), StoredValue::new(value));
        self.write_document(&document)?;
        debug!(key = key, path = %self.path.display(), "Stored session value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = lock(&self.guard)?;
        let mut document = self.read_document()?;
        if document.remove(key).is_some() {
            self.write_document(&document)?;
            debug!(key = key, "Removed session value");
        }
        Ok(())
    }

    fn updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let _guard = lock(&self.guard)?;
        Ok(self.read_document()?.get(key).map(|v| v.updated_at))
    }
}

// ============================================================================
// Keychain backend
// ============================================================================

/// OS keychain storage, one entry per key.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    pub fn with_service(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Ok(Entry::new(&self.service, key)?)
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.values)?.get(key).map(|v| v.value.clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.values)?.insert(key.to_string(), StoredValue::new(value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.values)?.remove(key);
        Ok(())
    }

    fn updated_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(lock(&self.values)?.get(key).map(|v| v.updated_at))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::new(dir.path());
        store.set("token", "abc123").unwrap();
        store.set("authMessage", "hello").unwrap();

        // A fresh instance reads what the previous one wrote
        let reopened = FileStore::new(dir.path());
        assert_eq!(reopened.get("token").unwrap().as_deref(), Some("abc123"));
        assert_eq!(reopened.get("authMessage").unwrap().as_deref(), Some("hello"));
        assert!(reopened.updated_at("token").unwrap().is_some());
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("nested").join("deeper"));

        assert_eq!(store.get("token").unwrap(), None);
        // Removing from a missing document does not create it
        store.remove("token").unwrap();
        assert!(!store.path().exists());

        store.set("token", "t").unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn test_file_store_remove_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store.set("token", "abc").unwrap();
        store.set("redirectAfterLogin", "/breeds").unwrap();

        store.remove("token").unwrap();

        assert_eq!(store.get("token").unwrap(), None);
        assert_eq!(
            store.get("redirectAfterLogin").unwrap().as_deref(),
            Some("/breeds")
        );
    }

    #[test]
    fn test_file_store_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SESSION_FILE), "{not json").unwrap();

        let store = FileStore::new(dir.path());
        assert!(matches!(store.get("token"), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_memory_store_overwrites() {
        let store = MemoryStore::new();
        store.set("token", "first").unwrap();
        store.set("token", "second").unwrap();
        assert_eq!(store.get("token").unwrap().as_deref(), Some("second"));

        store.remove("token").unwrap();
        assert_eq!(store.get("token").unwrap(), None);
        assert_eq!(store.updated_at("token").unwrap(), None);
    }
}
