//! Key/value persistence for session credentials.
//!
//! The web front end kept its tokens in browser-local storage. Here the same
//! role is played by the [`Storage`] trait with three backends:
//!
//! - [`FileStorage`]: a small JSON document on disk (default)
//! - [`KeyringStorage`]: the OS keychain
//! - [`MemoryStorage`]: process memory only, used by tests and short-lived tools

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;
use thiserror::Error;
use tracing::warn;

/// Keychain service name
const SERVICE_NAME: &str = "pocketbook";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to access session file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse session file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// String key/value store shared by every request path.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// JSON file backend. The file is re-read on every access so that several
/// processes sharing a session file observe each other's writes.
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    /// Load the map for a read-modify-write cycle. An unparsable file is
    /// replaced rather than reported, so login and logout can recover from it.
    /// The flag is true when the file on disk has to be rewritten.
    fn read_map_for_update(&self) -> Result<(BTreeMap<String, String>, bool), StorageError> {
        match self.read_map() {
            Ok(map) => Ok((map, false)),
            Err(StorageError::Parse(e)) => {
                warn!(path = %self.path.display(), error = %e, "Discarding corrupt session file");
                Ok((BTreeMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if map.is_empty() {
            if self.path.exists() {
                fs::remove_file(&self.path)?;
            }
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(map)?;

        // Write next to the target and rename over it so readers never see a torn file
        let tmp_path = self.tmp_path();
        if let Err(e) = write_private(&tmp_path, contents.as_bytes())
            .and_then(|()| fs::rename(&tmp_path, &self.path))
        {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Tokens are credentials: owner read/write only
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    fs::write(path, contents)
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read_map()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let (mut map, _) = self.read_map_for_update()?;
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let (mut map, corrupt) = self.read_map_for_update()?;
        if map.remove(key).is_some() || corrupt {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// OS keychain backend. Each key becomes one keychain entry under the
/// `pocketbook` service, scoped by account name.
pub struct KeyringStorage {
    account: String,
}

impl KeyringStorage {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Ok(Entry::new(SERVICE_NAME, &format!("{}:{}", self.account, key))?)
    }
}

impl Storage for KeyringStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("access_token").unwrap(), None);

        storage.set("access_token", "A1").unwrap();
        assert_eq!(storage.get("access_token").unwrap().as_deref(), Some("A1"));

        storage.remove("access_token").unwrap();
        assert_eq!(storage.get("access_token").unwrap(), None);
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let first = FileStorage::new(&path);
        first.set("access_token", "A1").unwrap();
        first.set("refresh_token", "R1").unwrap();

        let second = FileStorage::new(&path);
        assert_eq!(second.get("access_token").unwrap().as_deref(), Some("A1"));
        assert_eq!(second.get("refresh_token").unwrap().as_deref(), Some("R1"));
    }

    #[test]
    fn test_file_storage_removes_file_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::new(&path);

        storage.set("access_token", "A1").unwrap();
        assert!(path.exists());

        storage.remove("access_token").unwrap();
        assert!(!path.exists());

        // Removing a missing key is not an error
        storage.remove("refresh_token").unwrap();
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.get("access_token"), Err(StorageError::Parse(_))));
    }

    #[test]
    fn test_file_storage_remove_discards_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"access_token": "A1", trunc"#).unwrap();

        let storage = FileStorage::new(&path);
        storage.remove("access_token").unwrap();
        storage.remove("refresh_token").unwrap();

        assert!(!path.exists());
        assert_eq!(storage.get("access_token").unwrap(), None);
    }

    #[test]
    fn test_file_storage_set_replaces_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"access_token": "A1", trunc"#).unwrap();

        let storage = FileStorage::new(&path);
        storage.set("access_token", "A2").unwrap();

        assert_eq!(storage.get("access_token").unwrap().as_deref(), Some("A2"));
        assert_eq!(storage.get("refresh_token").unwrap(), None);
    }

    #[test]
    fn test_file_storage_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let storage = FileStorage::new(&path);

        storage.set("access_token", "A1").unwrap();
        storage.set("refresh_token", "R1").unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("session.json")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_storage_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        FileStorage::new(&path).set("access_token", "A1").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
