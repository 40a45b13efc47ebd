//! File-backed secret store
//!
//! A single JSON object of hex-encoded values. Every write goes to a sibling
//! temp file first and is then renamed over the original.

use alph_keyring::{SecretStore, StoreError};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Backend(format!("{}: {}", self.path.display(), e)))
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents =
            serde_json::to_string_pretty(entries).map_err(|e| StoreError::Backend(e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        let mut file = create_owner_only(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SecretStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.read_all()?.get(key) {
            Some(value) => hex::decode(value)
                .map(Some)
                .map_err(|e| StoreError::Backend(format!("entry {:?}: {}", key, e))),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        entries.insert(key.to_string(), hex::encode(value));
        self.write_all(&entries)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

/// Open `path` for writing, created with mode 0600 so it is never readable by others
#[cfg(unix)]
fn create_owner_only(path: &Path) -> Result<fs::File, StoreError> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // a leftover temp file keeps its old mode
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn create_owner_only(path: &Path) -> Result<fs::File, StoreError> {
    Ok(fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alph_keyring::{encrypt, WalletStore};
    use tempfile::tempdir;

    #[test]
    fn test_file_store_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("wallets.json");

        let store = FileStore::new(&path);
        assert!(store.get("k").unwrap().is_none());
        store.set("k", &[0xde, 0xad]).unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.get("k").unwrap().unwrap(), vec![0xde, 0xad]);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"dead\""));
        assert!(!path.with_extension("json.tmp").exists());

        reopened.delete("k").unwrap();
        assert!(store.get("k").unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("wallets.json"));
        store.set("k", b"v").unwrap();
        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_temp_file_created_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let tmp = dir.path().join("wallets.json.tmp");

        // stale world-readable leftover from an interrupted write
        fs::write(&tmp, "stale").unwrap();
        fs::set_permissions(&tmp, fs::Permissions::from_mode(0o644)).unwrap();
        let file = create_owner_only(&tmp).unwrap();
        assert_eq!(file.metadata().unwrap().permissions().mode() & 0o777, 0o600);
        drop(file);
        assert_eq!(fs::read_to_string(&tmp).unwrap(), "");

        let fresh = dir.path().join("fresh.json.tmp");
        let file = create_owner_only(&fresh).unwrap();
        assert_eq!(file.metadata().unwrap().permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallets.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(FileStore::new(&path).get("k"), Err(StoreError::Backend(_))));
    }

    #[test]
    fn test_wallet_store_over_file() {
        let dir = tempdir().unwrap();
        let wallets = WalletStore::new(FileStore::new(dir.path().join("wallets.json")));
        let envelope = encrypt("pw", b"payload").unwrap();

        wallets.save("default", &envelope).unwrap();
        assert_eq!(wallets.load("default").unwrap(), envelope);
        assert!(!wallets.exists("other").unwrap());
    }
}
