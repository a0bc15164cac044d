use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::credentials::{CredentialError, CredentialKey, CredentialStore};

/// Credentials file name in the cache directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Credentials persisted as a JSON object on disk.
///
/// Every write rewrites the whole file; the mutex keeps concurrent
/// read-modify-write cycles from interleaving within this process.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(CREDENTIALS_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write(&self, slots: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        if slots.is_empty() {
            if self.path.exists() {
                std::fs::remove_file(&self.path)?;
            }
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(slots)?;
        std::fs::write(&self.path, contents)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<(), CredentialError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut slots = self.read()?;
        f(&mut slots);
        self.write(&slots)
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

impl CredentialStore for FileStore {
    fn get(&self, key: CredentialKey) -> Result<Option<String>, CredentialError> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read()?.remove(key.as_str()))
    }

    fn set(&self, key: CredentialKey, value: &str) -> Result<(), CredentialError> {
        self.update(|slots| {
            slots.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: CredentialKey) -> Result<(), CredentialError> {
        self.update(|slots| {
            slots.remove(key.as_str());
        })
    }

    fn remove_many(&self, keys: &[CredentialKey]) -> Result<(), CredentialError> {
        self.update(|slots| {
            for key in keys {
                slots.remove(key.as_str());
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_set_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        assert_eq!(store.get(CredentialKey::AccessToken).unwrap(), None);

        store.set(CredentialKey::AccessToken, "t1").unwrap();
        store.set(CredentialKey::RefreshToken, "r1").unwrap();
        assert_eq!(store.get(CredentialKey::AccessToken).unwrap().as_deref(), Some("t1"));

        store.remove(CredentialKey::AccessToken).unwrap();
        assert_eq!(store.get(CredentialKey::AccessToken).unwrap(), None);
        assert_eq!(store.get(CredentialKey::RefreshToken).unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        FileStore::new(dir.path())
            .set(CredentialKey::User, r#"{"id":"1"}"#)
            .unwrap();

        let reopened = FileStore::new(dir.path());
        assert_eq!(
            reopened.get(CredentialKey::User).unwrap().as_deref(),
            Some(r#"{"id":"1"}"#)
        );
    }

    #[test]
    fn test_file_store_remove_many_deletes_file() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.set(CredentialKey::AccessToken, "t1").unwrap();
        store.set(CredentialKey::User, "{}").unwrap();
        assert!(store.path().exists());

        store.remove_many(&CredentialKey::ALL).unwrap();
        assert!(!store.path().exists());
        assert_eq!(
            store.get_many(&CredentialKey::ALL).unwrap(),
            vec![None, None, None]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());
        store.set(CredentialKey::AccessToken, "t1").unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
