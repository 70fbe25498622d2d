//! JSON-file keychain.
//!
//! The whole keychain lives in one JSON object `{ "<tag>": "<material>" }`.
//! `init` restores it; every mutation rewrites it through a temp file that
//! is renamed over the target, so readers never see a half-written file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{KEYCHAIN_COMPONENT, KeyStore};
use crate::error::CryptoError;
use crate::lifecycle::{InitGate, LifecycleState};

/// Keychain persisted to a JSON file with owner-only permissions.
#[derive(Debug)]
pub struct FileKeyStore {
    path: PathBuf,
    gate: InitGate,
    entries: Mutex<HashMap<String, String>>,
}

impl FileKeyStore {
    /// Bind to `path`. Nothing is read until `init`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            gate: InitGate::new(KEYCHAIN_COMPONENT),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> LifecycleState {
        self.gate.state()
    }

    async fn restore(&self) -> Result<(), CryptoError> {
        let restored = load(&self.path).await?;
        info!(
            path = %self.path.display(),
            entries = restored.len(),
            "Keychain restored"
        );
        *self.entries.lock().await = restored;
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    async fn init(&self) -> Result<(), CryptoError> {
        self.gate.initialize(|| self.restore()).await
    }

    async fn has(&self, tag: &str) -> Result<bool, CryptoError> {
        self.gate.ensure_ready()?;
        Ok(self.entries.lock().await.contains_key(tag))
    }

    async fn get(&self, tag: &str) -> Result<String, CryptoError> {
        self.gate.ensure_ready()?;
        self.entries
            .lock()
            .await
            .get(tag)
            .cloned()
            .ok_or_else(|| CryptoError::not_found(tag))
    }

    async fn set(&self, tag: &str, material: &str) -> Result<(), CryptoError> {
        self.gate.ensure_ready()?;
        let mut entries = self.entries.lock().await;
        let previous = entries.insert(tag.to_string(), material.to_string());
        if let Err(e) = persist(&self.path, &entries).await {
            match previous {
                Some(old) => entries.insert(tag.to_string(), old),
                None => entries.remove(tag),
            };
            return Err(e);
        }
        debug!(tag, "Keychain entry written");
        Ok(())
    }

    async fn delete(&self, tag: &str) -> Result<(), CryptoError> {
        self.gate.ensure_ready()?;
        let mut entries = self.entries.lock().await;
        let Some(previous) = entries.remove(tag) else {
            return Ok(());
        };
        if let Err(e) = persist(&self.path, &entries).await {
            entries.insert(tag.to_string(), previous);
            return Err(e);
        }
        debug!(tag, "Keychain entry deleted");
        Ok(())
    }
}

/// Read the keychain file. A missing file is an empty keychain.
async fn load(path: &Path) -> Result<HashMap<String, String>, CryptoError> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_str(&data).map_err(|e| {
        CryptoError::StoreUnavailable(format!(
            "Failed to parse keychain file {}: {e}",
            path.display()
        ))
    })
}

async fn persist(path: &Path, entries: &HashMap<String, String>) -> Result<(), CryptoError> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            tokio::fs::create_dir_all(dir).await?;
        }
    }
    let json = serde_json::to_string_pretty(entries).map_err(|e| {
        CryptoError::StoreUnavailable(format!("Failed to serialize keychain: {e}"))
    })?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let mut file = create_private(&tmp).await?;
    file.write_all(json.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Create `path` readable by the owner only from the first byte. A leftover
/// file from an interrupted write is removed first, since its mode would
/// survive reopening.
async fn create_private(path: &Path) -> Result<tokio::fs::File, CryptoError> {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(e.into());
        }
    }
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);
    Ok(options.open(path).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> FileKeyStore {
        FileKeyStore::new(dir.path().join("keys").join("keychain.json"))
    }

    #[tokio::test]
    async fn missing_file_is_empty_keychain() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.init().await.unwrap();
        assert_eq!(store.state(), LifecycleState::Ready);
        assert!(!store.has("anything").await.unwrap());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = store_in(&dir);
            store.init().await.unwrap();
            store.set("t1", "aa").await.unwrap();
            store.set("t2", "bb").await.unwrap();
            store.set("t1", "cc").await.unwrap();
            store.delete("t2").await.unwrap();
        }

        let reopened = store_in(&dir);
        reopened.init().await.unwrap();
        assert_eq!(reopened.get("t1").await.unwrap(), "cc");
        assert!(!reopened.has("t2").await.unwrap());
    }

    #[tokio::test]
    async fn operations_before_init_fail() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert!(matches!(
            store.set("t", "aa").await,
            Err(CryptoError::NotInitialized {
                component: "keychain"
            })
        ));
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn corrupted_file_fails_init_and_stays_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), "{ not valid json !!!").unwrap();

        let err = store.init().await.unwrap_err();
        assert!(matches!(err, CryptoError::StoreUnavailable(_)));
        assert_eq!(store.state(), LifecycleState::Uninitialized);

        std::fs::write(store.path(), r#"{"t":"aa"}"#).unwrap();
        store.init().await.unwrap();
        assert_eq!(store.get("t").await.unwrap(), "aa");
    }

    #[tokio::test]
    async fn delete_missing_tag_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.init().await.unwrap();
        store.delete("ghost").await.unwrap();
        assert!(!store.path().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.init().await.unwrap();
        store.set("t", "aa").await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn temp_file_is_private_before_any_write() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tmp = dir.path().join("keychain.json.tmp");
        std::fs::write(&tmp, "stale").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        let file = create_private(&tmp).await.unwrap();
        let meta = file.metadata().await.unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
        assert_eq!(meta.len(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stale_world_readable_temp_file_does_not_leak_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.init().await.unwrap();

        let keys_dir = store.path().parent().unwrap().to_path_buf();
        std::fs::create_dir_all(&keys_dir).unwrap();
        let tmp = keys_dir.join("keychain.json.tmp");
        std::fs::write(&tmp, "{}").unwrap();
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o644)).unwrap();

        store.set("t", "aa").await.unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600);
        assert!(!tmp.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failed_write_leaves_memory_unchanged() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.init().await.unwrap();
        store.set("t", "aa").await.unwrap();

        let keys_dir = store.path().parent().unwrap().to_path_buf();
        std::fs::set_permissions(&keys_dir, std::fs::Permissions::from_mode(0o555)).unwrap();
        let result = store.set("t", "bb").await;
        std::fs::set_permissions(&keys_dir, std::fs::Permissions::from_mode(0o755)).unwrap();

        // Root ignores directory permissions; only assert when the write failed.
        if result.is_err() {
            assert!(matches!(result, Err(CryptoError::StoreUnavailable(_))));
            assert_eq!(store.get("t").await.unwrap(), "aa");
        }
    }
}
