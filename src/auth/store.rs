//! Durable storage for the serialized session.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::error::StoreError;
use super::session::{SerializedSession, Session};

/// Key the session record is stored under.
pub const SESSION_KEY: &str = "spotify_session";

/// Durable key-value storage supplied by the host.
///
/// Calls are synchronous and each write replaces the whole value.
pub trait KeyValueStore: Send + Sync {
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Stores each key as a file inside `dir`.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl KeyValueStore for FileStore {
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        use std::io::Write;

        std::fs::create_dir_all(&self.dir)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Owner read/write only, from the moment the file exists
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(self.path(key))?;

        // `mode` only applies on creation; tighten files left by older writes
        // before any secret goes in
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }

        file.write_all(value)?;
        file.sync_all()?;
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match std::fs::read(self.path(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process storage. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.entries.lock().insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Persists exactly one [`Session`] under [`SESSION_KEY`].
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub fn save(&self, session: &Session) -> Result<(), StoreError> {
        let record = SerializedSession::encode(session)?;
        self.backend.set(SESSION_KEY, record.as_bytes())?;
        tracing::debug!(bytes = record.as_bytes().len(), "Saved session record");
        Ok(())
    }

    /// The stored record, if any. A failed read is logged and treated as absent.
    pub fn load(&self) -> Option<SerializedSession> {
        match self.backend.get(SESSION_KEY) {
            Ok(bytes) => bytes.map(SerializedSession::from),
            Err(e) => {
                tracing::warn!(error = %e, "Could not read session record");
                None
            }
        }
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.backend.remove(SESSION_KEY)?;
        tracing::debug!("Cleared session record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::tests::make_session;

    #[test]
    fn test_load_empty_store() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_save_overwrites_previous_record() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        store.save(&make_session("first", 3600)).unwrap();
        store.save(&make_session("second", 3600)).unwrap();

        let loaded = store.load().unwrap().decode().unwrap();
        assert_eq!(loaded.access_token(), "second");
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = CredentialStore::new(Arc::new(MemoryStore::new()));
        store.save(&make_session("abc", 3600)).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(Arc::new(FileStore::new(dir.path().join("nested"))));
        let session = make_session("abc", 3600);

        store.save(&session).unwrap();
        assert_eq!(store.load().unwrap().decode().unwrap(), session);

        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let backend = FileStore::new(dir.path());
        backend.set(SESSION_KEY, b"{}").unwrap();

        let mode = std::fs::metadata(dir.path().join(SESSION_KEY))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_tightens_existing_file() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SESSION_KEY);
        std::fs::write(&path, b"old").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let backend = FileStore::new(dir.path());
        backend.set(SESSION_KEY, b"new").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(backend.get(SESSION_KEY).unwrap().as_deref(), Some(&b"new"[..]));
    }

    #[test]
    fn test_file_store_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileStore::new(dir.path());
        assert!(backend.get("absent").unwrap().is_none());
        backend.remove("absent").unwrap();
    }
}
