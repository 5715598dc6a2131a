//! Session token persistence.
//!
//! The token is kept under a fixed key in a small JSON document so it
//! survives restarts. Access goes through [`CredentialStore`] so tests can
//! substitute [`MemoryCredentialStore`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use phama_common::error::ResultExt;

use crate::error::{ClientError, Result};

/// Key under which the session token is stored.
pub const TOKEN_KEY: &str = "token";

/// File name of the session document inside the data directory.
pub const SESSION_FILE: &str = "session.json";

/// Persistent holder of the opaque session token.
pub trait CredentialStore: Send + Sync {
    /// Read the persisted token, if any. Blank tokens count as absent.
    fn load(&self) -> Result<Option<String>>;

    /// Persist a token, replacing any previous one.
    fn save(&self, token: &str) -> Result<()>;

    /// Remove the persisted token. Clearing an empty store succeeds.
    fn clear(&self) -> Result<()>;
}

/// File-backed store at `{data_dir}/session.json`.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store the session document inside `data_dir`.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SESSION_FILE),
        }
    }

    /// Store the session document at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content = fs::read_to_string(&self.path)
            .context(format!("failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let doc: BTreeMap<String, String> = serde_json::from_str(&content)
            .context(format!("failed to parse {}", self.path.display()))?;
        Ok(doc)
    }

    fn write_document(&self, doc: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .context(format!("failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(doc).context("failed to encode session")?;
        fs::write(&self.path, content)
            .context(format!("failed to write {}", self.path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600));
        }

        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        let doc = self.read_document()?;
        Ok(doc.get(TOKEN_KEY).filter(|t| !t.trim().is_empty()).cloned())
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut doc = self.read_document().unwrap_or_default();
        doc.insert(TOKEN_KEY.to_string(), token.to_string());
        self.write_document(&doc)?;
        tracing::debug!(path = %self.path.display(), "Session token persisted");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut doc = self.read_document().unwrap_or_default();
        doc.remove(TOKEN_KEY);
        self.write_document(&doc)?;
        tracing::debug!(path = %self.path.display(), "Session token cleared");
        Ok(())
    }
}

/// Process-local store with no persistence.
#[derive(Default)]
pub struct MemoryCredentialStore {
    token: Mutex<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a token already "persisted".
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<Option<String>> {
        let token = self
            .token
            .lock()
            .map_err(|e| ClientError::Storage(format!("Lock error: {e}")))?;
        Ok(token.clone().filter(|t| !t.trim().is_empty()))
    }

    fn save(&self, token: &str) -> Result<()> {
        let mut slot = self
            .token
            .lock()
            .map_err(|e| ClientError::Storage(format!("Lock error: {e}")))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self
            .token
            .lock()
            .map_err(|e| ClientError::Storage(format!("Lock error: {e}")))? = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());

        assert_eq!(store.load().unwrap(), None);
        store.save("T1").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("T1"));

        // A second handle on the same directory sees the token (restart)
        let reopened = FileCredentialStore::new(dir.path());
        assert_eq!(reopened.load().unwrap().as_deref(), Some("T1"));

        store.clear().unwrap();
        assert_eq!(reopened.load().unwrap(), None);
    }

    #[test]
    fn file_store_uses_fixed_key() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        store.save("opaque").unwrap();

        let raw = fs::read_to_string(dir.path().join(SESSION_FILE)).unwrap();
        let doc: BTreeMap<String, String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(doc.get(TOKEN_KEY).map(String::as_str), Some("opaque"));
    }

    #[test]
    fn file_store_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::at(dir.path().join("a").join("b").join("s.json"));
        store.save("T2").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("T2"));
    }

    #[test]
    fn clear_without_file_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert!(store.clear().is_ok());
        assert!(!store.path().exists());
    }

    #[test]
    fn blank_token_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SESSION_FILE), r#"{"token": "  "}"#).unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SESSION_FILE), "{{{").unwrap();
        let store = FileCredentialStore::new(dir.path());
        assert!(matches!(store.load(), Err(ClientError::Storage(_))));

        // Saving over a corrupt document recovers it
        store.save("T3").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("T3"));
    }

    #[test]
    fn memory_store() {
        let store = MemoryCredentialStore::with_token("T9");
        assert_eq!(store.load().unwrap().as_deref(), Some("T9"));
        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), None);
        store.save("T10").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("T10"));
    }
}
