//! Cached browser session state, one file per account identity.
//!
//! Files live at `<data_dir>/sessions/<identity>.json` and are replaced with
//! an atomic rename. A per-identity async lock serialises the login and
//! persist path so two runs for the same account never race on the file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::core::models::{AccountIdentity, SessionArtifact};
use crate::core::provider::Provider;
use crate::error::{CdkError, Result};

/// On-disk envelope around a session artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    pub identity: AccountIdentity,
    pub provider: Provider,
    pub saved_at: DateTime<Utc>,
    /// Opaque browser state.
    pub state: String,
}

impl StoredSession {
    #[must_use]
    pub fn artifact(&self) -> SessionArtifact {
        SessionArtifact::new(self.state.clone())
    }
}

/// Directory of stored sessions plus the per-identity locks.
#[derive(Debug)]
pub struct SessionStore {
    dir: PathBuf,
    locks: DashMap<AccountIdentity, Arc<Mutex<()>>>,
}

impl SessionStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: DashMap::new(),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the session for `identity`.
    #[must_use]
    pub fn path_for(&self, identity: &AccountIdentity) -> PathBuf {
        self.dir.join(format!("{identity}.json"))
    }

    /// Get or create the login lock for an identity.
    #[must_use]
    pub fn lock_for(&self, identity: &AccountIdentity) -> Arc<Mutex<()>> {
        self.locks
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Load the stored session, if any.
    ///
    /// An unreadable file is treated as absent so a fresh login replaces it.
    pub fn load(&self, identity: &AccountIdentity) -> Result<Option<StoredSession>> {
        let path = self.path_for(identity);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&content) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring corrupt session file");
                Ok(None)
            }
        }
    }

    /// Persist an artifact, overwriting any previous one for the identity.
    pub fn save(
        &self,
        identity: &AccountIdentity,
        provider: Provider,
        artifact: &SessionArtifact,
    ) -> Result<StoredSession> {
        std::fs::create_dir_all(&self.dir)?;
        let stored = StoredSession {
            identity: identity.clone(),
            provider,
            saved_at: Utc::now(),
            state: artifact.as_str().to_string(),
        };
        let content = serde_json::to_vec_pretty(&stored)?;
        let path = self.path_for(identity);
        write_atomic(&path, &content)?;
        tracing::debug!(identity = %identity, path = %path.display(), "Session saved");
        Ok(stored)
    }

    /// All stored sessions, sorted by identity.
    pub fn list(&self) -> Result<Vec<StoredSession>> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut sessions = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some(stored) = self.load(&AccountIdentity::from_key(stem))? {
                sessions.push(stored);
            }
        }
        sessions.sort_by(|a, b| a.identity.cmp(&b.identity));
        Ok(sessions)
    }

    /// Delete the stored session. Returns whether a file was removed.
    pub fn clear(&self, identity: &AccountIdentity) -> Result<bool> {
        match std::fs::remove_file(self.path_for(identity)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CdkError::Io(e)),
        }
    }
}

/// Write via a temp file in the same directory and rename over the target.
fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("session"),
        std::process::id()
    ));

    {
        let mut file = std::fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    std::fs::rename(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join("sessions"));
        (dir, store)
    }

    #[test]
    fn missing_session_loads_as_none() {
        let (_dir, store) = store();
        let identity = AccountIdentity::from_login("alice");
        assert!(store.load(&identity).unwrap().is_none());
        assert!(!store.clear(&identity).unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn save_overwrites_and_round_trips() {
        let (_dir, store) = store();
        let identity = AccountIdentity::from_login("alice");
        store
            .save(&identity, Provider::B4u, &SessionArtifact::new("first"))
            .unwrap();
        store
            .save(&identity, Provider::B4u, &SessionArtifact::new("second"))
            .unwrap();

        let loaded = store.load(&identity).unwrap().unwrap();
        assert_eq!(loaded.artifact(), SessionArtifact::new("second"));
        assert_eq!(loaded.provider, Provider::B4u);
        assert_eq!(store.list().unwrap().len(), 1);

        let leftovers: Vec<_> = std::fs::read_dir(store.dir())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let (_dir, store) = store();
        let identity = AccountIdentity::from_login("bob");
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.path_for(&identity), "{not json").unwrap();
        assert!(store.load(&identity).unwrap().is_none());
    }

    #[test]
    fn clear_removes_file() {
        let (_dir, store) = store();
        let identity = AccountIdentity::from_login("carol");
        store
            .save(&identity, Provider::B4u, &SessionArtifact::new("s"))
            .unwrap();
        assert!(store.clear(&identity).unwrap());
        assert!(store.load(&identity).unwrap().is_none());
    }

    #[test]
    fn locks_are_shared_per_identity() {
        let (_dir, store) = store();
        let a = AccountIdentity::from_login("alice");
        let b = AccountIdentity::from_login("bob");
        assert!(Arc::ptr_eq(&store.lock_for(&a), &store.lock_for(&a)));
        assert!(!Arc::ptr_eq(&store.lock_for(&a), &store.lock_for(&b)));
    }
}
