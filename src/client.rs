//! Client Auth Cache
//!
//! Remembers who is signed in between client restarts. The server never
//! reads this: it is a convenience copy of the public user fields, while the
//! session itself lives in the HttpOnly cookie.

use crate::models::PublicUser;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Storage key for the cached identity
pub const USER_INFO_KEY: &str = "session-auth.userInfo";

/// Bumped whenever the cached entry changes shape
pub const SCHEMA_VERSION: u32 = 1;

/// Client cache errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// String key-value storage surviving client restarts
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError>;

    fn set(&mut self, key: &str, value: String) -> Result<(), ClientError>;

    fn remove(&mut self, key: &str) -> Result<(), ClientError>;
}

// ============================================
// Storage Backends
// ============================================

/// Process-local storage; forgets everything on drop
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ClientError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), ClientError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Storage backed by a JSON object file, rewritten on every mutation
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// Open the file at `path`; a missing file starts out empty
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref().to_path_buf();

        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => BTreeMap::new(),
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), ClientError> {
        let raw = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, ClientError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), ClientError> {
        self.entries.insert(key.to_string(), value);
        self.persist()
    }

    fn remove(&mut self, key: &str) -> Result<(), ClientError> {
        if self.entries.remove(key).is_some() {
            self.persist()?;
        }
        Ok(())
    }
}

// ============================================
// Auth Cache
// ============================================

/// Versioned envelope written under [`USER_INFO_KEY`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub version: u32,
    pub user: PublicUser,
}

/// Cached identity of the signed-in user
#[derive(Debug)]
pub struct AuthCache<S: KeyValueStore> {
    storage: S,
    user_info: Option<PublicUser>,
}

impl<S: KeyValueStore> AuthCache<S> {
    /// Restore the cached identity. An entry that does not parse or was
    /// written under another schema version is discarded.
    pub fn load(mut storage: S) -> Result<Self, ClientError> {
        let user_info = match storage.get(USER_INFO_KEY)? {
            None => None,
            Some(raw) => match serde_json::from_str::<CacheEntry>(&raw) {
                Ok(entry) if entry.version == SCHEMA_VERSION => Some(entry.user),
                Ok(entry) => {
                    tracing::info!(
                        version = entry.version,
                        "Discarding cached user from another schema version"
                    );
                    storage.remove(USER_INFO_KEY)?;
                    None
                }
                Err(e) => {
                    tracing::warn!("Discarding unreadable cached user: {}", e);
                    storage.remove(USER_INFO_KEY)?;
                    None
                }
            },
        };

        Ok(Self { storage, user_info })
    }

    /// Remember the user returned by a successful login or registration
    pub fn set_credentials(&mut self, user: PublicUser) -> Result<(), ClientError> {
        let entry = CacheEntry {
            version: SCHEMA_VERSION,
            user,
        };
        self.storage
            .set(USER_INFO_KEY, serde_json::to_string(&entry)?)?;
        self.user_info = Some(entry.user);
        Ok(())
    }

    /// Forget the cached user
    pub fn logout(&mut self) -> Result<(), ClientError> {
        self.storage.remove(USER_INFO_KEY)?;
        self.user_info = None;
        Ok(())
    }

    pub fn user_info(&self) -> Option<&PublicUser> {
        self.user_info.as_ref()
    }

    pub fn into_storage(self) -> S {
        self.storage
    }
}
