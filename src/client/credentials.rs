//! Credential storage
//!
//! The API client never reaches for global state: the credential pair lives
//! in a [`CredentialStore`] handed to it at construction.

use std::fs;
use std::path::{Path, PathBuf};

use edge_core::CredentialPair;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Read/write access to the persisted credential pair
pub trait CredentialStore: Send + Sync {
    /// Current pair; an empty pair when nothing is stored
    fn load(&self) -> Result<CredentialPair>;

    /// Replace the stored pair
    fn save(&self, pair: &CredentialPair) -> Result<()>;

    /// Destroy the stored pair
    fn clear(&self) -> Result<()>;

    /// Current access token, if any
    fn access_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.access_token.filter(|t| !t.is_empty()))
    }

    /// Current refresh token, if any
    fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.refresh_token.filter(|t| !t.is_empty()))
    }

    /// Replace only the access token, keeping refresh token and username
    fn set_access_token(&self, token: &str) -> Result<()> {
        let mut pair = self.load()?;
        pair.access_token = Some(token.to_string());
        self.save(&pair)
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    pair: RwLock<CredentialPair>,
}

impl MemoryCredentialStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `pair`
    pub fn with_pair(pair: CredentialPair) -> Self {
        Self {
            pair: RwLock::new(pair),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Result<CredentialPair> {
        Ok(self.pair.read().clone())
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        *self.pair.write() = pair.clone();
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.pair.write() = CredentialPair::default();
        Ok(())
    }
}

/// JSON file store that survives restarts
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Store backed by the file at `path` (created on first save)
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<CredentialPair> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No stored credentials");
            return Ok(CredentialPair::default());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| Error::Credentials(format!("Failed to read credential file: {e}")))?;
        match serde_json::from_str::<CredentialPair>(&content) {
            Ok(pair) => Ok(pair),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to parse stored credentials, treating as signed out");
                Ok(CredentialPair::default())
            }
        }
    }

    fn save(&self, pair: &CredentialPair) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| {
                    Error::Credentials(format!("Failed to create credential dir: {e}"))
                })?;
            }
        }

        let content = serde_json::to_string_pretty(pair)
            .map_err(|e| Error::Credentials(format!("Failed to serialize credentials: {e}")))?;
        fs::write(&self.path, content)
            .map_err(|e| Error::Credentials(format!("Failed to write credential file: {e}")))?;

        // Owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!(path = %self.path.display(), "Saved credentials");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| Error::Credentials(format!("Failed to delete credential file: {e}")))?;
            info!(path = %self.path.display(), "Deleted stored credentials");
        }
        Ok(())
    }
}
