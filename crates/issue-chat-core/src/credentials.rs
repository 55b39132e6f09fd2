//! Bearer token handling and persistence.
//!
//! The token is the only state persisted between runs; everything else is
//! re-derived from it at startup.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{StorageError, ValidationError};

/// GitHub personal access token.
///
/// The token string is never exposed in Debug output for security.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a token string. Surrounding whitespace is trimmed.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into().trim().to_string())
    }

    /// Get the raw token for the Authorization header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }

    /// Reject blank tokens.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_blank() {
            return Err(ValidationError::required("token"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential").field(&"<REDACTED>").finish()
    }
}

/// Persistent storage for the user's credential.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the stored credential, if any.
    async fn load(&self) -> Result<Option<Credential>, StorageError>;

    /// Store the credential, replacing any previous one.
    async fn save(&self, credential: &Credential) -> Result<(), StorageError>;

    /// Remove the stored credential. Succeeds when nothing was stored.
    async fn clear(&self) -> Result<(), StorageError>;
}

// ============================================================================
// File-backed store
// ============================================================================

/// Stores the token in a single file, by default `<config_dir>/issue-chat/token`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform configuration directory.
    pub fn default_location() -> Result<Self, StorageError> {
        let dir = dirs::config_dir().ok_or(StorageError::Unavailable)?;
        Ok(Self::new(dir.join("issue-chat").join("token")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, err: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => {
                let credential = Credential::new(contents);
                if credential.is_blank() {
                    Ok(None)
                } else {
                    Ok(Some(credential))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        // An existing file keeps its old mode; narrow it before the token lands.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| self.io_error(e))?;
        }

        file.write_all(credential.expose().as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        debug!(path = %self.path.display(), "Stored credential");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Keeps the credential in memory only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credential(credential: Credential) -> Self {
        Self {
            credential: Mutex::new(Some(credential)),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<Credential>, StorageError> {
        let credential = self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(credential.clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        *self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), StorageError> {
        *self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
