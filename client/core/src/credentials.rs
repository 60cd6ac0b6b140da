//! Persisted Credentials
//!
//! The client keeps three values between runs: the access token, the
//! refresh token and the username. Holding both tokens means the user is
//! signed in; token issuance and verification belong to the backend.
//!
//! # Storage
//!
//! - Stored as JSON at `$XDG_DATA_HOME/furiabot/credentials.json` unless
//!   configured otherwise
//! - The file has 0o600 permissions (owner read/write only) on unix
//! - Signing out removes the file

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Data directory name
pub const DATA_DIR_NAME: &str = "furiabot";

/// Credentials file name within the data directory
pub const CREDENTIALS_FILENAME: &str = "credentials.json";

/// Errors related to credential persistence
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Failed to read the credentials file
    #[error("failed to read credentials at {path}: {source}")]
    ReadFailed {
        /// File that was read
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to write the credentials file
    #[error("failed to write credentials at {path}: {source}")]
    WriteFailed {
        /// File that was written
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// The credentials file is not valid JSON
    #[error("invalid credentials file: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

/// Token pair issued by `/token`, `/register` and `/refresh-token`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    /// Bearer token attached to authenticated calls
    pub access_token: String,
    /// Token exchanged for a new pair when the access token expires
    pub refresh_token: String,
}

/// The persisted client state
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token
    #[serde(default, rename = "accessToken")]
    pub access_token: Option<String>,
    /// Refresh token
    #[serde(default, rename = "refreshToken")]
    pub refresh_token: Option<String>,
    /// Signed-in username
    #[serde(default)]
    pub username: Option<String>,
}

impl Credentials {
    /// Credentials for a freshly signed-in user
    pub fn signed_in(tokens: TokenPair, username: impl Into<String>) -> Self {
        Self {
            access_token: Some(tokens.access_token),
            refresh_token: Some(tokens.refresh_token),
            username: Some(username.into()),
        }
    }

    /// Whether both tokens are present
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let present = |t: &Option<String>| t.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.access_token) && present(&self.refresh_token)
    }

    /// Swap in a refreshed token pair, keeping the username
    pub fn replace_tokens(&mut self, tokens: TokenPair) {
        self.access_token = Some(tokens.access_token);
        self.refresh_token = Some(tokens.refresh_token);
    }
}

/// File-backed credential storage
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store at a specific path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default credentials path
    ///
    /// Returns `$XDG_DATA_HOME/furiabot/credentials.json`, falling back to
    /// the home directory when no data directory is known.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DATA_DIR_NAME)
            .join(CREDENTIALS_FILENAME)
    }

    /// Path of the credentials file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load stored credentials; a missing file yields empty credentials
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Credentials, CredentialError> {
        if !self.path.exists() {
            return Ok(Credentials::default());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| {
            CredentialError::ReadFailed {
                path: self.path.clone(),
                source,
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Persist credentials, creating the parent directory if needed
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, credentials: &Credentials) -> Result<(), CredentialError> {
        let write_err = |source| CredentialError::WriteFailed {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(write_err)?;
            }
        }

        let json = serde_json::to_string_pretty(credentials)?;
        fs::write(&self.path, json).map_err(write_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms).map_err(write_err)?;
        }

        Ok(())
    }

    /// Remove stored credentials; a missing file is fine
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CredentialError::WriteFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Shared handle over the credentials in use
///
/// Cloned into the HTTP backend and into anything that needs to know
/// whether the user is signed in. Every change is written through to the
/// [`CredentialStore`].
#[derive(Clone, Debug)]
pub struct TokenStore {
    store: CredentialStore,
    current: Arc<RwLock<Credentials>>,
}

impl TokenStore {
    /// Open the store, loading whatever is persisted
    ///
    /// # Errors
    ///
    /// Returns an error if persisted credentials exist but cannot be read.
    pub fn open(store: CredentialStore) -> Result<Self, CredentialError> {
        let current = store.load()?;
        Ok(Self {
            store,
            current: Arc::new(RwLock::new(current)),
        })
    }

    /// A store holding `credentials` in memory, persisted at `store`
    #[must_use]
    pub fn with_credentials(store: CredentialStore, credentials: Credentials) -> Self {
        Self {
            store,
            current: Arc::new(RwLock::new(credentials)),
        }
    }

    /// Snapshot of the current credentials
    #[must_use]
    pub fn snapshot(&self) -> Credentials {
        self.current.read().clone()
    }

    /// Whether both tokens are present
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current.read().is_authenticated()
    }

    /// Current access token
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.current.read().access_token.clone()
    }

    /// Current refresh token
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.current.read().refresh_token.clone()
    }

    /// Signed-in username
    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.current.read().username.clone()
    }

    /// Record a sign-in
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be persisted; the
    /// in-memory state is updated regardless.
    pub fn store_tokens(
        &self,
        tokens: TokenPair,
        username: impl Into<String>,
    ) -> Result<(), CredentialError> {
        let credentials = Credentials::signed_in(tokens, username);
        *self.current.write() = credentials.clone();
        self.store.save(&credentials)
    }

    /// Record a refreshed token pair
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials cannot be persisted.
    pub fn replace_tokens(&self, tokens: TokenPair) -> Result<(), CredentialError> {
        let credentials = {
            let mut current = self.current.write();
            current.replace_tokens(tokens);
            current.clone()
        };
        self.store.save(&credentials)
    }

    /// Forget the signed-in user
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials file cannot be removed.
    pub fn clear(&self) -> Result<(), CredentialError> {
        *self.current.write() = Credentials::default();
        self.store.clear()
    }
}
