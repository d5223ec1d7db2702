//! Durable session token record
//!
//! The record is a small JSON file holding exactly one field:
//!
//! ```json
//! {"jwtToken": "<token or empty>"}
//! ```
//!
//! A missing or unreadable file means "no session" and is recreated empty.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};

/// Default file name of the token record
pub const DEFAULT_TOKEN_FILE: &str = "api_settings.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct TokenRecord {
    #[serde(rename = "jwtToken", default)]
    jwt_token: String,
}

/// File-backed store for the session token
///
/// Writes overwrite the whole file. There is no locking against other
/// processes using the same path.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the saved token
    ///
    /// Returns `None` when the file is missing, corrupt, or holds an empty
    /// token. Missing and corrupt files are reset to an empty record.
    pub fn load(&self) -> Option<String> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Token file missing, creating empty record");
                self.reset();
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Token file unreadable, resetting");
                self.reset();
                return None;
            }
        };

        match serde_json::from_str::<TokenRecord>(&raw) {
            Ok(record) if record.jwt_token.is_empty() => None,
            Ok(record) => Some(record.jwt_token),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Token file corrupt, resetting");
                self.reset();
                None
            }
        }
    }

    /// Persist `token`, replacing any previous record
    pub fn save(&self, token: &str) -> AuthResult<()> {
        self.write(token)?;
        debug!(path = %self.path.display(), "Session token saved");
        Ok(())
    }

    /// Remove the record; a missing file is not an error
    pub fn clear(&self) -> AuthResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session token record removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(self.storage_error(source)),
        }
    }

    fn reset(&self) {
        if let Err(e) = self.write("") {
            warn!(error = %e, "Failed to reset token file");
        }
    }

    fn write(&self, token: &str) -> AuthResult<()> {
        let record = TokenRecord {
            jwt_token: token.to_string(),
        };
        let json = serde_json::to_string(&record)?;
        fs::write(&self.path, json).map_err(|source| self.storage_error(source))
    }

    fn storage_error(&self, source: io::Error) -> AuthError {
        AuthError::Storage {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_FILE)
    }
}
