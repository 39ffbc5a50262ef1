//! Durable credential storage.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use dbferry_common::{Error, Result};

use crate::credential::Credential;

/// Persists the credential record as JSON at an operator-chosen path.
///
/// Saves go through a temp file in the same directory followed by a rename,
/// so an interrupted write can never leave a truncated record that a later
/// load would mis-parse.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored credential.
    ///
    /// A missing file and an unparseable record both yield `None`: the
    /// caller falls back to the authorization flow instead of crashing on
    /// a corrupt cache.
    pub fn load(&self) -> Result<Option<Credential>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Io(e)),
        };

        match serde_json::from_str(&raw) {
            Ok(credential) => Ok(Some(credential)),
            Err(e) => {
                warn!(
                    "Ignoring unparseable credential cache {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    /// Atomically persist the credential with owner-only permissions.
    pub fn save(&self, credential: &Credential) -> Result<()> {
        let json = serde_json::to_string_pretty(credential)
            .map_err(|e| Error::Serialization(format!("Failed to encode credential: {}", e)))?;

        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        Ok(())
    }
}
