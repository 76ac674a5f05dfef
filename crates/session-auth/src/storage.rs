//! Persistence backends for the credential record
//!
//! The store never touches a medium directly; it goes through
//! `CredentialStorage`, which holds exactly one record. `FileStorage` keeps it
//! in a JSON file written atomically (temp file + rename, 0600 on unix).
//! `MemoryStorage` keeps it in process for tests and embedders that manage
//! durability themselves.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::credentials::{Credentials, Principal};
use crate::error::{Error, Result};

/// On-disk layout of the credential record.
///
/// `is_authenticated` is written as a cached derivation of `user` and `token`
/// and is never read back as a source of truth.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCredentials {
    #[serde(default)]
    pub user: Option<Principal>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl fmt::Debug for StoredCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredCredentials")
            .field("user", &self.user)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("is_authenticated", &self.is_authenticated)
            .finish()
    }
}

impl From<&Credentials> for StoredCredentials {
    fn from(credentials: &Credentials) -> Self {
        Self {
            user: credentials.principal().cloned(),
            token: credentials.access_token().map(str::to_owned),
            refresh_token: credentials.refresh_token().map(str::to_owned),
            is_authenticated: credentials.is_authenticated(),
        }
    }
}

impl From<StoredCredentials> for Credentials {
    fn from(stored: StoredCredentials) -> Self {
        Credentials::new(stored.user, stored.token, stored.refresh_token)
    }
}

/// A single-record key-value store for credentials.
///
/// `write` must not return until the record is durable on the backing medium.
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility.
pub trait CredentialStorage: Send + Sync {
    /// Read the stored record, `None` if nothing has been written.
    fn read(&self) -> Pin<Box<dyn Future<Output = Result<Option<StoredCredentials>>> + Send + '_>>;

    /// Replace the stored record.
    fn write<'a>(
        &'a self,
        record: &'a StoredCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    /// Remove the stored record.
    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// JSON file storage.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStorage for FileStorage {
    fn read(&self) -> Pin<Box<dyn Future<Output = Result<Option<StoredCredentials>>> + Send + '_>> {
        Box::pin(async move {
            let contents = match tokio::fs::read_to_string(&self.path).await {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(Error::Io(format!("reading credential file: {e}"))),
            };
            let record = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing credential file: {e}")))?;
            Ok(Some(record))
        })
    }

    fn write<'a>(
        &'a self,
        record: &'a StoredCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(write_atomic(&self.path, record))
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            match tokio::fs::remove_file(&self.path).await {
                Ok(()) => {
                    debug!(path = %self.path.display(), "removed credential file");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(Error::Io(format!("removing credential file: {e}"))),
            }
        })
    }
}

/// In-process storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: Mutex<Option<StoredCredentials>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a record already stored, as if hydrated from a previous run.
    pub fn with_record(record: StoredCredentials) -> Self {
        Self {
            slot: Mutex::new(Some(record)),
        }
    }

    /// Current contents of the slot.
    pub async fn snapshot(&self) -> Option<StoredCredentials> {
        self.slot.lock().await.clone()
    }
}

impl CredentialStorage for MemoryStorage {
    fn read(&self) -> Pin<Box<dyn Future<Output = Result<Option<StoredCredentials>>> + Send + '_>> {
        Box::pin(async move { Ok(self.slot.lock().await.clone()) })
    }

    fn write<'a>(
        &'a self,
        record: &'a StoredCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            *self.slot.lock().await = Some(record.clone());
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            *self.slot.lock().await = None;
            Ok(())
        })
    }
}

/// Write the record to a file atomically.
///
/// Writes a temporary file in the same directory and renames it over the
/// target, so a crash mid-write never leaves a truncated record. Permissions
/// are 0600 on unix since the file holds bearer tokens.
async fn write_atomic(path: &Path, record: &StoredCredentials) -> Result<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| Error::CredentialParse(format!("serializing credentials: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}
