//! Credential record and store
//!
//! `Credentials` is the signed-in principal plus its access/refresh token
//! pair. Whether the session is authenticated is derived from the fields on
//! every call, so no setter can leave a stale flag behind.
//!
//! `CredentialStore` owns the current record. A tokio Mutex serializes all
//! writers and is held across the persist, so a partial setter racing a
//! wholesale `save` can never lose an update, and readers only ever observe
//! records that were durably written.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::storage::{CredentialStorage, StoredCredentials};

/// The identity an access token was issued to (the `user` object of auth
/// responses). Fields beyond the well-known ones are preserved as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Snapshot of the session credentials.
///
/// Empty token strings are treated as absent.
#[derive(Clone, Default, PartialEq)]
pub struct Credentials {
    principal: Option<Principal>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

impl Credentials {
    pub fn new(
        principal: Option<Principal>,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            principal,
            access_token: access_token.filter(|t| !t.is_empty()),
            refresh_token: refresh_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    /// True iff both a principal and an access token are present.
    pub fn is_authenticated(&self) -> bool {
        self.principal.is_some() && self.access_token.is_some()
    }

    /// True for the all-absent record.
    pub fn is_empty(&self) -> bool {
        self.principal.is_none() && self.access_token.is_none() && self.refresh_token.is_none()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("principal", &self.principal.as_ref().map(|p| &p.id))
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

/// Thread-safe owner of the current credential record.
pub struct CredentialStore {
    storage: Box<dyn CredentialStorage>,
    state: Mutex<Credentials>,
}

impl CredentialStore {
    /// Hydrate the store from `storage`.
    ///
    /// Empty storage yields the all-absent record. A stored `isAuthenticated`
    /// that disagrees with the stored fields is ignored.
    pub async fn load(storage: impl CredentialStorage + 'static) -> Result<Self> {
        let credentials = match storage.read().await? {
            Some(stored) => {
                let cached_flag = stored.is_authenticated;
                let credentials = Credentials::from(stored);
                if cached_flag != credentials.is_authenticated() {
                    debug!(
                        cached = cached_flag,
                        derived = credentials.is_authenticated(),
                        "stored authentication flag disagrees with fields, recomputing"
                    );
                }
                info!(
                    authenticated = credentials.is_authenticated(),
                    "loaded credentials"
                );
                credentials
            }
            None => {
                info!("no stored credentials, starting signed out");
                Credentials::default()
            }
        };

        Ok(Self {
            storage: Box::new(storage),
            state: Mutex::new(credentials),
        })
    }

    /// Current snapshot. Never fails.
    pub async fn read(&self) -> Credentials {
        self.state.lock().await.clone()
    }

    /// Replace the whole record.
    pub async fn save(
        &self,
        principal: Option<Principal>,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<()> {
        self.update(|_| Credentials::new(principal, access_token, refresh_token))
            .await
    }

    /// Overlay the access token, keeping the other fields.
    pub async fn set_access_token(&self, token: Option<String>) -> Result<()> {
        self.update(|current| {
            Credentials::new(
                current.principal.clone(),
                token,
                current.refresh_token.clone(),
            )
        })
        .await
    }

    /// Overlay the refresh token, keeping the other fields.
    pub async fn set_refresh_token(&self, token: Option<String>) -> Result<()> {
        self.update(|current| {
            Credentials::new(
                current.principal.clone(),
                current.access_token.clone(),
                token,
            )
        })
        .await
    }

    /// Overlay the principal, keeping both tokens.
    pub async fn set_principal(&self, principal: Option<Principal>) -> Result<()> {
        self.update(|current| {
            Credentials::new(
                principal,
                current.access_token.clone(),
                current.refresh_token.clone(),
            )
        })
        .await
    }

    /// Store the result of a renewal.
    ///
    /// The principal is preserved. The refresh token is replaced only when the
    /// server issued a new one.
    pub async fn rotate_tokens(&self, access_token: String, refresh_token: Option<String>) -> Result<()> {
        self.update(|current| {
            Credentials::new(
                current.principal.clone(),
                Some(access_token),
                refresh_token.or_else(|| current.refresh_token.clone()),
            )
        })
        .await
    }

    /// Reset to the all-absent record.
    pub async fn clear(&self) -> Result<()> {
        self.update(|_| Credentials::default()).await
    }

    /// Read-modify-write under the lock. A non-empty record becomes visible
    /// only after it has been persisted. An empty record replaces the current
    /// one even when the storage clear fails; the clear error is still
    /// returned.
    async fn update(&self, f: impl FnOnce(&Credentials) -> Credentials) -> Result<()> {
        let mut state = self.state.lock().await;
        let next = f(&state);
        if next.is_empty() {
            let cleared = self.storage.clear().await;
            *state = next;
            match &cleared {
                Ok(()) => debug!("credentials cleared"),
                Err(e) => warn!(error = %e, "stored credentials not removed, cleared in memory"),
            }
            return cleared;
        }

        self.storage.write(&StoredCredentials::from(&next)).await?;
        debug!(authenticated = next.is_authenticated(), "credentials updated");
        *state = next;
        Ok(())
    }
}
