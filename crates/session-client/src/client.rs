//! Session-aware API client

use std::sync::Arc;

use common::Secret;
use session_auth::{CredentialStore, Credentials, Principal, token};
use tracing::{debug, info, instrument, warn};
use transport::{ApiRequest, ApiResponse, Classification, Transport, classify};

use crate::attach::attach_bearer;
use crate::coordinator::RefreshCoordinator;
use crate::error::{Error, Result};
use crate::metrics;
use crate::signal::{InvalidationSignal, SessionInvalidated};

/// A call on its way through the client.
///
/// `retried` is set once the call has been replayed with a renewed token; a
/// retried call never triggers another renewal.
struct PendingCall {
    request: ApiRequest,
    retried: bool,
}

impl PendingCall {
    fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }

    /// The outbound form of the call with `access_token` attached.
    fn armed(&self, access_token: Option<&str>) -> ApiRequest {
        let mut outbound = self.request.clone();
        attach_bearer(&mut outbound.headers, access_token);
        outbound
    }
}

/// Authenticated client for one session.
///
/// Every call through `request` carries the stored access token. A 401 is
/// answered by a single shared renewal and one replay of the call.
pub struct SessionClient {
    store: Arc<CredentialStore>,
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
    signal: Arc<InvalidationSignal>,
}

impl SessionClient {
    pub fn new(store: Arc<CredentialStore>, transport: Arc<dyn Transport>) -> Self {
        let signal = Arc::new(InvalidationSignal::new());
        let coordinator = RefreshCoordinator::new(store.clone(), transport.clone(), signal.clone());
        Self {
            store,
            transport,
            coordinator,
            signal,
        }
    }

    pub fn credential_store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// Register a handler for session invalidation.
    ///
    /// Fires once per failed renewal, after the stored credentials have been
    /// cleared. Not fired by `logout`.
    pub fn on_session_invalidated(
        &self,
        handler: impl Fn(&SessionInvalidated) + Send + Sync + 'static,
    ) {
        self.signal.subscribe(handler);
    }

    /// Current credential snapshot.
    pub async fn credentials(&self) -> Credentials {
        self.store.read().await
    }

    /// Perform `call` with the session's credentials.
    ///
    /// 2xx responses are returned as `Ok`. Any other outcome is an `Error`
    /// carrying the untouched response or transport error, except a first
    /// 401, which is absorbed by renewing the credential pair and replaying
    /// the call once.
    #[instrument(skip_all, fields(method = %call.method, path = %call.path))]
    pub async fn request(&self, call: ApiRequest) -> Result<ApiResponse> {
        let mut pending = PendingCall::new(call);
        let mut access_token = self.store.read().await.access_token().map(str::to_owned);

        loop {
            let outbound = pending.armed(access_token.as_deref());
            let outcome = self.transport.send(&outbound).await;
            let classification = classify(&outcome);
            metrics::record_request(classification);

            if classification == Classification::AuthorizationFailure && !pending.retried {
                debug!("access token rejected, renewing credentials");
                pending.retried = true;
                let renewed = self.coordinator.renew().await?;
                access_token = Some(renewed);
                metrics::record_retry();
                debug!("replaying call with renewed token");
                continue;
            }

            return settle(outcome, classification);
        }
    }

    /// Sign in and store the returned principal and token pair.
    pub async fn login(&self, email: &str, password: &Secret<String>) -> Result<Principal> {
        let response = token::login(self.transport.as_ref(), email, password).await?;
        self.adopt(response).await
    }

    /// Create an account and store the session the server opens for it.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &Secret<String>,
    ) -> Result<Principal> {
        let response = token::register(self.transport.as_ref(), name, email, password).await?;
        self.adopt(response).await
    }

    /// End the session.
    ///
    /// The server-side revoke is best effort; the local record is cleared
    /// regardless of its outcome.
    pub async fn logout(&self) -> Result<()> {
        let credentials = self.store.read().await;
        if let Some(refresh_token) = credentials.refresh_token() {
            match token::logout(self.transport.as_ref(), refresh_token).await {
                Ok(()) => debug!("refresh token revoked"),
                Err(e) => warn!(error = %e, "server-side logout failed, clearing locally"),
            }
        }
        self.store.clear().await?;
        info!("signed out");
        Ok(())
    }

    async fn adopt(&self, response: token::AuthResponse) -> Result<Principal> {
        let principal = response.user;
        let tokens = response.tokens;
        self.store
            .save(
                Some(principal.clone()),
                Some(tokens.access.token),
                tokens.refresh.map(|grant| grant.token),
            )
            .await?;
        info!(user = %principal.id, "signed in");
        Ok(principal)
    }
}

/// Turn a final outcome into the caller's result.
fn settle(
    outcome: transport::Result<ApiResponse>,
    classification: Classification,
) -> Result<ApiResponse> {
    let response = outcome?;
    match classification {
        Classification::Success => Ok(response),
        Classification::AuthorizationFailure => {
            warn!("call rejected again after renewal");
            Err(Error::Unauthorized(response))
        }
        Classification::Forbidden => Err(Error::Forbidden(response)),
        Classification::ServerError => Err(Error::Server(response)),
        Classification::OtherClientError | Classification::NetworkFailure => {
            Err(Error::Client(response))
        }
    }
}
