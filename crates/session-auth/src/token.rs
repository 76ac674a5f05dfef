//! Auth endpoint calls
//!
//! Login, registration and renewal all answer with the same body:
//! `{"user": {...}, "tokens": {"access": {...}, "refresh": {...}}}`. These
//! calls go straight to the transport. They never carry a bearer token and
//! never enter the renewal path, so a rejected refresh token cannot recurse
//! into another renewal.

use common::Secret;
use serde::{Deserialize, Serialize};
use transport::{ApiRequest, ApiResponse, Transport};
use tracing::debug;

use crate::constants::{LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH, REGISTER_PATH};
use crate::credentials::Principal;
use crate::error::{Error, Result};

/// One issued token.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub token: String,
    /// Seconds until expiry as reported by the server. Informational only:
    /// renewal is driven by 401 responses, not by local expiry checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

/// The `tokens` object of an auth response.
///
/// `access.token` is required; a body without it fails to decode and the
/// call is treated as failed. `refresh` is optional on renewal.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenBundle {
    pub access: TokenGrant,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<TokenGrant>,
}

/// Body returned by login and registration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthResponse {
    pub user: Principal,
    pub tokens: TokenBundle,
}

/// Renewal only needs the tokens; the echoed `user` is ignored so the stored
/// principal stays authoritative.
#[derive(Deserialize)]
struct RefreshResponse {
    tokens: TokenBundle,
}

/// Exchange a refresh token for a new token pair.
///
/// Sends `POST /auth/refresh` with `{"refreshToken": "..."}`. Non-2xx, a
/// network error, or a body without `tokens.access.token` is an error.
pub async fn refresh_tokens(transport: &dyn Transport, refresh_token: &str) -> Result<TokenBundle> {
    let request = ApiRequest::post(REFRESH_PATH)
        .json(serde_json::json!({ "refreshToken": refresh_token }));
    let response = transport.send(&request).await?;
    let response = ensure_success(REFRESH_PATH, response)?;

    let body: RefreshResponse = response
        .json()
        .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))?;
    ensure_access_token(REFRESH_PATH, &body.tokens)?;
    debug!(
        rotated_refresh = body.tokens.refresh.is_some(),
        "refresh endpoint issued new tokens"
    );
    Ok(body.tokens)
}

/// Sign in with email and password.
pub async fn login(
    transport: &dyn Transport,
    email: &str,
    password: &Secret<String>,
) -> Result<AuthResponse> {
    let request = ApiRequest::post(LOGIN_PATH).json(serde_json::json!({
        "email": email,
        "password": password.expose(),
    }));
    let response = transport.send(&request).await?;
    decode_auth_response(LOGIN_PATH, response)
}

/// Create an account. The server signs the new account in and answers like
/// `login`.
pub async fn register(
    transport: &dyn Transport,
    name: &str,
    email: &str,
    password: &Secret<String>,
) -> Result<AuthResponse> {
    let request = ApiRequest::post(REGISTER_PATH).json(serde_json::json!({
        "name": name,
        "email": email,
        "password": password.expose(),
    }));
    let response = transport.send(&request).await?;
    decode_auth_response(REGISTER_PATH, response)
}

/// Revoke a refresh token server-side.
pub async fn logout(transport: &dyn Transport, refresh_token: &str) -> Result<()> {
    let request =
        ApiRequest::post(LOGOUT_PATH).json(serde_json::json!({ "refreshToken": refresh_token }));
    let response = transport.send(&request).await?;
    ensure_success(LOGOUT_PATH, response)?;
    Ok(())
}

fn decode_auth_response(path: &str, response: ApiResponse) -> Result<AuthResponse> {
    let response = ensure_success(path, response)?;
    let body = response
        .json::<AuthResponse>()
        .map_err(|e| Error::TokenExchange(format!("invalid {path} response: {e}")))?;
    ensure_access_token(path, &body.tokens)?;
    Ok(body)
}

/// An empty access token is the same as a missing one.
fn ensure_access_token(path: &str, tokens: &TokenBundle) -> Result<()> {
    if tokens.access.token.is_empty() {
        return Err(Error::TokenExchange(format!(
            "{path} response has an empty access token"
        )));
    }
    Ok(())
}

/// Map non-2xx responses to errors. 401/403 mean the submitted credential
/// (password or refresh token) was rejected.
fn ensure_success(path: &str, response: ApiResponse) -> Result<ApiResponse> {
    let status = response.status;
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text();
    if status.as_u16() == 401 || status.as_u16() == 403 {
        return Err(Error::InvalidCredentials(format!(
            "{path} rejected ({status}): {body}"
        )));
    }
    Err(Error::TokenExchange(format!("{path} returned {status}: {body}")))
}
