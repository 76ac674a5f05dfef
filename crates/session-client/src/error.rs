//! Error types for session client calls

use transport::{ApiResponse, Classification};

use crate::coordinator::RefreshError;

/// Errors returned from `SessionClient` calls.
///
/// Response-carrying variants hand back the server's response untouched so
/// callers can read domain-specific error payloads.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 401 after the call was already replayed with a renewed token
    #[error("unauthorized ({})", .0.status)]
    Unauthorized(ApiResponse),

    #[error("forbidden ({})", .0.status)]
    Forbidden(ApiResponse),

    #[error("server error ({})", .0.status)]
    Server(ApiResponse),

    #[error("request failed ({})", .0.status)]
    Client(ApiResponse),

    #[error("network failure: {0}")]
    Network(#[from] transport::Error),

    /// The credential pair could not be renewed; the session is gone
    #[error("session invalidated: {0}")]
    RefreshFailed(#[from] RefreshError),

    #[error("auth error: {0}")]
    Auth(#[from] session_auth::Error),
}

impl Error {
    /// The server response behind this error, if one arrived.
    pub fn response(&self) -> Option<&ApiResponse> {
        match self {
            Error::Unauthorized(r) | Error::Forbidden(r) | Error::Server(r) | Error::Client(r) => {
                Some(r)
            }
            _ => None,
        }
    }

    /// Outcome category for response and network errors.
    pub fn classification(&self) -> Option<Classification> {
        match self {
            Error::Unauthorized(_) => Some(Classification::AuthorizationFailure),
            Error::Forbidden(_) => Some(Classification::Forbidden),
            Error::Server(_) => Some(Classification::ServerError),
            Error::Client(_) => Some(Classification::OtherClientError),
            Error::Network(_) => Some(Classification::NetworkFailure),
            Error::RefreshFailed(_) | Error::Auth(_) => None,
        }
    }
}

/// Result alias for session client calls.
pub type Result<T> = std::result::Result<T, Error>;
