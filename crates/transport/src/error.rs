//! Transport-level failures: no response reached the client

/// Errors from a network call that produced no HTTP response.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, Error>;
