//! Outcome classification for finished API calls
//!
//! Only `AuthorizationFailure` is recoverable by the session layer (through a
//! credential renewal). Every other category is handed back to the caller
//! untouched: this module never inspects business-level error payloads.

use crate::{ApiResponse, Result};

/// Category of a finished call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// 2xx
    Success,
    /// 401: the server rejected the bearer credential
    AuthorizationFailure,
    /// 403
    Forbidden,
    /// 5xx
    ServerError,
    /// No response reached the client
    NetworkFailure,
    /// Any other status (4xx other than 401/403, and unfollowed 1xx/3xx)
    OtherClientError,
}

impl Classification {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Success => "success",
            Classification::AuthorizationFailure => "authorization_failure",
            Classification::Forbidden => "forbidden",
            Classification::ServerError => "server_error",
            Classification::NetworkFailure => "network_failure",
            Classification::OtherClientError => "other_client_error",
        }
    }
}

/// Classify an HTTP status code.
pub fn classify_status(status: u16) -> Classification {
    match status {
        200..=299 => Classification::Success,
        401 => Classification::AuthorizationFailure,
        403 => Classification::Forbidden,
        500..=599 => Classification::ServerError,
        _ => Classification::OtherClientError,
    }
}

/// Classify the outcome reported by a `Transport`.
pub fn classify(outcome: &Result<ApiResponse>) -> Classification {
    match outcome {
        Ok(response) => classify_status(response.status.as_u16()),
        Err(_) => Classification::NetworkFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use reqwest::StatusCode;

    #[test]
    fn success_range() {
        assert_eq!(classify_status(200), Classification::Success);
        assert_eq!(classify_status(204), Classification::Success);
        assert_eq!(classify_status(299), Classification::Success);
    }

    #[test]
    fn unauthorized_is_authorization_failure() {
        assert_eq!(classify_status(401), Classification::AuthorizationFailure);
    }

    #[test]
    fn forbidden_is_not_renewable() {
        assert_eq!(classify_status(403), Classification::Forbidden);
    }

    #[test]
    fn server_errors() {
        for status in [500, 502, 503, 504, 599] {
            assert_eq!(classify_status(status), Classification::ServerError, "{status}");
        }
    }

    #[test]
    fn other_statuses_are_client_errors() {
        for status in [301, 400, 404, 409, 422, 429] {
            assert_eq!(
                classify_status(status),
                Classification::OtherClientError,
                "{status}"
            );
        }
    }

    #[test]
    fn transport_error_is_network_failure() {
        let outcome: Result<ApiResponse> = Err(Error::Network("connection refused".into()));
        assert_eq!(classify(&outcome), Classification::NetworkFailure);

        let outcome: Result<ApiResponse> = Err(Error::Timeout("30s".into()));
        assert_eq!(classify(&outcome), Classification::NetworkFailure);
    }

    #[test]
    fn response_outcome_uses_status() {
        let outcome = Ok(ApiResponse::new(StatusCode::UNAUTHORIZED, "{}"));
        assert_eq!(classify(&outcome), Classification::AuthorizationFailure);
    }

    #[test]
    fn labels_are_snake_case() {
        assert_eq!(
            Classification::AuthorizationFailure.label(),
            "authorization_failure"
        );
        assert_eq!(Classification::OtherClientError.label(), "other_client_error");
    }
}
