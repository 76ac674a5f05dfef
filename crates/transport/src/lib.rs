//! HTTP transport abstraction for the session client
//!
//! Defines the request/response types the session layer works with and the
//! `Transport` trait that performs the actual network call. The session layer
//! never talks to reqwest directly: `ReqwestTransport` is the production
//! implementation, tests substitute an in-memory fake.
//!
//! `classify` maps a finished call onto the outcome categories that decide
//! whether the session layer attempts a credential renewal.

pub mod classify;
pub mod error;
pub mod http;

pub use classify::{Classification, classify, classify_status};
pub use error::{Error, Result};
pub use http::ReqwestTransport;
pub use reqwest::header;
pub use reqwest::{Method, StatusCode};

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

/// An outbound API call relative to the transport's base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path appended to the base URL, e.g. `/users/me`
    pub path: String,
    pub headers: HeaderMap,
    /// Serialized as a JSON body when present
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add or replace a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// A response that reached the client, whatever its status.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Body as text, lossy for non-UTF-8 bytes. Used for error messages.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs network calls on behalf of the session layer.
///
/// Implementations report every response that reaches them as `Ok`, including
/// 4xx/5xx. `Err` is reserved for calls where no response arrived (timeouts,
/// refused connections, DNS failures).
///
/// Uses `Pin<Box<dyn Future>>` return types so the trait stays dyn-compatible
/// (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>>;
}
