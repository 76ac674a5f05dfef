//! reqwest-backed `Transport`
//!
//! Resolves request paths against a base URL, serializes JSON bodies, applies
//! a per-call timeout and buffers the full response body. Any response that
//! arrives is returned as `Ok`, including error statuses; classification is
//! the caller's job.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::{ApiRequest, ApiResponse, Transport};

/// Production transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    /// `base_url` is the API root, e.g. `https://api.example.com/v1`. The
    /// timeout bounds each call, including renewal calls that waiters queue
    /// behind.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout,
        }
    }

    /// Full URL for a request path.
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        Box::pin(self.execute(request))
    }
}

impl ReqwestTransport {
    #[instrument(skip_all, fields(method = %request.method, path = %request.path))]
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.path);

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers.clone())
            .timeout(self.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                warn!(error = %e, timeout_secs = self.timeout.as_secs(), "request timed out");
                Error::Timeout(format!("{url}: {e}"))
            } else if e.is_builder() {
                Error::InvalidRequest(format!("{url}: {e}"))
            } else {
                warn!(error = %e, "request failed before a response arrived");
                Error::Network(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::Timeout(format!("reading response body from {url}: {e}"))
            } else {
                Error::Network(format!("reading response body from {url}: {e}"))
            }
        })?;

        debug!(status = status.as_u16(), bytes = body.len(), "response received");
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
