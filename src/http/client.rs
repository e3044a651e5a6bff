//! HTTP client for gateway reachability checks

use reqwest::{redirect::Policy, Client};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// HTTP client errors
#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection refused to {0}")]
    ConnectionRefused(String),

    #[error("Failed to create HTTP client: {0}")]
    Builder(String),
}

/// HTTP client
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create client with custom timeout
    ///
    /// Redirects are not followed and proxies are bypassed. The gateway
    /// answering at all is what matters.
    pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .redirect(Policy::none())
            .no_proxy()
            .build()
            .map_err(|e| HttpError::Builder(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Send a GET request
    pub async fn get(&self, url: &str) -> Result<HttpResponse, HttpError> {
        debug!("Sending GET request to {}", url);
        let start = Instant::now();

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                HttpError::Timeout(self.timeout)
            } else if e.is_connect() {
                HttpError::ConnectionRefused(url.to_string())
            } else {
                HttpError::RequestFailed(e.to_string())
            }
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let status = response.status();

        debug!(
            "Response: {} {} in {}ms",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            duration_ms
        );

        Ok(HttpResponse {
            status_code: status.as_u16(),
            duration_ms,
        })
    }
}

/// HTTP response summary
#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status_code: u16,
    pub duration_ms: u64,
}

/// `http://host:port` with IPv6 literals bracketed
pub fn base_url(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("http://[{host}]:{port}")
    } else {
        format!("http://{host}:{port}")
    }
}
