//! One HTTP round trip against the backend API.
//!
//! The [`Transport`] trait is the seam between retry policy and the
//! network: it performs exactly one request and reports the status,
//! any `Retry-After` hint, and the raw body. Tests substitute scripted
//! implementations; production uses [`HttpTransport`] over reqwest.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header;
use std::time::Duration;

/// Result of one HTTP round trip, before any policy is applied.
#[derive(Debug, Clone)]
pub struct Exchange {
    /// HTTP status code.
    pub status: u16,
    /// Parsed `Retry-After` header, whole seconds.
    pub retry_after_secs: Option<u64>,
    /// Response body bytes.
    pub body: Bytes,
}

impl Exchange {
    /// Server's retry hint, or the caller's fallback.
    pub fn retry_after_or(&self, default_secs: u64) -> u64 {
        self.retry_after_secs.unwrap_or(default_secs)
    }
}

/// Errors below the HTTP status layer.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Request exceeded the configured timeout.
    #[error("request timeout")]
    Timeout,

    /// Connection-level failure distinct from a timeout.
    #[error("network error: {0}")]
    Network(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { TransportError::Timeout } else { TransportError::Network(err.to_string()) }
    }
}

/// Performs one request, no retries, no rate limiting.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch one request, attaching the bearer token when present.
    async fn round_trip(&self, token: Option<&str>) -> Result<Exchange, TransportError>;
}

/// Production transport over reqwest.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the given API base URL.
    ///
    /// The timeout bounds the whole round trip; timeouts are classified
    /// separately from other network failures.
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn round_trip(&self, token: Option<&str>) -> Result<Exchange, TransportError> {
        let url = format!("{}/club", self.base_url);

        let mut request = self.http.get(&url).header(header::ACCEPT, "application/json");
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;

        let status = response.status().as_u16();
        let retry_after_secs = parse_retry_after(response.headers());
        let body = response.bytes().await?;

        tracing::debug!(status, bytes = body.len(), "club request completed");

        Ok(Exchange { status, retry_after_secs, body })
    }
}

/// Parse a `Retry-After` header given in whole or fractional seconds.
/// HTTP-date forms are not produced by the backend and are ignored.
fn parse_retry_after(headers: &header::HeaderMap) -> Option<u64> {
    headers
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .map(|seconds| seconds.ceil().max(0.0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with_retry_after(value: &str) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::RETRY_AFTER, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after(&headers_with_retry_after("5")), Some(5));
    }

    #[test]
    fn test_parse_retry_after_fractional_rounds_up() {
        assert_eq!(parse_retry_after(&headers_with_retry_after("1.2")), Some(2));
    }

    #[test]
    fn test_parse_retry_after_http_date_ignored() {
        let headers = headers_with_retry_after("Wed, 21 Oct 2026 07:28:00 GMT");
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_parse_retry_after_missing() {
        assert_eq!(parse_retry_after(&header::HeaderMap::new()), None);
    }

    #[test]
    fn test_exchange_retry_after_fallback() {
        let exchange = Exchange { status: 429, retry_after_secs: None, body: Bytes::new() };
        assert_eq!(exchange.retry_after_or(2), 2);

        let exchange = Exchange { status: 429, retry_after_secs: Some(7), body: Bytes::new() };
        assert_eq!(exchange.retry_after_or(2), 7);
    }

    #[test]
    fn test_http_transport_new() {
        let transport = HttpTransport::new("http://localhost:8000/api/", "clubsync/0.1", Duration::from_secs(30));
        assert!(transport.is_ok());
        assert_eq!(transport.unwrap().base_url, "http://localhost:8000/api");
    }
}
