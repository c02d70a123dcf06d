//! Rate-limited HTTP client for upstream API calls
//!
//! Every request first takes a token from the shared [`TokenBucket`], then
//! the response status is classified into a [`SyncError`] the retry layer
//! understands.

use crate::config::{RateLimitConfig, UpstreamConfig};
use crate::error::SyncError;
use crate::sync::rate_limiter::TokenBucket;
use crate::sync::retry::parse_retry_after;
use bytes::Bytes;
use chrono::Utc;
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the congress.gov API key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// HTTP client with token-bucket admission control
///
/// Features:
/// - Token acquisition before every request, bounded by `acquire_timeout`
/// - API key sent as a header so it never appears in URLs or logs
/// - HTTP 429 and 5xx handling with Retry-After support
#[derive(Debug, Clone)]
pub struct RateLimitedHttpClient {
    client: Client,
    limiter: TokenBucket,
    acquire_timeout: Duration,
    api_key: Option<String>,
    default_retry_after_secs: u64,
}

impl RateLimitedHttpClient {
    /// Create a new client sharing `limiter`
    pub fn new(
        upstream: &UpstreamConfig,
        rate_limit: &RateLimitConfig,
        limiter: TokenBucket,
    ) -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(upstream.request_timeout_secs))
            .user_agent(concat!("congress-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            limiter,
            acquire_timeout: Duration::from_millis(rate_limit.acquire_timeout_ms),
            api_key: upstream.api_key.clone(),
            default_retry_after_secs: rate_limit.rate_limit_wait_secs,
        })
    }

    /// Perform a GET request with query parameters
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Bytes, SyncError> {
        let endpoint = endpoint_of(url);

        self.limiter.acquire(self.acquire_timeout).await?;

        let mut request = self
            .client
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        debug!(endpoint = %endpoint, "Sending HTTP GET request");

        let response = request.send().await.map_err(|e| transport_error(&e))?;

        self.classify(response, endpoint).await
    }

    async fn classify(&self, response: Response, endpoint: String) -> Result<Bytes, SyncError> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_retry_after(v, Utc::now()));

        match status {
            status if status.is_success() => {
                let body = response.bytes().await.map_err(|e| transport_error(&e))?;
                debug!(endpoint = %endpoint, body_size = body.len(), "Received response");
                Ok(body)
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let wait = retry_after
                    .map(|d| d.as_secs() + u64::from(d.subsec_nanos() > 0))
                    .unwrap_or(self.default_retry_after_secs);
                warn!(endpoint = %endpoint, retry_after = wait, "Rate limited by upstream");
                Err(SyncError::RateLimited(wait))
            }
            StatusCode::NOT_FOUND => {
                debug!(endpoint = %endpoint, "Resource not found (404)");
                Err(SyncError::NotFound { endpoint })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                warn!(endpoint = %endpoint, status = status.as_u16(), "Unauthorized");
                Err(SyncError::Unauthorized)
            }
            status => {
                warn!(endpoint = %endpoint, status = status.as_u16(), "Upstream error");
                Err(SyncError::Upstream {
                    status: status.as_u16(),
                    endpoint,
                    retry_after,
                })
            }
        }
    }

    /// The shared admission controller
    pub fn limiter(&self) -> &TokenBucket {
        &self.limiter
    }
}

/// Map a transport failure, keeping the whole cause chain in the message
///
/// reqwest's own message only names the URL; the transient condition
/// ("connection closed", "connection reset", ...) lives in its sources.
fn transport_error(err: &reqwest::Error) -> SyncError {
    if err.is_timeout() {
        return SyncError::NetworkTimeout;
    }
    if err.is_connect() {
        return SyncError::ConnectionRefused;
    }

    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    SyncError::Network(message)
}

/// URL path used to label errors and logs
fn endpoint_of(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split('?').next().unwrap_or(url).to_string())
}
