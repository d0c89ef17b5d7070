//! Upstream fetcher seam and its reqwest implementation.
//!
//! The proxy consumes the upstream API through [`UpstreamFetcher`] so the
//! pipeline can be exercised against mock implementations in tests.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::HeaderMap;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::{CacheError, Result};

/// Inbound headers forwarded to the upstream API. Everything else stays
/// local; the request body is re-serialized as JSON so `content-type` is
/// always set by the client.
const FORWARDED_HEADERS: &[&str] = &["authorization", "x-api-key", "anthropic-version"];

/// Extract the forwardable subset of inbound headers.
pub fn forwardable_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    FORWARDED_HEADERS
        .iter()
        .filter_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect()
}

/// Complete upstream reply to a non-streaming request. Cloneable so one
/// fetch outcome can be shared across coalesced waiters.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    /// HTTP status returned by the upstream.
    pub status: u16,
    /// Response payload (or upstream error body), parsed as JSON.
    pub body: Value,
}

impl UpstreamResponse {
    /// Whether this response is cacheable (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Streaming upstream reply, proxied byte-for-byte.
pub struct UpstreamStream {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: BoxStream<'static, std::io::Result<Bytes>>,
}

/// Capability consumed by the proxy to reach the upstream provider.
#[async_trait]
pub trait UpstreamFetcher: Send + Sync {
    /// Send a non-streaming request and return the full response.
    async fn fetch(&self, body: &Value, headers: &[(String, String)]) -> Result<UpstreamResponse>;

    /// Send a streaming request and return the raw byte stream.
    async fn fetch_stream(
        &self,
        body: &Value,
        headers: &[(String, String)],
    ) -> Result<UpstreamStream>;
}

/// Production fetcher speaking HTTP to the configured provider endpoint.
pub struct HttpUpstream {
    client: Client,
    url: String,
}

impl HttpUpstream {
    /// Build a fetcher for the configured provider/target URL.
    pub fn new(config: &UpstreamConfig) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("failed to build HTTP client"),
            url: config.endpoint_url(),
        }
    }

    fn request(&self, body: &Value, headers: &[(String, String)]) -> reqwest::RequestBuilder {
        let mut req = self.client.post(&self.url).json(body);
        for (name, value) in headers {
            req = req.header(name, value);
        }
        req
    }
}

#[async_trait]
impl UpstreamFetcher for HttpUpstream {
    async fn fetch(&self, body: &Value, headers: &[(String, String)]) -> Result<UpstreamResponse> {
        debug!(url = %self.url, "forwarding request upstream");
        let resp = self
            .request(body, headers)
            .send()
            .await
            .map_err(|e| CacheError::Upstream(format!("request failed: {e}")))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| CacheError::Upstream(format!("failed to read response: {e}")))?;
        // Keep non-JSON error bodies intact rather than failing the relay.
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::json!({ "error": text }));
        Ok(UpstreamResponse { status, body })
    }

    async fn fetch_stream(
        &self,
        body: &Value,
        headers: &[(String, String)],
    ) -> Result<UpstreamStream> {
        debug!(url = %self.url, "passing streaming request through");
        let resp = self
            .request(body, headers)
            .send()
            .await
            .map_err(|e| CacheError::Upstream(format!("request failed: {e}")))?;

        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = resp.bytes_stream().map_err(std::io::Error::other).boxed();
        Ok(UpstreamStream {
            status,
            content_type,
            body,
        })
    }
}
