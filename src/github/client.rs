//! HTTP client for the GitHub REST API.
//! Issues one GET per call; status interpretation is left to the caller.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use thiserror::Error;

use super::identifier::SyncTarget;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Network-level failure: DNS, connect, TLS, timeout, or a truncated body.
#[derive(Debug, Error)]
#[error("GitHub transport failure: {0}")]
pub struct TransportFailure(pub String);

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Parsed `X-RateLimit-Remaining`, when present.
    pub rate_limit_remaining: Option<u64>,
    pub body: String,
}

impl RawResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

pub struct GitHubClient {
    http: reqwest::Client,
    api_base: String,
}

impl GitHubClient {
    /// Build a client. `proxy` routes every request through a forward proxy
    /// (http, https or socks5); `timeout` bounds each request end to end.
    pub fn new(api_base: &str, proxy: Option<&str>, timeout: Duration) -> anyhow::Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));
        default_headers.insert(USER_AGENT, HeaderValue::from_static("folio-project-sync"));

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .default_headers(default_headers)
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)));

        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| anyhow::anyhow!("invalid GitHub proxy '{}': {}", proxy_url, e))?;
            builder = builder.proxy(proxy);
            tracing::info!(proxy = proxy_url, "GitHub requests routed through proxy");
        }

        let http = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build GitHub HTTP client: {}", e))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute endpoint URL for a sync target.
    pub fn endpoint(&self, target: &SyncTarget) -> String {
        format!("{}{}", self.api_base, target.api_path())
    }

    /// GET `url`, authenticated with `token` when given.
    pub async fn fetch(&self, url: &str, token: Option<&str>) -> Result<RawResponse, TransportFailure> {
        let mut req = self.http.get(url);
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("token {}", token));
        }

        let resp = req.send().await.map_err(|e| {
            tracing::debug!(endpoint = url, "GitHub request failed: {}", e);
            TransportFailure(e.to_string())
        })?;

        let status = resp.status().as_u16();
        let rate_limit_remaining = resp
            .headers()
            .get(RATE_LIMIT_REMAINING)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let body = resp
            .text()
            .await
            .map_err(|e| TransportFailure(format!("reading response body: {}", e)))?;

        Ok(RawResponse {
            status,
            rate_limit_remaining,
            body,
        })
    }
}
