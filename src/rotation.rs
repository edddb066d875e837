//! GitHub token rotation.
//!
//! Walks the credential pool in least-recently-used order until GitHub gives
//! a terminal answer, pruning tokens GitHub rejects and skipping (without
//! disabling) tokens that are rate-limited or hit a network error. When the
//! pool runs dry the request is sent once more without credentials.
//!
//! ```text
//! SelectingToken ─▶ Requesting ─┬─ terminal status ─────────▶ done
//!       ▲                       ├─ 401 (disable) ──┐
//!       │                       ├─ 403 (skip)    ──┤
//!       │                       └─ transport err ──┤
//!       └──────────────────────────────────────────┘
//! pool empty / attempts exhausted ─▶ FallbackUnauthenticated ─▶ done | UpstreamUnavailable
//! ```

use std::sync::Arc;

use tokio::time::Instant;

use crate::errors::AppError;
use crate::github::{GitHubClient, RawResponse};
use crate::metrics::SyncMetrics;
use crate::models::credential::Credential;
use crate::store::CredentialStore;

/// How a single authenticated response is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the response to the caller.
    Terminal,
    /// The credential is dead: disable it and try another.
    Rejected,
    /// The credential may recover: try another, leave it enabled.
    Skip,
}

/// Classify a response obtained with a credential.
///
/// 401 always rejects. 403 is treated as rate limiting; with
/// `strict_forbidden` a 403 that still reports remaining quota is treated
/// as a genuine authorization failure instead.
pub fn classify(resp: &RawResponse, strict_forbidden: bool) -> Verdict {
    match resp.status {
        401 => Verdict::Rejected,
        403 => match resp.rate_limit_remaining {
            Some(remaining) if remaining > 0 && strict_forbidden => Verdict::Rejected,
            _ => Verdict::Skip,
        },
        _ => Verdict::Terminal,
    }
}

pub struct TokenRotation {
    credentials: Arc<dyn CredentialStore>,
    client: Arc<GitHubClient>,
    max_attempts: u32,
    strict_forbidden: bool,
    metrics: Arc<SyncMetrics>,
}

impl TokenRotation {
    pub fn new(
        credentials: Arc<dyn CredentialStore>,
        client: Arc<GitHubClient>,
        max_attempts: u32,
        strict_forbidden: bool,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            credentials,
            client,
            max_attempts,
            strict_forbidden,
            metrics,
        }
    }

    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    /// GET `url` with rotating credentials, falling back to one
    /// unauthenticated request. No new request is started after `deadline`.
    ///
    /// Returns whatever terminal response was obtained, 200 or not.
    pub async fn fetch(&self, url: &str, deadline: Instant) -> Result<RawResponse, AppError> {
        let mut tried: Vec<i64> = Vec::new();

        for attempt in 1..=self.max_attempts {
            check_deadline(deadline, url)?;

            let Some(cred) = self
                .credentials
                .select_and_mark_used(&tried)
                .await
                .map_err(AppError::Persistence)?
            else {
                tracing::debug!(
                    endpoint = url,
                    attempt = attempt,
                    "no usable GitHub credential left, falling back to anonymous request"
                );
                break;
            };
            tried.push(cred.id);

            if let Some(resp) = self.attempt(url, &cred, attempt, deadline).await? {
                return Ok(resp);
            }
        }

        check_deadline(deadline, url)?;
        self.metrics.record_attempt("fallback");
        match self.send(url, None, deadline).await {
            Ok(resp) => {
                tracing::info!(endpoint = url, status = resp.status, "anonymous GitHub request completed");
                Ok(resp)
            }
            Err(e) => {
                tracing::error!(endpoint = url, "anonymous GitHub fallback failed: {}", e);
                Err(AppError::UpstreamUnavailable(e))
            }
        }
    }

    /// One authenticated attempt. `Ok(None)` means "try the next credential".
    async fn attempt(
        &self,
        url: &str,
        cred: &Credential,
        attempt: u32,
        deadline: Instant,
    ) -> Result<Option<RawResponse>, AppError> {
        let resp = match self.send(url, Some(&cred.token), deadline).await {
            Ok(resp) => resp,
            Err(e) => {
                self.metrics.record_attempt("transport_error");
                tracing::warn!(
                    endpoint = url,
                    credential_id = cred.id,
                    attempt = attempt,
                    "GitHub request failed, trying next credential: {}",
                    e
                );
                return Ok(None);
            }
        };

        match classify(&resp, self.strict_forbidden) {
            Verdict::Terminal => {
                self.metrics
                    .record_attempt(if resp.is_ok() { "success" } else { "terminal" });
                tracing::debug!(
                    endpoint = url,
                    credential_id = cred.id,
                    status = resp.status,
                    attempt = attempt,
                    "GitHub request completed"
                );
                Ok(Some(resp))
            }
            Verdict::Rejected => {
                self.metrics.record_attempt("auth_rejected");
                self.metrics.record_disabled();
                tracing::warn!(
                    endpoint = url,
                    credential_id = cred.id,
                    fingerprint = %cred.fingerprint(),
                    status = resp.status,
                    "GitHub rejected credential, disabling it"
                );
                self.credentials
                    .disable(cred.id)
                    .await
                    .map_err(AppError::Persistence)?;
                Ok(None)
            }
            Verdict::Skip => {
                self.metrics.record_attempt("rate_limited");
                if resp.rate_limit_remaining.is_some_and(|r| r > 0) {
                    // Quota left yet 403: likely a permissions problem, not a rate limit.
                    tracing::warn!(
                        endpoint = url,
                        credential_id = cred.id,
                        remaining = resp.rate_limit_remaining,
                        "GitHub returned 403 with quota remaining; credential kept enabled"
                    );
                } else {
                    tracing::warn!(
                        endpoint = url,
                        credential_id = cred.id,
                        "GitHub credential rate-limited, trying next credential"
                    );
                }
                Ok(None)
            }
        }
    }

    /// Send one request, cut short if it would outlive the caller's deadline.
    async fn send(&self, url: &str, token: Option<&str>, deadline: Instant) -> Result<RawResponse, String> {
        match tokio::time::timeout_at(deadline, self.client.fetch(url, token)).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("sync deadline exceeded while waiting for GitHub".to_string()),
        }
    }
}

fn check_deadline(deadline: Instant, url: &str) -> Result<(), AppError> {
    if Instant::now() >= deadline {
        tracing::error!(endpoint = url, "sync deadline exceeded, not issuing further GitHub requests");
        return Err(AppError::UpstreamUnavailable(
            "sync deadline exceeded".to_string(),
        ));
    }
    Ok(())
}
