//! Project sync: resolve admin input, fetch from GitHub through the token
//! rotation, decode, and upsert one project row per repository.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::errors::AppError;
use crate::github::{GhRepo, RawResponse, SyncTarget};
use crate::metrics::SyncMetrics;
use crate::models::project::ProjectUpsert;
use crate::rotation::TokenRotation;
use crate::store::ProjectStore;

/// Outcome of a successful sync run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub endpoint: String,
    /// Repository names upserted, in GitHub's order.
    pub synced: Vec<String>,
}

pub struct ProjectSync {
    rotation: TokenRotation,
    projects: Arc<dyn ProjectStore>,
    deadline: Duration,
    metrics: Arc<SyncMetrics>,
}

impl ProjectSync {
    pub fn new(
        rotation: TokenRotation,
        projects: Arc<dyn ProjectStore>,
        deadline: Duration,
        metrics: Arc<SyncMetrics>,
    ) -> Self {
        Self {
            rotation,
            projects,
            deadline,
            metrics,
        }
    }

    /// Run one sync for `raw` (username, `owner/repo`, or GitHub URL).
    pub async fn refresh(&self, raw: &str) -> Result<SyncReport, AppError> {
        let started = Instant::now();

        let target = match SyncTarget::resolve(raw) {
            Ok(target) => target,
            Err(e) => {
                self.metrics.record_run(e.code(), started.elapsed().as_secs_f64());
                tracing::warn!(identifier = raw, "project sync rejected: {}", e);
                return Err(e);
            }
        };
        let endpoint = self.rotation.client().endpoint(&target);

        let result = self.run(&target, &endpoint, started + self.deadline).await;

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(synced) => {
                self.metrics.record_run("ok", elapsed);
                tracing::info!(
                    identifier = raw,
                    endpoint = %endpoint,
                    count = synced.len(),
                    "project sync completed"
                );
            }
            Err(e) => {
                self.metrics.record_run(e.code(), elapsed);
                match e {
                    AppError::UpstreamError { status, body } => tracing::error!(
                        identifier = raw,
                        endpoint = %endpoint,
                        status = status,
                        body = %body,
                        "project sync failed: GitHub returned a non-200 status"
                    ),
                    _ => tracing::error!(
                        identifier = raw,
                        endpoint = %endpoint,
                        "project sync failed: {}",
                        e
                    ),
                }
            }
        }

        result.map(|synced| SyncReport { endpoint, synced })
    }

    async fn run(&self, target: &SyncTarget, endpoint: &str, deadline: Instant) -> Result<Vec<String>, AppError> {
        tracing::debug!(sync_target = %target, endpoint = endpoint, "starting project sync");

        let resp = self.rotation.fetch(endpoint, deadline).await?;
        let repos = decode(target, &resp)?;

        // Each row commits on its own; a failure stops the batch but keeps
        // the rows already written.
        let mut synced = Vec::with_capacity(repos.len());
        for upsert in repos {
            self.projects
                .upsert_project(&upsert)
                .await
                .map_err(|e| AppError::Persistence(e.context(format!("upserting project '{}'", upsert.repo_name))))?;
            self.metrics.record_upserted(1);
            synced.push(upsert.repo_name);
        }

        Ok(synced)
    }
}

/// Turn a terminal GitHub response into project rows. Nothing is returned
/// (and so nothing is written) unless the whole payload decodes.
pub fn decode(target: &SyncTarget, resp: &RawResponse) -> Result<Vec<ProjectUpsert>, AppError> {
    if !resp.is_ok() {
        return Err(AppError::UpstreamError {
            status: resp.status,
            body: resp.body.clone(),
        });
    }

    let repos: Vec<GhRepo> = if target.is_single_repo() {
        let single: GhRepo = serde_json::from_str(&resp.body)
            .map_err(|e| AppError::MalformedUpstreamPayload(e.to_string()))?;
        vec![single]
    } else {
        serde_json::from_str(&resp.body).map_err(|e| AppError::MalformedUpstreamPayload(e.to_string()))?
    };

    Ok(repos.into_iter().map(GhRepo::into_upsert).collect())
}
