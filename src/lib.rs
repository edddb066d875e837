//! Folio: personal site backend with a GitHub-mirrored project showcase.
//!
//! Library crate shared by the `folio` binary and the integration tests in `tests/`.

pub mod api;
pub mod config;
pub mod errors;
pub mod github;
pub mod metrics;
pub mod models;
pub mod rotation;
pub mod store;
pub mod sync;

use std::sync::Arc;
use std::time::Duration;

use github::GitHubClient;
use metrics::SyncMetrics;
use rotation::TokenRotation;
use store::Stores;
use sync::ProjectSync;

/// Shared application state passed to handlers and middleware.
pub struct AppState {
    pub stores: Stores,
    pub sync: ProjectSync,
    pub metrics: Arc<SyncMetrics>,
    pub config: config::Config,
}

impl AppState {
    /// Wire the GitHub client, token rotation and sync pipeline on top of `stores`.
    pub fn new(config: config::Config, stores: Stores) -> anyhow::Result<Self> {
        let metrics = Arc::new(SyncMetrics::new()?);
        let client = Arc::new(GitHubClient::new(
            &config.github_api_base,
            config.github_proxy.as_deref(),
            Duration::from_secs(config.github_timeout_secs),
        )?);
        let rotation = TokenRotation::new(
            stores.credentials.clone(),
            client,
            config.sync_max_attempts,
            config.strict_forbidden,
            metrics.clone(),
        );
        let sync = ProjectSync::new(
            rotation,
            stores.projects.clone(),
            Duration::from_secs(config.sync_deadline_secs),
            metrics.clone(),
        );

        Ok(Self {
            stores,
            sync,
            metrics,
            config,
        })
    }

    /// Seed the credential pool from configuration. Tokens already present are left alone.
    pub async fn seed_credentials(&self) -> anyhow::Result<usize> {
        if self.config.github_tokens.is_empty() {
            return Ok(0);
        }
        let inserted = self
            .stores
            .credentials
            .seed_tokens(&self.config.github_tokens)
            .await?;
        tracing::info!(
            configured = self.config.github_tokens.len(),
            inserted = inserted,
            "Seeded GitHub credential pool"
        );
        Ok(inserted)
    }
}
