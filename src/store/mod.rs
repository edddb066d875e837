pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::models::credential::Credential;
use crate::models::project::{ProjectRecord, ProjectSettings, ProjectUpsert};

/// Persistence for the GitHub credential pool.
///
/// Implementations: `PgStore` (PostgreSQL) and `MemoryStore` (in-process).
/// Concurrent callers may race on `last_used_at` and `enabled`; the only
/// guarantee needed is that selection and stamping happen as one step.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert each token that is not already present. Returns the number inserted.
    async fn seed_tokens(&self, tokens: &[String]) -> anyhow::Result<usize>;

    /// Pick the enabled credential with the oldest `last_used_at` (never-used
    /// first, ties by lowest id), skipping `exclude`, and stamp it as used now.
    /// Returns `None` when nothing is eligible.
    async fn select_and_mark_used(&self, exclude: &[i64]) -> anyhow::Result<Option<Credential>>;

    /// Mark a credential as rejected: `enabled = false`, `fail_count += 1`.
    async fn disable(&self, id: i64) -> anyhow::Result<()>;

    /// Re-enable a credential. Returns false if it does not exist.
    async fn enable(&self, id: i64) -> anyhow::Result<bool>;

    /// Administrative delete. Returns false if it does not exist.
    async fn remove(&self, id: i64) -> anyhow::Result<bool>;

    /// All credentials ordered by id.
    async fn list(&self) -> anyhow::Result<Vec<Credential>>;
}

/// Persistence for the project showcase.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    /// Insert a hidden project, or refresh the metadata of the existing row
    /// with the same `repo_name`. `enabled` and `custom_url` are never touched
    /// on conflict.
    async fn upsert_project(&self, project: &ProjectUpsert) -> anyhow::Result<ProjectRecord>;

    /// All projects, most recently updated first.
    async fn list_projects(&self) -> anyhow::Result<Vec<ProjectRecord>>;

    /// Only `enabled` projects, most recently updated first.
    async fn list_published_projects(&self) -> anyhow::Result<Vec<ProjectRecord>>;

    /// Apply an admin save. Returns false if the project does not exist.
    async fn update_project_settings(&self, settings: &ProjectSettings) -> anyhow::Result<bool>;
}

/// Both repositories, usually backed by the same store.
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub projects: Arc<dyn ProjectStore>,
}

impl Stores {
    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            credentials: store.clone(),
            projects: store,
        }
    }

    pub fn postgres(store: postgres::PgStore) -> Self {
        let store = Arc::new(store);
        Self {
            credentials: store.clone(),
            projects: store,
        }
    }

    /// Open the store named by `database_url`, running migrations for PostgreSQL.
    pub async fn open(database_url: &str) -> anyhow::Result<Self> {
        if database_url == crate::config::MEMORY_DATABASE_URL {
            tracing::warn!("Using in-memory store: data is lost on restart");
            return Ok(Self::memory());
        }
        tracing::info!("Connecting to database...");
        let db = postgres::PgStore::connect(database_url).await?;
        tracing::info!("Running migrations...");
        db.migrate().await?;
        Ok(Self::postgres(db))
    }
}
