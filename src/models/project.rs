use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A showcase entry mirrored from a GitHub repository.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectRecord {
    pub id: i64,
    pub repo_name: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub github_url: String,
    /// Admin-editable override link. Sync never writes it.
    pub custom_url: String,
    /// Public visibility. New rows start hidden; sync never writes it.
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

/// Metadata written by a sync run, keyed by `repo_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectUpsert {
    pub repo_name: String,
    pub title: String,
    pub description: String,
    pub image_url: String,
    pub github_url: String,
}

/// Admin-side save for one project row.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSettings {
    pub id: i64,
    pub enabled: bool,
    #[serde(default)]
    pub custom_url: String,
    /// Replacement image; `None` keeps the current one.
    #[serde(default)]
    pub image_url: Option<String>,
}
