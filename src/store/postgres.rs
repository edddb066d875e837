use async_trait::async_trait;
use sqlx::PgPool;

use super::{CredentialStore, ProjectStore};
use crate::models::credential::Credential;
use crate::models::project::{ProjectRecord, ProjectSettings, ProjectUpsert};

const CREDENTIAL_COLUMNS: &str = "id, token, enabled, last_used_at, fail_count, created_at";
const PROJECT_COLUMNS: &str =
    "id, repo_name, title, description, image_url, github_url, custom_url, enabled, updated_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    /// Run pending migrations from the migrations/ directory.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn seed_tokens(&self, tokens: &[String]) -> anyhow::Result<usize> {
        let mut inserted = 0;
        for token in tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            let result = sqlx::query(
                "INSERT INTO github_tokens (token) VALUES ($1) ON CONFLICT (token) DO NOTHING",
            )
            .bind(token)
            .execute(&self.pool)
            .await?;
            inserted += result.rows_affected() as usize;
        }
        Ok(inserted)
    }

    async fn select_and_mark_used(&self, exclude: &[i64]) -> anyhow::Result<Option<Credential>> {
        // Single statement: the row lock taken by the subquery makes the
        // select+stamp atomic, and SKIP LOCKED steers a concurrent sync onto
        // the next candidate instead of the same token.
        let sql = format!(
            r#"UPDATE github_tokens
                  SET last_used_at = GREATEST(clock_timestamp(), COALESCE(last_used_at, clock_timestamp()))
                WHERE id = (
                    SELECT id FROM github_tokens
                     WHERE enabled = true AND NOT (id = ANY($1))
                     ORDER BY last_used_at ASC NULLS FIRST, id ASC
                     LIMIT 1
                     FOR UPDATE SKIP LOCKED)
            RETURNING {CREDENTIAL_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, Credential>(&sql)
            .bind(exclude)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn disable(&self, id: i64) -> anyhow::Result<()> {
        sqlx::query(
            "UPDATE github_tokens SET enabled = false, fail_count = fail_count + 1 WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn enable(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE github_tokens SET enabled = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM github_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> anyhow::Result<Vec<Credential>> {
        let sql = format!("SELECT {CREDENTIAL_COLUMNS} FROM github_tokens ORDER BY id ASC");
        let rows = sqlx::query_as::<_, Credential>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn upsert_project(&self, project: &ProjectUpsert) -> anyhow::Result<ProjectRecord> {
        let sql = format!(
            r#"INSERT INTO projects (repo_name, title, description, image_url, github_url, enabled)
               VALUES ($1, $2, $3, $4, $5, false)
               ON CONFLICT (repo_name) DO UPDATE SET
                   title       = EXCLUDED.title,
                   description = EXCLUDED.description,
                   image_url   = EXCLUDED.image_url,
                   github_url  = EXCLUDED.github_url,
                   updated_at  = NOW()
               RETURNING {PROJECT_COLUMNS}"#
        );
        let row = sqlx::query_as::<_, ProjectRecord>(&sql)
            .bind(&project.repo_name)
            .bind(&project.title)
            .bind(&project.description)
            .bind(&project.image_url)
            .bind(&project.github_url)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_projects(&self) -> anyhow::Result<Vec<ProjectRecord>> {
        let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY updated_at DESC, id DESC");
        let rows = sqlx::query_as::<_, ProjectRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn list_published_projects(&self) -> anyhow::Result<Vec<ProjectRecord>> {
        let sql = format!(
            "SELECT {PROJECT_COLUMNS} FROM projects WHERE enabled = true ORDER BY updated_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, ProjectRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update_project_settings(&self, settings: &ProjectSettings) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"UPDATE projects
                  SET enabled = $1,
                      custom_url = $2,
                      image_url = COALESCE($3, image_url)
                WHERE id = $4"#,
        )
        .bind(settings.enabled)
        .bind(&settings.custom_url)
        .bind(settings.image_url.as_deref())
        .bind(settings.id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
