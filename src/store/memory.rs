//! In-process store for local development (`DATABASE_URL=memory`) and tests.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;

use super::{CredentialStore, ProjectStore};
use crate::models::credential::Credential;
use crate::models::project::{ProjectRecord, ProjectSettings, ProjectUpsert};

#[derive(Default)]
struct CredentialPool {
    rows: Vec<Credential>,
    next_id: i64,
    /// Last stamp handed out, so `last_used_at` never moves backwards.
    last_stamp: Option<DateTime<Utc>>,
}

/// Credentials sit behind one mutex so selection and stamping are atomic.
/// Projects live in a `DashMap` keyed by `repo_name`; the entry API gives
/// per-key atomic upserts.
#[derive(Default)]
pub struct MemoryStore {
    credentials: Mutex<CredentialPool>,
    projects: DashMap<String, ProjectRecord>,
    next_project_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn seed_tokens(&self, tokens: &[String]) -> anyhow::Result<usize> {
        let mut pool = self.credentials.lock().await;
        let mut inserted = 0;
        for token in tokens.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if pool.rows.iter().any(|c| c.token == token) {
                continue;
            }
            pool.next_id += 1;
            let id = pool.next_id;
            pool.rows.push(Credential {
                id,
                token: token.to_string(),
                enabled: true,
                last_used_at: None,
                fail_count: 0,
                created_at: Utc::now(),
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn select_and_mark_used(&self, exclude: &[i64]) -> anyhow::Result<Option<Credential>> {
        let mut pool = self.credentials.lock().await;

        // None sorts before Some, so never-used credentials come first.
        let Some(idx) = pool
            .rows
            .iter()
            .enumerate()
            .filter(|(_, c)| c.enabled && !exclude.contains(&c.id))
            .min_by_key(|(_, c)| (c.last_used_at, c.id))
            .map(|(i, _)| i)
        else {
            return Ok(None);
        };

        let now = Utc::now();
        let stamp = match pool.last_stamp {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        pool.last_stamp = Some(stamp);
        pool.rows[idx].last_used_at = Some(stamp);
        Ok(Some(pool.rows[idx].clone()))
    }

    async fn disable(&self, id: i64) -> anyhow::Result<()> {
        let mut pool = self.credentials.lock().await;
        if let Some(c) = pool.rows.iter_mut().find(|c| c.id == id) {
            c.enabled = false;
            c.fail_count += 1;
        }
        Ok(())
    }

    async fn enable(&self, id: i64) -> anyhow::Result<bool> {
        let mut pool = self.credentials.lock().await;
        match pool.rows.iter_mut().find(|c| c.id == id) {
            Some(c) => {
                c.enabled = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, id: i64) -> anyhow::Result<bool> {
        let mut pool = self.credentials.lock().await;
        let before = pool.rows.len();
        pool.rows.retain(|c| c.id != id);
        Ok(pool.rows.len() < before)
    }

    async fn list(&self) -> anyhow::Result<Vec<Credential>> {
        let pool = self.credentials.lock().await;
        Ok(pool.rows.clone())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn upsert_project(&self, project: &ProjectUpsert) -> anyhow::Result<ProjectRecord> {
        let now = Utc::now();
        let entry = self
            .projects
            .entry(project.repo_name.clone())
            .and_modify(|row| {
                row.title = project.title.clone();
                row.description = project.description.clone();
                row.image_url = project.image_url.clone();
                row.github_url = project.github_url.clone();
                row.updated_at = now.max(row.updated_at);
            })
            .or_insert_with(|| ProjectRecord {
                id: self.next_project_id.fetch_add(1, Ordering::Relaxed) + 1,
                repo_name: project.repo_name.clone(),
                title: project.title.clone(),
                description: project.description.clone(),
                image_url: project.image_url.clone(),
                github_url: project.github_url.clone(),
                custom_url: String::new(),
                enabled: false,
                updated_at: now,
            });
        Ok(entry.value().clone())
    }

    async fn list_projects(&self) -> anyhow::Result<Vec<ProjectRecord>> {
        Ok(sorted(self.projects.iter().map(|e| e.value().clone()).collect()))
    }

    async fn list_published_projects(&self) -> anyhow::Result<Vec<ProjectRecord>> {
        Ok(sorted(
            self.projects
                .iter()
                .filter(|e| e.value().enabled)
                .map(|e| e.value().clone())
                .collect(),
        ))
    }

    async fn update_project_settings(&self, settings: &ProjectSettings) -> anyhow::Result<bool> {
        for mut row in self.projects.iter_mut() {
            if row.id == settings.id {
                row.enabled = settings.enabled;
                row.custom_url = settings.custom_url.clone();
                if let Some(image) = &settings.image_url {
                    row.image_url = image.clone();
                }
                return Ok(true);
            }
        }
        Ok(false)
    }
}

fn sorted(mut rows: Vec<ProjectRecord>) -> Vec<ProjectRecord> {
    rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn upsert(name: &str, description: &str) -> ProjectUpsert {
        ProjectUpsert {
            repo_name: name.into(),
            title: name.into(),
            description: description.into(),
            image_url: "https://avatars.example/u/1".into(),
            github_url: format!("https://github.com/octocat/{}", name),
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = MemoryStore::new();
        assert_eq!(store.seed_tokens(&tokens(&["a", "b", " "])).await.unwrap(), 2);
        assert_eq!(store.seed_tokens(&tokens(&["b", "c"])).await.unwrap(), 1);
        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|c| c.enabled && c.fail_count == 0 && c.last_used_at.is_none()));
    }

    #[tokio::test]
    async fn test_selection_is_lru_with_never_used_first() {
        let store = MemoryStore::new();
        store.seed_tokens(&tokens(&["a", "b", "c"])).await.unwrap();

        let first = store.select_and_mark_used(&[]).await.unwrap().unwrap();
        let second = store.select_and_mark_used(&[]).await.unwrap().unwrap();
        let third = store.select_and_mark_used(&[]).await.unwrap().unwrap();
        assert_eq!((first.id, second.id, third.id), (1, 2, 3));

        // All used once: oldest stamp wins again.
        let fourth = store.select_and_mark_used(&[]).await.unwrap().unwrap();
        assert_eq!(fourth.id, 1);
        assert!(fourth.last_used_at >= third.last_used_at);
    }

    #[tokio::test]
    async fn test_selection_skips_disabled_and_excluded() {
        let store = MemoryStore::new();
        store.seed_tokens(&tokens(&["a", "b", "c"])).await.unwrap();
        store.disable(1).await.unwrap();

        let picked = store.select_and_mark_used(&[2]).await.unwrap().unwrap();
        assert_eq!(picked.id, 3);
        assert!(store.select_and_mark_used(&[2, 3]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_disable_increments_fail_count_once() {
        let store = MemoryStore::new();
        store.seed_tokens(&tokens(&["a"])).await.unwrap();
        store.disable(1).await.unwrap();
        let c = &store.list().await.unwrap()[0];
        assert!(!c.enabled);
        assert_eq!(c.fail_count, 1);

        assert!(store.enable(1).await.unwrap());
        let c = &store.list().await.unwrap()[0];
        assert!(c.enabled);
        assert_eq!(c.fail_count, 1, "re-enabling keeps the failure history");
        assert!(!store.enable(99).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_credential() {
        let store = MemoryStore::new();
        store.seed_tokens(&tokens(&["a", "b"])).await.unwrap();
        assert!(store.remove(1).await.unwrap());
        assert!(!store.remove(1).await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_preserves_admin_fields() {
        let store = MemoryStore::new();
        let created = store.upsert_project(&upsert("hello", "v1")).await.unwrap();
        assert!(!created.enabled);
        assert_eq!(created.custom_url, "");

        store
            .update_project_settings(&ProjectSettings {
                id: created.id,
                enabled: true,
                custom_url: "https://hello.dev".into(),
                image_url: None,
            })
            .await
            .unwrap();

        let updated = store.upsert_project(&upsert("hello", "v2")).await.unwrap();
        assert_eq!(updated.id, created.id);
        assert!(updated.enabled);
        assert_eq!(updated.custom_url, "https://hello.dev");
        assert_eq!(updated.description, "v2");
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn test_published_listing_filters_hidden_rows() {
        let store = MemoryStore::new();
        let a = store.upsert_project(&upsert("a", "")).await.unwrap();
        store.upsert_project(&upsert("b", "")).await.unwrap();
        store
            .update_project_settings(&ProjectSettings {
                id: a.id,
                enabled: true,
                custom_url: String::new(),
                image_url: Some("/uploads/a.png".into()),
            })
            .await
            .unwrap();

        let published = store.list_published_projects().await.unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].repo_name, "a");
        assert_eq!(published[0].image_url, "/uploads/a.png");
        assert_eq!(store.list_projects().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_settings_for_unknown_project() {
        let store = MemoryStore::new();
        let found = store
            .update_project_settings(&ProjectSettings {
                id: 42,
                enabled: true,
                custom_url: String::new(),
                image_url: None,
            })
            .await
            .unwrap();
        assert!(!found);
    }
}
