use serde::Deserialize;

use crate::models::project::ProjectUpsert;

/// The subset of a GitHub repository object the showcase needs.
#[derive(Debug, Clone, Deserialize)]
pub struct GhRepo {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub owner: GhOwner,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GhOwner {
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl GhRepo {
    pub fn into_upsert(self) -> ProjectUpsert {
        ProjectUpsert {
            title: self.name.clone(),
            repo_name: self.name,
            description: self.description.unwrap_or_default(),
            image_url: self.owner.avatar_url.unwrap_or_default(),
            github_url: self.html_url,
        }
    }
}
