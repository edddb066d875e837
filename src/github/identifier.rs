use std::fmt;

use crate::errors::AppError;

/// What a sync run fetches: every repository of a user/org, or one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncTarget {
    UserRepos { user: String },
    SingleRepo { owner: String, repo: String },
}

impl SyncTarget {
    /// Resolve admin input into a target.
    ///
    /// Accepts a bare username, an `owner/repo` path, or a URL on a
    /// `github.com` host (whose path is used instead). Any other segment
    /// count, or an empty segment, is rejected before any network call.
    pub fn resolve(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        let invalid = || AppError::InvalidIdentifier(trimmed.to_string());

        // URL paths arrive percent-encoded; decode them so `api_path` encodes once.
        let parts: Vec<String> = match url::Url::parse(trimmed) {
            Ok(parsed) if parsed.host_str().is_some_and(|h| h.contains("github.com")) => parsed
                .path()
                .trim_matches('/')
                .split('/')
                .map(|seg| urlencoding::decode(seg).map(|s| s.into_owned()).map_err(|_| invalid()))
                .collect::<Result<_, _>>()?,
            _ => trimmed.split('/').map(str::to_string).collect(),
        };

        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid());
        }

        match parts.as_slice() {
            [user] => Ok(SyncTarget::UserRepos { user: user.clone() }),
            [owner, repo] => Ok(SyncTarget::SingleRepo {
                owner: owner.clone(),
                repo: repo.clone(),
            }),
            _ => Err(invalid()),
        }
    }

    /// API path relative to the GitHub base URL. Segments are percent-encoded.
    pub fn api_path(&self) -> String {
        match self {
            SyncTarget::UserRepos { user } => {
                format!("/users/{}/repos", urlencoding::encode(user))
            }
            SyncTarget::SingleRepo { owner, repo } => format!(
                "/repos/{}/{}",
                urlencoding::encode(owner),
                urlencoding::encode(repo)
            ),
        }
    }

    pub fn is_single_repo(&self) -> bool {
        matches!(self, SyncTarget::SingleRepo { .. })
    }
}

impl fmt::Display for SyncTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncTarget::UserRepos { user } => write!(f, "{}", user),
            SyncTarget::SingleRepo { owner, repo } => write!(f, "{}/{}", owner, repo),
        }
    }
}
