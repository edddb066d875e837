use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// One GitHub API token in the credential pool.
///
/// `Debug` is implemented by hand so the secret never reaches a log line.
#[derive(Clone, sqlx::FromRow)]
pub struct Credential {
    pub id: i64,
    pub token: String,
    pub enabled: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub fail_count: i32,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Short, stable identifier safe to log and display.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.token)
    }

    pub fn meta(&self) -> CredentialMeta {
        CredentialMeta {
            id: self.id,
            fingerprint: self.fingerprint(),
            enabled: self.enabled,
            last_used_at: self.last_used_at,
            fail_count: self.fail_count,
            created_at: self.created_at,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("token", &format_args!("sha256:{}", self.fingerprint()))
            .field("enabled", &self.enabled)
            .field("last_used_at", &self.last_used_at)
            .field("fail_count", &self.fail_count)
            .finish()
    }
}

/// Credential metadata returned by the admin API and CLI. Never carries the secret.
#[derive(Debug, Clone, Serialize)]
pub struct CredentialMeta {
    pub id: i64,
    pub fingerprint: String,
    pub enabled: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub fail_count: i32,
    pub created_at: DateTime<Utc>,
}

/// First 12 hex chars of the token's SHA-256.
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Credential {
        Credential {
            id: 7,
            token: "ghp_supersecretvalue".into(),
            enabled: true,
            last_used_at: None,
            fail_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("supersecret"));
        assert!(rendered.contains("sha256:"));
    }

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
        assert_eq!(fingerprint("abc").len(), 12);
    }

    #[test]
    fn test_meta_serialization_has_no_token() {
        let json = serde_json::to_value(sample().meta()).unwrap();
        assert!(json.get("token").is_none());
        assert_eq!(json["id"], 7);
        assert_eq!(json["fail_count"], 0);
    }
}
