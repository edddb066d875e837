use std::path::Path;

use serde::Deserialize;

/// Value of `DATABASE_URL` that selects the in-process store.
pub const MEMORY_DATABASE_URL: &str = "memory";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    /// Shared secret gating the admin API. `None` disables the admin API entirely.
    pub admin_key: Option<String>,
    pub log_level: Option<String>,
    /// Tokens seeded into the credential pool at startup (insert-if-absent).
    pub github_tokens: Vec<String>,
    /// Forward proxy for all GitHub calls, e.g. `socks5://127.0.0.1:9050`.
    pub github_proxy: Option<String>,
    pub github_api_base: String,
    pub github_timeout_secs: u64,
    /// Upper bound on authenticated attempts per sync run.
    pub sync_max_attempts: u32,
    /// Wall-clock budget for one sync run across all attempts.
    pub sync_deadline_secs: u64,
    /// Disable credentials on 403 when the rate-limit quota is not exhausted.
    pub strict_forbidden: bool,
    pub dashboard_origin: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_url: MEMORY_DATABASE_URL.into(),
            admin_key: None,
            log_level: None,
            github_tokens: Vec::new(),
            github_proxy: None,
            github_api_base: "https://api.github.com".into(),
            github_timeout_secs: 30,
            sync_max_attempts: 10,
            sync_deadline_secs: 120,
            strict_forbidden: false,
            dashboard_origin: "http://localhost:3000".into(),
        }
    }
}

impl Config {
    pub fn uses_memory_store(&self) -> bool {
        self.database_url == MEMORY_DATABASE_URL
    }
}

/// Keys accepted in the JSON config file. Each maps onto an environment
/// variable and only fills it when the variable is not already set.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    database_url: Option<String>,
    admin_key: Option<String>,
    log_level: Option<String>,
    github_tokens: Option<String>,
    github_proxy: Option<String>,
    listen: Option<String>,
}

impl FileConfig {
    fn env_pairs(self) -> Vec<(&'static str, String)> {
        let listen_port = self.listen.and_then(|l| {
            l.rsplit(':')
                .next()
                .filter(|p| !p.is_empty())
                .map(String::from)
        });
        [
            ("DATABASE_URL", self.database_url),
            ("FOLIO_ADMIN_KEY", self.admin_key),
            ("FOLIO_LOG_LEVEL", self.log_level),
            ("GITHUB_TOKENS", self.github_tokens),
            ("GITHUB_PROXY", self.github_proxy),
            ("FOLIO_PORT", listen_port),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.filter(|v| !v.trim().is_empty()).map(|v| (k, v)))
        .collect()
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let path = std::env::var("FOLIO_CONFIG").unwrap_or_else(|_| "config/config.json".into());
    apply_file(Path::new(&path))?;

    from_lookup(|key| std::env::var(key).ok())
}

/// Export values from the JSON config file into the process environment.
/// A missing file is not an error; a malformed one is.
fn apply_file(path: &Path) -> anyhow::Result<()> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(anyhow::anyhow!("reading {}: {}", path.display(), e)),
    };
    let file: FileConfig = serde_json::from_str(&raw)
        .map_err(|e| anyhow::anyhow!("parsing {}: {}", path.display(), e))?;

    for (key, value) in file.env_pairs() {
        if std::env::var_os(key).is_none() {
            std::env::set_var(key, value);
        }
    }
    Ok(())
}

/// Build a config from an arbitrary variable lookup.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let github_proxy = lookup("GITHUB_PROXY").filter(|p| !p.trim().is_empty());
    if let Some(proxy) = &github_proxy {
        url::Url::parse(proxy)
            .map_err(|e| anyhow::anyhow!("GITHUB_PROXY is not a valid URL ({}): {}", proxy, e))?;
    }

    let sync_max_attempts = parse_or(&lookup, "FOLIO_SYNC_MAX_ATTEMPTS", defaults.sync_max_attempts);
    if sync_max_attempts == 0 {
        anyhow::bail!("FOLIO_SYNC_MAX_ATTEMPTS must be at least 1");
    }

    Ok(Config {
        port: parse_or(&lookup, "FOLIO_PORT", defaults.port),
        database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
        admin_key: lookup("FOLIO_ADMIN_KEY").filter(|k| !k.is_empty()),
        log_level: lookup("FOLIO_LOG_LEVEL"),
        github_tokens: split_tokens(&lookup("GITHUB_TOKENS").unwrap_or_default()),
        github_proxy,
        github_api_base: lookup("GITHUB_API_BASE")
            .map(|b| b.trim_end_matches('/').to_string())
            .unwrap_or(defaults.github_api_base),
        github_timeout_secs: parse_or(&lookup, "GITHUB_TIMEOUT_SECS", defaults.github_timeout_secs),
        sync_max_attempts,
        sync_deadline_secs: parse_or(&lookup, "FOLIO_SYNC_DEADLINE_SECS", defaults.sync_deadline_secs),
        strict_forbidden: lookup("FOLIO_STRICT_FORBIDDEN")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(defaults.strict_forbidden),
        dashboard_origin: lookup("DASHBOARD_ORIGIN").unwrap_or(defaults.dashboard_origin),
    })
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated token list, dropping blanks and duplicates.
pub fn split_tokens(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|t| t == token) {
            out.push(token.to_string());
        }
    }
    out
}
