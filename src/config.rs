//! Process settings read from the environment (and `.env` when the binary loads one).

use crate::error::ConfigError;
use crate::sql::Dialect;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_BIND: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct Settings {
    pub database_url: String,
    pub dialect: Dialect,
    pub bind_addr: SocketAddr,
    pub max_connections: u32,
    /// Deadline applied to every database operation.
    pub statement_timeout: Duration,
    /// Prefix for table routes, e.g. `/api`. Empty means mounted at the root.
    pub base_path: String,
    pub body_limit: usize,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let dialect = Dialect::from_url(&database_url)
            .ok_or_else(|| ConfigError::UnsupportedDatabase(scheme(&database_url)))?;

        let bind_addr: SocketAddr = parse(&get, "BIND_ADDR", DEFAULT_BIND.parse().ok())?;
        let max_connections: u32 = parse(&get, "DB_MAX_CONNECTIONS", Some(DEFAULT_MAX_CONNECTIONS))?;
        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                key: "DB_MAX_CONNECTIONS",
                value: "0".into(),
            });
        }
        let timeout_ms: u64 = parse(&get, "STATEMENT_TIMEOUT_MS", Some(DEFAULT_TIMEOUT_MS))?;
        let body_limit = parse(&get, "BODY_LIMIT_BYTES", Some(DEFAULT_BODY_LIMIT))?;

        Ok(Settings {
            database_url,
            dialect,
            bind_addr,
            max_connections,
            statement_timeout: Duration::from_millis(timeout_ms),
            base_path: normalize_base_path(get("BASE_PATH").unwrap_or_default()),
            body_limit,
        })
    }
}

fn parse<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: Option<T>,
) -> Result<T, ConfigError> {
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => default.ok_or(ConfigError::Missing(key)),
    }
}

fn scheme(url: &str) -> String {
    url.split(':').next().unwrap_or_default().to_string()
}

/// `api/` and `/api/` both become `/api`; `/` becomes empty.
fn normalize_base_path(raw: String) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
