use crate::pager::CursorPolicy;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for `CHALLENGE_TTL_SECS` (30 days).
pub const MAX_CHALLENGE_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Upper bound for `SESSION_TTL_SECS` (365 days).
pub const MAX_SESSION_TTL_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct Config {
    // Server
    pub bind_addr: SocketAddr,

    // Storage
    pub database_path: PathBuf,
    pub redis_url: Option<String>,
    pub store_timeout_ms: u64,

    // TTLs (in seconds)
    pub challenge_ttl_secs: u64,
    pub session_ttl_secs: u64,

    // Pagination
    pub tasks_per_page: usize,
    pub max_tasks_per_page: usize,
    pub stale_cursor_policy: CursorPolicy,

    // Background sweep of the in-memory stores
    pub sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            database_path: PathBuf::from("tasks_notes.db"),
            redis_url: None,
            store_timeout_ms: 2_000,
            challenge_ttl_secs: 300,
            session_ttl_secs: 86_400,
            tasks_per_page: 12,
            max_tasks_per_page: 100,
            stale_cursor_policy: CursorPolicy::Restart,
            sweep_interval_secs: 60,
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("database_path", &self.database_path)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[REDACTED]"))
            .field("store_timeout_ms", &self.store_timeout_ms)
            .field("challenge_ttl_secs", &self.challenge_ttl_secs)
            .field("session_ttl_secs", &self.session_ttl_secs)
            .field("tasks_per_page", &self.tasks_per_page)
            .field("max_tasks_per_page", &self.max_tasks_per_page)
            .field("stale_cursor_policy", &self.stale_cursor_policy)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Attempt to load .env file, but don't fail if it doesn't exist
        // (env vars may be set directly in production)
        let _ = dotenvy::dotenv();

        let defaults = Config::default();

        // Server
        let bind_addr = parse_env_or_default("BIND_ADDR", defaults.bind_addr)?;

        // Storage
        let database_path = match env::var("DATABASE_PATH") {
            Ok(path) if path.trim().is_empty() => {
                return Err(ConfigError::InvalidValue(
                    "DATABASE_PATH".to_string(),
                    "cannot be empty".to_string(),
                ))
            }
            Ok(path) => PathBuf::from(path),
            Err(_) => defaults.database_path,
        };

        // Unset or empty REDIS_URL selects the in-process stores
        let redis_url = env::var("REDIS_URL")
            .ok()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        if let Some(url) = &redis_url {
            if !url.starts_with("redis://") && !url.starts_with("rediss://") {
                return Err(ConfigError::InvalidValue(
                    "REDIS_URL".to_string(),
                    "must start with redis:// or rediss://".to_string(),
                ));
            }
        }

        let store_timeout_ms = parse_env_or_default("STORE_TIMEOUT_MS", defaults.store_timeout_ms)?;
        require_positive("STORE_TIMEOUT_MS", store_timeout_ms)?;

        // TTLs
        let challenge_ttl_secs =
            parse_env_or_default("CHALLENGE_TTL_SECS", defaults.challenge_ttl_secs)?;
        require_in_range("CHALLENGE_TTL_SECS", challenge_ttl_secs, MAX_CHALLENGE_TTL_SECS)?;
        let session_ttl_secs = parse_env_or_default("SESSION_TTL_SECS", defaults.session_ttl_secs)?;
        require_in_range("SESSION_TTL_SECS", session_ttl_secs, MAX_SESSION_TTL_SECS)?;

        // Pagination
        let max_tasks_per_page =
            parse_env_or_default("MAX_TASKS_PER_PAGE", defaults.max_tasks_per_page)?;
        require_positive("MAX_TASKS_PER_PAGE", max_tasks_per_page as u64)?;
        let tasks_per_page = parse_env_or_default("TASKS_PER_PAGE", defaults.tasks_per_page)?;
        if tasks_per_page == 0 || tasks_per_page > max_tasks_per_page {
            return Err(ConfigError::InvalidValue(
                "TASKS_PER_PAGE".to_string(),
                format!("must be between 1 and {}", max_tasks_per_page),
            ));
        }
        let stale_cursor_policy =
            parse_env_or_default("STALE_CURSOR_POLICY", defaults.stale_cursor_policy)?;

        let sweep_interval_secs =
            parse_env_or_default("SWEEP_INTERVAL_SECS", defaults.sweep_interval_secs)?;
        require_positive("SWEEP_INTERVAL_SECS", sweep_interval_secs)?;

        Ok(Config {
            bind_addr,
            database_path,
            redis_url,
            store_timeout_ms,
            challenge_ttl_secs,
            session_ttl_secs,
            tasks_per_page,
            max_tasks_per_page,
            stale_cursor_policy,
            sweep_interval_secs,
        })
    }

    /// Challenge lifetime, capped at [`MAX_CHALLENGE_TTL_SECS`].
    pub fn challenge_ttl(&self) -> chrono::Duration {
        let secs = self.challenge_ttl_secs.min(MAX_CHALLENGE_TTL_SECS);
        chrono::Duration::try_seconds(secs as i64).unwrap_or(chrono::Duration::zero())
    }

    /// Session lifetime, capped at [`MAX_SESSION_TTL_SECS`].
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs.min(MAX_SESSION_TTL_SECS))
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Helper function to parse environment variable with a default value
fn parse_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(val) => val
            .parse::<T>()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}: {}", e, val))),
        Err(_) => Ok(default),
    }
}

fn require_in_range(key: &str, value: u64, max: u64) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("must be between 1 and {}", max),
        ));
    }
    Ok(())
}

fn require_positive(key: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
