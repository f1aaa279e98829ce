use std::path::PathBuf;

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    /// Only the commands that touch Postgres need it.
    pub database_url: Option<String>,
    pub env: Environment,
    pub log_level: String,
    pub whitelist_path: PathBuf,
    /// Base URL of the headless-browser listing sidecar.
    pub provider_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub scraper_request_timeout_secs: u64,
    pub scraper_user_agent: String,
    pub scraper_max_retries: u32,
    pub scraper_retry_backoff_base_secs: u64,
    /// Cooldown between two pages of the same target.
    pub page_delay_ms: u64,
    /// Cooldown between two targets of the same run.
    pub target_delay_ms: u64,
    /// Number of source lanes allowed to run at the same time.
    pub max_concurrent_sources: usize,
    /// Default per-target record limit for a collection run.
    pub records_per_target: u32,
}

impl AppConfig {
    /// The Postgres URL, for commands that cannot run without one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnvVar`] when `DATABASE_URL` was not set.
    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("whitelist_path", &self.whitelist_path)
            .field("database_url", &"[redacted]")
            .field("provider_url", &self.provider_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field(
                "scraper_request_timeout_secs",
                &self.scraper_request_timeout_secs,
            )
            .field("scraper_user_agent", &self.scraper_user_agent)
            .field("scraper_max_retries", &self.scraper_max_retries)
            .field(
                "scraper_retry_backoff_base_secs",
                &self.scraper_retry_backoff_base_secs,
            )
            .field("page_delay_ms", &self.page_delay_ms)
            .field("target_delay_ms", &self.target_delay_ms)
            .field("max_concurrent_sources", &self.max_concurrent_sources)
            .field("records_per_target", &self.records_per_target)
            .finish()
    }
}
