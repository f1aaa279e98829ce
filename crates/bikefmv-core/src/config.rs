use crate::app_config::{AppConfig, Environment};
use crate::error::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value is present but invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let database_url = lookup("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty());
    let env = parse_environment(&or_default("BIKEFMV_ENV", "development"))?;
    let log_level = or_default("BIKEFMV_LOG_LEVEL", "info");
    let whitelist_path = PathBuf::from(or_default(
        "BIKEFMV_WHITELIST_PATH",
        "./config/fmv-whitelist.json",
    ));
    let provider_url = or_default("BIKEFMV_PROVIDER_URL", "http://127.0.0.1:3100");

    let db_max_connections = parse_u32("BIKEFMV_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("BIKEFMV_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("BIKEFMV_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let scraper_request_timeout_secs = parse_u64("BIKEFMV_SCRAPER_REQUEST_TIMEOUT_SECS", "45")?;
    let scraper_user_agent = or_default("BIKEFMV_SCRAPER_USER_AGENT", "bikefmv/0.1 (market-data)");
    let scraper_max_retries = parse_u32("BIKEFMV_SCRAPER_MAX_RETRIES", "2")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("BIKEFMV_SCRAPER_RETRY_BACKOFF_BASE_SECS", "2")?;

    let page_delay_ms = parse_u64("BIKEFMV_PAGE_DELAY_MS", "2000")?;
    let target_delay_ms = parse_u64("BIKEFMV_TARGET_DELAY_MS", "2500")?;
    let max_concurrent_sources = parse_usize("BIKEFMV_MAX_CONCURRENT_SOURCES", "1")?;
    let records_per_target = parse_u32("BIKEFMV_RECORDS_PER_TARGET", "20")?;

    if max_concurrent_sources == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "BIKEFMV_MAX_CONCURRENT_SOURCES".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        log_level,
        whitelist_path,
        provider_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        scraper_request_timeout_secs,
        scraper_user_agent,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        page_delay_ms,
        target_delay_ms,
        max_concurrent_sources,
        records_per_target,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "BIKEFMV_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
