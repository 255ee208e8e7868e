//! Environment-configurable options (spec §6).

use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_duration_secs(key: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_or(key, default_secs))
}

#[derive(Debug, Clone)]
pub struct Options {
    pub hot_ttl: Duration,
    pub warm_ttl: Duration,
    pub shard_count: u32,
    pub aging_period: Duration,
    pub workers: u32,
    pub rate_limit_per_system: f64,
    pub auth_token: String,
    pub auth_enabled: bool,
    pub alert_dedup_window: Duration,
    pub circuit_failure_threshold: u32,
    pub circuit_open_duration: Duration,
    pub circuit_success_threshold: u32,
    pub embed_dim: usize,
    pub http_port: u16,
    pub object_store_path: String,
}

/// `ConfigError` maps directly to exit code 1 (spec §6): a
/// misconfigured or missing auth token when auth is enabled is the
/// only case that fails startup outright.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("AUTH_ENABLED is true but AUTH_TOKEN is empty")]
    MissingAuthToken,
}

impl Options {
    pub fn from_env() -> Result<Self, ConfigError> {
        let auth_enabled = env_or("AUTH_ENABLED", true);
        let auth_token = env::var("AUTH_TOKEN").unwrap_or_default();
        if auth_enabled && auth_token.is_empty() {
            return Err(ConfigError::MissingAuthToken);
        }

        Ok(Self {
            hot_ttl: env_duration_secs("HOT_TTL", 7 * 24 * 3600),
            warm_ttl: env_duration_secs("WARM_TTL", 90 * 24 * 3600),
            shard_count: env_or("SHARD_COUNT", 256),
            aging_period: env_duration_secs("AGING_PERIOD", 3600),
            workers: env_or("WORKERS", 4),
            rate_limit_per_system: env_or("RATE_LIMIT_PER_SYSTEM", 100.0),
            auth_token,
            auth_enabled,
            alert_dedup_window: env_duration_secs("ALERT_DEDUP_WINDOW", 300),
            circuit_failure_threshold: env_or("CIRCUIT_FAILURE_THRESHOLD", 5),
            circuit_open_duration: env_duration_secs("CIRCUIT_OPEN_DURATION", 60),
            circuit_success_threshold: env_or("CIRCUIT_SUCCESS_THRESHOLD", 2),
            embed_dim: env_or("EMBED_DIM", 384),
            http_port: env_or("MEMORYD_HTTP_PORT", 8080),
            object_store_path: env::var("MEMORYD_OBJECT_STORE_PATH").unwrap_or_else(|_| "./data/objects".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both scenarios share process-global env state, so they run as one
    // test to avoid racing against each other under parallel test execution.
    #[test]
    fn auth_token_requirement_follows_auth_enabled() {
        std::env::remove_var("AUTH_TOKEN");
        std::env::set_var("AUTH_ENABLED", "true");
        assert!(matches!(Options::from_env(), Err(ConfigError::MissingAuthToken)));

        std::env::set_var("AUTH_ENABLED", "false");
        assert!(Options::from_env().is_ok());

        std::env::remove_var("AUTH_ENABLED");
    }
}
