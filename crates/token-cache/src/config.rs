//! Token cache configuration.
//!
//! Configuration is loaded from environment variables. The Redis URL is
//! redacted in Debug output because it may carry a password.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default Auth Service gRPC endpoint.
pub const DEFAULT_AUTH_SERVICE_URL: &str = "http://localhost:9080";

/// Default Redis URL for the tier-2 cache.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Default tier-1 max TTL in minutes.
pub const DEFAULT_L1_TTL_MINUTES: u64 = 5;

/// Default tier-2 max TTL in minutes.
pub const DEFAULT_L2_TTL_MINUTES: u64 = 15;

/// Default tier-1 entry bound.
pub const DEFAULT_L1_MAX_CAPACITY: u64 = 10_000;

/// Default per-command timeout for tier-2 operations.
pub const DEFAULT_L2_OPERATION_TIMEOUT_MS: u64 = 100;

/// Default timeout for a remote validation call.
pub const DEFAULT_VALIDATE_TIMEOUT_SECONDS: u64 = 10;

/// Token cache configuration.
#[derive(Clone)]
pub struct Config {
    /// Auth Service gRPC endpoint (e.g. `http://auth-service:9080`).
    pub auth_service_url: String,

    /// Redis URL for tier 2. Empty disables tier 2 entirely.
    pub redis_url: String,

    /// When false, every request goes straight to the Auth Service.
    pub cache_enabled: bool,

    /// Upper bound on a tier-1 entry lifetime.
    pub l1_ttl: Duration,

    /// Upper bound on a tier-2 entry lifetime.
    pub l2_ttl: Duration,

    /// Maximum number of tier-1 entries.
    pub l1_max_capacity: u64,

    /// Timeout applied to every tier-2 command.
    pub l2_operation_timeout: Duration,

    /// Timeout applied to every remote validation call.
    pub validate_timeout: Duration,
}

/// Custom Debug implementation that redacts the Redis URL.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redis_url = if self.redis_url.is_empty() {
            "[DISABLED]"
        } else {
            "[REDACTED]"
        };
        f.debug_struct("Config")
            .field("auth_service_url", &self.auth_service_url)
            .field("redis_url", &redis_url)
            .field("cache_enabled", &self.cache_enabled)
            .field("l1_ttl", &self.l1_ttl)
            .field("l2_ttl", &self.l2_ttl)
            .field("l1_max_capacity", &self.l1_max_capacity)
            .field("l2_operation_timeout", &self.l2_operation_timeout)
            .field("validate_timeout", &self.validate_timeout)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auth_service_url: DEFAULT_AUTH_SERVICE_URL.to_string(),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            cache_enabled: true,
            l1_ttl: Duration::from_secs(DEFAULT_L1_TTL_MINUTES * 60),
            l2_ttl: Duration::from_secs(DEFAULT_L2_TTL_MINUTES * 60),
            l1_max_capacity: DEFAULT_L1_MAX_CAPACITY,
            l2_operation_timeout: Duration::from_millis(DEFAULT_L2_OPERATION_TIMEOUT_MS),
            validate_timeout: Duration::from_secs(DEFAULT_VALIDATE_TIMEOUT_SECONDS),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid boolean for {0}: {1}")]
    InvalidBool(String, String),

    #[error("Invalid value for {0}: {1}")]
    InvalidNumber(String, String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let auth_service_url = vars
            .get("AUTH_SERVICE_URL")
            .cloned()
            .unwrap_or_else(|| DEFAULT_AUTH_SERVICE_URL.to_string());

        // An explicitly empty REDIS_URL means "no tier 2"
        let redis_url = vars
            .get("REDIS_URL")
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());

        let cache_enabled = match vars.get("CACHE_ENABLED") {
            Some(value) => parse_bool("CACHE_ENABLED", value)?,
            None => true,
        };

        let l1_ttl = parse_minutes(vars, "L1_CACHE_TTL_MINUTES", DEFAULT_L1_TTL_MINUTES)?;
        let l2_ttl = parse_minutes(vars, "L2_CACHE_TTL_MINUTES", DEFAULT_L2_TTL_MINUTES)?;
        let l1_max_capacity =
            parse_positive(vars, "L1_CACHE_MAX_CAPACITY", DEFAULT_L1_MAX_CAPACITY)?;
        let l2_timeout_ms = parse_positive(
            vars,
            "L2_OPERATION_TIMEOUT_MS",
            DEFAULT_L2_OPERATION_TIMEOUT_MS,
        )?;
        let validate_timeout_secs = parse_positive(
            vars,
            "AUTH_VALIDATE_TIMEOUT_SECONDS",
            DEFAULT_VALIDATE_TIMEOUT_SECONDS,
        )?;

        Ok(Config {
            auth_service_url,
            redis_url,
            cache_enabled,
            l1_ttl,
            l2_ttl,
            l1_max_capacity,
            l2_operation_timeout: Duration::from_millis(l2_timeout_ms),
            validate_timeout: Duration::from_secs(validate_timeout_secs),
        })
    }

    /// Whether a tier-2 endpoint is configured at all.
    pub fn tier2_configured(&self) -> bool {
        !self.redis_url.is_empty()
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool(
            name.to_string(),
            format!("expected true/false, got '{}'", value),
        )),
    }
}

fn parse_positive(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value_str) = vars.get(name) else {
        return Ok(default);
    };

    let value: u64 = value_str.trim().parse().map_err(|e| {
        ConfigError::InvalidNumber(
            name.to_string(),
            format!(
                "must be a valid positive integer, got '{}': {}",
                value_str, e
            ),
        )
    })?;

    if value == 0 {
        return Err(ConfigError::InvalidNumber(
            name.to_string(),
            "must be greater than 0".to_string(),
        ));
    }

    Ok(value)
}

fn parse_minutes(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let minutes = parse_positive(vars, name, default)?;
    let secs = minutes.checked_mul(60).ok_or_else(|| {
        ConfigError::InvalidNumber(
            name.to_string(),
            format!("too large, got {} minutes", minutes),
        )
    })?;
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.auth_service_url, DEFAULT_AUTH_SERVICE_URL);
        assert_eq!(config.redis_url, DEFAULT_REDIS_URL);
        assert!(config.cache_enabled);
        assert_eq!(config.l1_ttl, Duration::from_secs(300));
        assert_eq!(config.l2_ttl, Duration::from_secs(900));
        assert_eq!(config.l1_max_capacity, DEFAULT_L1_MAX_CAPACITY);
        assert_eq!(config.l2_operation_timeout, Duration::from_millis(100));
        assert_eq!(config.validate_timeout, Duration::from_secs(10));
        assert!(config.tier2_configured());
    }

    #[test]
    fn test_from_vars_success_with_custom_values() {
        let vars = HashMap::from([
            (
                "AUTH_SERVICE_URL".to_string(),
                "http://auth-service:9080".to_string(),
            ),
            ("REDIS_URL".to_string(), "redis://cache:6380".to_string()),
            ("CACHE_ENABLED".to_string(), "false".to_string()),
            ("L1_CACHE_TTL_MINUTES".to_string(), "2".to_string()),
            ("L2_CACHE_TTL_MINUTES".to_string(), "30".to_string()),
            ("L1_CACHE_MAX_CAPACITY".to_string(), "500".to_string()),
            ("L2_OPERATION_TIMEOUT_MS".to_string(), "250".to_string()),
            ("AUTH_VALIDATE_TIMEOUT_SECONDS".to_string(), "3".to_string()),
        ]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.auth_service_url, "http://auth-service:9080");
        assert_eq!(config.redis_url, "redis://cache:6380");
        assert!(!config.cache_enabled);
        assert_eq!(config.l1_ttl, Duration::from_secs(120));
        assert_eq!(config.l2_ttl, Duration::from_secs(1800));
        assert_eq!(config.l1_max_capacity, 500);
        assert_eq!(config.l2_operation_timeout, Duration::from_millis(250));
        assert_eq!(config.validate_timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_empty_redis_url_disables_tier2() {
        let vars = HashMap::from([("REDIS_URL".to_string(), "".to_string())]);

        let config = Config::from_vars(&vars).expect("Config should load successfully");
        assert!(!config.tier2_configured());
    }

    #[test]
    fn test_cache_enabled_rejects_garbage() {
        let vars = HashMap::from([("CACHE_ENABLED".to_string(), "maybe".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidBool(name, _)) if name == "CACHE_ENABLED"));
    }

    #[test]
    fn test_ttl_rejects_zero() {
        let vars = HashMap::from([("L1_CACHE_TTL_MINUTES".to_string(), "0".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidNumber(name, msg)) if name == "L1_CACHE_TTL_MINUTES" && msg.contains("must be greater than 0"))
        );
    }

    #[test]
    fn test_ttl_rejects_overflow() {
        for name in ["L1_CACHE_TTL_MINUTES", "L2_CACHE_TTL_MINUTES"] {
            let vars = HashMap::from([(name.to_string(), u64::MAX.to_string())]);

            let result = Config::from_vars(&vars);
            assert!(
                matches!(&result, Err(ConfigError::InvalidNumber(n, msg)) if n == name && msg.contains("too large")),
                "{name}: {result:?}"
            );
        }

        // Largest value that still fits
        let max_minutes = u64::MAX / 60;
        let vars = HashMap::from([(
            "L2_CACHE_TTL_MINUTES".to_string(),
            max_minutes.to_string(),
        )]);
        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.l2_ttl, Duration::from_secs(max_minutes * 60));
    }

    #[test]
    fn test_ttl_rejects_non_numeric() {
        let vars = HashMap::from([("L2_CACHE_TTL_MINUTES".to_string(), "fifteen".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(
            matches!(result, Err(ConfigError::InvalidNumber(name, msg)) if name == "L2_CACHE_TTL_MINUTES" && msg.contains("must be a valid positive integer"))
        );
    }

    #[test]
    fn test_timeout_rejects_negative() {
        let vars = HashMap::from([("L2_OPERATION_TIMEOUT_MS".to_string(), "-5".to_string())]);

        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidNumber(_, _))));
    }

    #[test]
    fn test_debug_redacts_redis_url() {
        let vars = HashMap::from([(
            "REDIS_URL".to_string(),
            "redis://:hunter2@cache:6379".to_string(),
        )]);
        let config = Config::from_vars(&vars).expect("Config should load successfully");

        let debug_output = format!("{:?}", config);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("hunter2"));
    }
}
