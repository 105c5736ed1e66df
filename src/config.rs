// Configuration File Support
//
// This module provides configuration file parsing for admission control.
// Supports TOML format with environment variable overrides.
// A missing file is not an error: every section falls back to its defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::cache::CacheConfig;
use crate::rate_limit::RateLimitConfig;
use crate::token_budget::TokenBudgetConfig;

/// Name lookup for override values (the process environment in production)
pub type EnvLookup<'a> = dyn Fn(&str) -> Option<String> + 'a;

/// Read a variable from the process environment
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Overwrite `target` with the parsed value of `name`, if present and valid
pub(crate) fn env_override<T: FromStr>(
    lookup: &EnvLookup<'_>,
    name: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(name) else {
        return;
    };

    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => tracing::warn!(var = name, value = %raw, "Ignoring unparsable override"),
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Sliding-window rate limits
    pub rate_limit: RateLimitConfig,

    /// Daily token budgets
    pub token_budget: TokenBudgetConfig,

    /// Response cache
    pub cache: CacheConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a specific path
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed, or if
    /// the resulting configuration fails validation.
    /// If the config file does not exist, defaults (plus overrides) are used.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::load_with(path, &process_env)
    }

    /// Load configuration, taking overrides from `lookup`
    pub fn load_with<P: AsRef<Path>>(path: P, lookup: &EnvLookup<'_>) -> Result<Self> {
        let path = path.as_ref();

        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file from {:?}", path))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file from {:?}", path))?;
            tracing::info!("Loaded configuration from {:?}", path);
            config
        } else {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        config.apply_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Variables take precedence over config file values:
    /// - ADMISSION_LOG_LEVEL, ADMISSION_LOG_FORMAT
    /// - ADMISSION_RATE_LIMIT_{ANONYMOUS,AUTHENTICATED,WINDOW_SECS,CLEANUP_SECS}
    /// - ADMISSION_TOKEN_BUDGET_{ANONYMOUS,AUTHENTICATED,CLEANUP_SECS}
    /// - ADMISSION_CACHE_{MAX_SIZE,TTL_SECS,CLEANUP_SECS}
    pub fn apply_overrides(&mut self, lookup: &EnvLookup<'_>) {
        if let Some(level) = lookup("ADMISSION_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ADMISSION_LOG_FORMAT") {
            self.logging.format = format;
        }

        self.rate_limit.apply_overrides(lookup);
        self.token_budget.apply_overrides(lookup);
        self.cache.apply_overrides(lookup);
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        // Validate logging level
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            ),
        }

        // Validate logging format
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!(
                "Invalid log format: {}. Must be one of: json, pretty, compact",
                self.logging.format
            ),
        }

        // Validate rate limits
        let rate = &self.rate_limit;
        if rate.max_requests_anonymous == 0 || rate.max_requests_authenticated == 0 {
            anyhow::bail!("Rate limits must be > 0");
        }
        if rate.window_secs == 0 {
            anyhow::bail!("Rate limit window must be > 0 seconds");
        }
        if rate.cleanup_interval_secs == 0 {
            anyhow::bail!("Rate limit cleanup interval must be > 0 seconds");
        }

        // Validate token budgets
        let budget = &self.token_budget;
        if budget.daily_limit_anonymous == 0 || budget.daily_limit_authenticated == 0 {
            anyhow::bail!("Daily token limits must be > 0");
        }
        if budget.cleanup_interval_secs == 0 {
            anyhow::bail!("Token budget cleanup interval must be > 0 seconds");
        }

        // Validate cache
        if self.cache.max_size == 0 {
            anyhow::bail!("Cache size must be > 0");
        }
        if self.cache.ttl_secs == 0 {
            anyhow::bail!("Cache TTL must be > 0 seconds");
        }
        if self.cache.cleanup_interval_secs == 0 {
            anyhow::bail!("Cache cleanup interval must be > 0 seconds");
        }

        Ok(())
    }

    /// Convert log level string to tracing::Level
    pub fn log_level(&self) -> Result<tracing::Level> {
        self.logging
            .level
            .to_lowercase()
            .parse()
            .map_err(|e| anyhow::anyhow!("Failed to parse log level: {}", e))
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "compact");
        assert_eq!(config.rate_limit.max_requests_anonymous, 15);
        assert_eq!(config.token_budget.daily_limit_authenticated, 250_000);
        assert_eq!(config.cache.max_size, 500);
    }

    #[test]
    fn test_config_validation_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rejects_zeroes() {
        let mut config = Config::default();
        config.rate_limit.window_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.token_budget.daily_limit_anonymous = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache.cleanup_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_nonexistent_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("nonexistent");
        let config = Config::load_with(&path, &no_env).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_valid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        let toml_content = r#"
[logging]
level = "debug"
format = "json"

[rate_limit]
max_requests_anonymous = 5
window_secs = 30

[token_budget]
daily_limit_anonymous = 1000

[cache]
max_size = 50
ttl_secs = 120
"#;
        fs::write(temp_file.path(), toml_content).unwrap();

        let config = Config::load_with(temp_file.path(), &no_env).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.rate_limit.max_requests_anonymous, 5);
        assert_eq!(config.rate_limit.max_requests_authenticated, 100);
        assert_eq!(config.rate_limit.window_secs, 30);
        assert_eq!(config.token_budget.daily_limit_anonymous, 1000);
        assert_eq!(config.cache.max_size, 50);
        assert_eq!(config.cache.ttl_secs, 120);
        assert_eq!(config.cache.cleanup_interval_secs, 600);
    }

    #[test]
    fn test_load_invalid_toml_config() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[logging\nlevel = \"debug\"\n").unwrap();
        assert!(Config::load_with(temp_file.path(), &no_env).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[cache]\nmax_size = 0\n").unwrap();
        assert!(Config::load_with(temp_file.path(), &no_env).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), "[rate_limit]\nmax_requests_anonymous = 5\n").unwrap();

        let env = env_of(&[
            ("ADMISSION_LOG_LEVEL", "debug"),
            ("ADMISSION_LOG_FORMAT", "json"),
            ("ADMISSION_RATE_LIMIT_ANONYMOUS", "9"),
            ("ADMISSION_TOKEN_BUDGET_ANONYMOUS", "5000"),
            ("ADMISSION_CACHE_MAX_SIZE", "42"),
        ]);
        let config = Config::load_with(temp_file.path(), &env).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.rate_limit.max_requests_anonymous, 9);
        assert_eq!(config.token_budget.daily_limit_anonymous, 5000);
        assert_eq!(config.cache.max_size, 42);
    }

    #[test]
    fn test_env_overrides_invalid_values() {
        let env = env_of(&[
            ("ADMISSION_CACHE_MAX_SIZE", "lots"),
            ("ADMISSION_RATE_LIMIT_WINDOW_SECS", "-1"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(&env);

        assert_eq!(config.cache.max_size, 500);
        assert_eq!(config.rate_limit.window_secs, 60);
    }

    #[test]
    fn test_env_override_failing_validation() {
        let env = env_of(&[("ADMISSION_CACHE_TTL_SECS", "0")]);
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().with_extension("missing");
        assert!(Config::load_with(&path, &env).is_err());
    }

    #[test]
    fn test_log_level_parsing() {
        let mut config = Config::default();
        config.logging.level = "WARN".to_string();
        assert_eq!(config.log_level().unwrap(), tracing::Level::WARN);
    }

    #[test]
    fn test_log_level_parsing_invalid() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.log_level().is_err());
    }

    #[test]
    fn test_toml_output_reloads() {
        let mut config = Config::default();
        config.cache.ttl_secs = 90;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), config.to_toml().unwrap()).unwrap();
        assert_eq!(Config::load_with(temp_file.path(), &no_env).unwrap(), config);
    }
}
