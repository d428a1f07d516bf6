use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    /// `lms.base_url` is blank.
    #[error("LMS base URL cannot be empty")]
    EmptyBaseUrl,

    /// `lms.base_url` is not http(s).
    #[error("Invalid LMS base URL: {0}. Must start with http:// or https://")]
    InvalidBaseUrl(String),

    /// `lms.timeout_secs` is zero.
    #[error("Invalid timeout_secs: {0}. Must be at least 1")]
    InvalidTimeout(u64),

    /// `reconciliation.max_poll_attempts` is out of range.
    #[error("Invalid max_poll_attempts: {0}. Must be between 1 and 20")]
    InvalidMaxPollAttempts(u32),

    /// `reconciliation.poll_delay_ms` is out of range.
    #[error("Invalid poll_delay_ms: {0}. Must be between 1 and 60000")]
    InvalidPollDelay(u64),

    /// Unknown log level.
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    /// Unknown log format.
    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    /// Unknown rotation policy.
    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .courseware/config.yaml (project config)
    /// 3. .courseware/local.yaml (local overrides, optional)
    /// 4. Environment variables (COURSEWARE_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".courseware/config.yaml"))
            .merge(Yaml::file(".courseware/local.yaml"))
            .merge(Env::prefixed("COURSEWARE_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment
    /// overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed("COURSEWARE_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let base_url = config.lms.base_url.trim();
        if base_url.is_empty() {
            return Err(ConfigError::EmptyBaseUrl);
        }
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidBaseUrl(config.lms.base_url.clone()));
        }
        if config.lms.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout(config.lms.timeout_secs));
        }

        let attempts = config.reconciliation.max_poll_attempts;
        if !(1..=20).contains(&attempts) {
            return Err(ConfigError::InvalidMaxPollAttempts(attempts));
        }
        let delay = config.reconciliation.poll_delay_ms;
        if delay == 0 || delay > 60_000 {
            return Err(ConfigError::InvalidPollDelay(delay));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.lms.base_url, "http://localhost:18000");
        assert_eq!(config.reconciliation.max_poll_attempts, 3);
        assert_eq!(config.reconciliation.poll_delay_ms, 1000);
        assert_eq!(config.logging.level, "info");
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
lms:
  base_url: https://lms.example.com
  access_token: secret
reconciliation:
  max_poll_attempts: 5
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.lms.base_url, "https://lms.example.com");
        assert_eq!(config.lms.access_token.as_deref(), Some("secret"));
        assert_eq!(config.lms.timeout_secs, 30);
        assert_eq!(config.reconciliation.max_poll_attempts, 5);
        assert_eq!(config.reconciliation.poll_delay_ms, 1000);
        assert_eq!(config.logging.format, "json");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_poll_attempts_bounds() {
        let mut config = Config::default();
        config.reconciliation.max_poll_attempts = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxPollAttempts(0))
        ));

        config.reconciliation.max_poll_attempts = 21;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxPollAttempts(21))
        ));

        config.reconciliation.max_poll_attempts = 20;
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn test_validate_poll_delay() {
        let mut config = Config::default();
        config.reconciliation.poll_delay_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidPollDelay(0))
        ));

        config.reconciliation.poll_delay_ms = 60_001;
        assert!(ConfigLoader::validate(&config).is_err());
    }

    #[test]
    fn test_validate_base_url() {
        let mut config = Config::default();
        config.lms.base_url = "  ".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyBaseUrl)
        ));

        config.lms.base_url = "lms.example.com".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "verbose"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_rotation() {
        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRotation(_))
        ));
    }
}
