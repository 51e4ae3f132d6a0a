//! Console configuration
//!
//! Defaults, then an optional YAML file, then environment overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::autocorrect::DEFAULT_THRESHOLD;
use crate::conversation::HISTORY_LIMIT;

pub const ENV_URL: &str = "CATALOG_CONSOLE_URL";
pub const ENV_TOKEN: &str = "CATALOG_CONSOLE_TOKEN";
pub const ENV_THRESHOLD: &str = "CATALOG_CONSOLE_THRESHOLD";
pub const ENV_LOG: &str = "CATALOG_CONSOLE_LOG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Root of the catalog REST API
    pub base_url: String,
    /// Bearer token sent with every request
    pub token: Option<String>,
    pub correction_threshold: f64,
    pub history_limit: usize,
    pub log_level: String,
    pub request_timeout_secs: u64,
    /// Replaces the page's seed message
    pub greeting: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: None,
            correction_threshold: DEFAULT_THRESHOLD,
            history_limit: HISTORY_LIMIT,
            log_level: "info".to_string(),
            request_timeout_secs: 30,
            greeting: None,
        }
    }
}

impl ConsoleConfig {
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` (if given) and the process environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&content)?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, usually the process environment
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_URL) {
            self.base_url = url;
        }
        if let Some(token) = lookup(ENV_TOKEN) {
            self.token = Some(token).filter(|t| !t.is_empty());
        }
        if let Some(raw) = lookup(ENV_THRESHOLD) {
            self.correction_threshold = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{} is not a number: {}", ENV_THRESHOLD, raw)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.correction_threshold) {
            return Err(ConfigError::Invalid(format!(
                "correction_threshold must be between 0 and 1, got {}",
                self.correction_threshold
            )));
        }
        if self.history_limit == 0 {
            return Err(ConfigError::Invalid("history_limit must be at least 1".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url is empty".to_string()));
        }
        Ok(())
    }
}

/// Install the fmt subscriber; `CATALOG_CONSOLE_LOG` wins over `level`
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new(level));
    // a subscriber may already be installed (tests, embedding apps)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConsoleConfig::default();
        assert_eq!(config.correction_threshold, 0.7);
        assert_eq!(config.history_limit, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = ConsoleConfig::from_yaml("base_url: https://dbc.example.com\ntoken: abc\n").unwrap();
        assert_eq!(config.base_url, "https://dbc.example.com");
        assert_eq!(config.token.as_deref(), Some("abc"));
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_threshold_out_of_range() {
        let err = ConsoleConfig::from_yaml("correction_threshold: 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_URL, "http://remote:9000"), (ENV_THRESHOLD, "0.8")].into();
        let mut config = ConsoleConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.base_url, "http://remote:9000");
        assert_eq!(config.correction_threshold, 0.8);

        let bad: HashMap<&str, &str> = [(ENV_THRESHOLD, "high")].into();
        assert!(config.apply_env(|key| bad.get(key).map(|v| v.to_string())).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "history_limit: 5\ngreeting: Hello there").unwrap();
        let config = ConsoleConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.history_limit, 5);
        assert_eq!(config.greeting.as_deref(), Some("Hello there"));
    }
}
