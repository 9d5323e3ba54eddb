//! Configuration management for the process phase service
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides, `FPC__` prefix with `__` between
//!    levels, e.g. `FPC__API__BASE_URL`

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use validator::Validate;

/// Main application configuration
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Cooperative REST API configuration
    #[validate]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ApiConfig {
    /// Base URL of the cooperative API, e.g. https://api.fapecafe.org/api
    #[validate(url)]
    pub base_url: String,

    /// Service token used when the caller does not forward one
    pub token: Option<String>,

    /// Transport timeout for every remote call, in seconds
    #[validate(range(min = 1, max = 300))]
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("FPC__ENVIRONMENT").unwrap_or_else(|_| "development".into());
        Self::from_sources(&environment, env_overrides())
    }

    fn from_sources(environment: &str, overrides: Environment) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("api.base_url", "http://localhost:8000/api")?
            .set_default("api.timeout_secs", 30)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (FPC__ prefix)
            .add_source(overrides)
            .build()?;

        let config: Config = config.try_deserialize()?;
        config
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(config)
    }
}

fn env_overrides() -> Environment {
    Environment::with_prefix("FPC")
        .separator("__")
        .try_parsing(true)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(base_url: &str, timeout_secs: u64) -> Config {
        Config {
            environment: "test".into(),
            server: ServerConfig::default(),
            api: ApiConfig {
                base_url: base_url.into(),
                token: None,
                timeout_secs,
            },
        }
    }

    fn load_with(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_sources("test", env_overrides().source(Some(source)))
    }

    #[test]
    fn test_defaults_without_overrides() {
        let config = load_with(&[]).unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.timeout_secs, 30);
    }

    #[test]
    fn test_double_underscore_overrides() {
        let config = load_with(&[
            ("FPC__API__BASE_URL", "https://api.fapecafe.org/api"),
            ("FPC__API__TIMEOUT_SECS", "10"),
            ("FPC__SERVER__PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.api.base_url, "https://api.fapecafe.org/api");
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_invalid_override_rejected() {
        assert!(load_with(&[("FPC__API__BASE_URL", "not a url")]).is_err());
    }

    #[test]
    fn test_valid_api_config() {
        assert!(config_with("https://api.fapecafe.org/api", 30).validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(config_with("not a url", 30).validate().is_err());
    }

    #[test]
    fn test_timeout_bounds() {
        assert!(config_with("http://localhost:8000", 0).validate().is_err());
        assert!(config_with("http://localhost:8000", 301).validate().is_err());
    }
}
