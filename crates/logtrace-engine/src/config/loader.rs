use super::schema::LogTraceConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Overrides `ai.api_key` when set.
pub const API_KEY_ENV: &str = "LOGTRACE_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid AI endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("Invalid config: {0}")]
    Invalid(String),
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from default locations:
    /// 1. ./logtrace.yaml
    /// 2. ~/.logtrace/config.yaml
    /// 3. Default configuration
    pub async fn load_default() -> Result<LogTraceConfig, ConfigError> {
        let local_config = PathBuf::from("./logtrace.yaml");
        if local_config.exists() {
            return Self::load_from(&local_config).await;
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".logtrace").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config).await;
            }
        }

        let mut config = LogTraceConfig::default();
        Self::apply_env(&mut config);
        Ok(config)
    }

    pub async fn load_from(path: &Path) -> Result<LogTraceConfig, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config = Self::parse(&content)?;
        Self::apply_env(&mut config);
        Ok(config)
    }

    /// Parses and validates YAML without consulting the environment.
    pub fn parse(content: &str) -> Result<LogTraceConfig, ConfigError> {
        let config: LogTraceConfig = serde_yaml::from_str(content)?;
        Self::validate(&config)?;
        Ok(config)
    }

    pub fn validate(config: &LogTraceConfig) -> Result<(), ConfigError> {
        let endpoint = url::Url::parse(&config.ai.endpoint).map_err(|e| {
            ConfigError::InvalidEndpoint {
                endpoint: config.ai.endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidEndpoint {
                endpoint: config.ai.endpoint.clone(),
                reason: format!("unsupported scheme '{}'", endpoint.scheme()),
            });
        }
        if config.rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.max_requests must be at least 1".into(),
            ));
        }
        if config.rate_limit.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "rate_limit.window_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn apply_env(config: &mut LogTraceConfig) {
        Self::apply_api_key(config, std::env::var(API_KEY_ENV).ok());
    }

    /// Blank values leave the configured key in place.
    pub fn apply_api_key(config: &mut LogTraceConfig, key: Option<String>) {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            config.ai.api_key = Some(key.trim().to_string());
        }
    }
}
