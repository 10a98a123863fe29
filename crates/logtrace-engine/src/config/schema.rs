use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogTraceConfig {
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub credits: CreditsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:8787/api/analyze".to_string()
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_max_requests() -> usize {
    10
}

fn default_window_secs() -> u64 {
    60
}

/// Local stand-in for the hosted entitlement service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditsConfig {
    #[serde(default = "default_daily_allowance")]
    pub daily_allowance: u32,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub authenticated: bool,
}

impl Default for CreditsConfig {
    fn default() -> Self {
        Self {
            daily_allowance: default_daily_allowance(),
            premium: false,
            authenticated: false,
        }
    }
}

fn default_daily_allowance() -> u32 {
    5
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for persisted events and settings. Defaults to the
    /// platform data directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn resolve_dir(&self) -> PathBuf {
        if let Some(dir) = &self.dir {
            return dir.clone();
        }
        dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("logtrace")
    }
}
