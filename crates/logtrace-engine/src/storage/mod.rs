//! Async key-value persistence. The browser build sits on extension storage
//! or `localStorage`; the CLI uses [`FileStorage`].

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use crate::clock::Clock;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, warn};

pub const EVENTS_KEY: &str = "logtrace_events";
pub const SETTINGS_KEY: &str = "logtrace_settings";
pub const CREDITS_KEY: &str = "logtrace_credits";

pub const SAVE_RETRY_DELAY_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid storage key '{0}'")]
    InvalidKey(String),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait(?Send)]
pub trait StorageAdapter {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Writes `value` under `key`, retrying once after [`SAVE_RETRY_DELAY_MS`].
/// A second failure is only logged. Returns whether the value was stored.
pub async fn save_with_retry(
    storage: &dyn StorageAdapter,
    clock: &dyn Clock,
    key: &str,
    value: &str,
) -> bool {
    match storage.set(key, value).await {
        Ok(()) => return true,
        Err(e) => warn!(key, error = %e, retry_in_ms = SAVE_RETRY_DELAY_MS, "save failed"),
    }
    clock.sleep(SAVE_RETRY_DELAY_MS).await;
    match storage.set(key, value).await {
        Ok(()) => true,
        Err(e) => {
            error!(key, error = %e, "save failed after retry");
            false
        }
    }
}
