pub mod loader;
pub mod schema;
pub mod settings;

pub use loader::{ConfigError, ConfigLoader};
pub use schema::{AiConfig, CreditsConfig, LogTraceConfig, RateLimitConfig, StorageConfig};
pub use settings::{Settings, TerminalPosition, Theme};
