//! User-facing runtime settings, persisted through the storage adapter.

use crate::clock::Clock;
use crate::storage::{self, SETTINGS_KEY, StorageAdapter};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalPosition {
    #[default]
    Bottom,
    Right,
}

/// Every field has a default so a partial saved object merges over the
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_max_events")]
    pub max_events: usize,
    #[serde(default = "default_true")]
    pub auto_save: bool,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub debug_mode: bool,
    #[serde(default = "default_true")]
    pub show_terminal: bool,
    #[serde(default = "default_true")]
    pub hover_highlight: bool,
    #[serde(default)]
    pub terminal_position: TerminalPosition,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_events: default_max_events(),
            auto_save: true,
            theme: Theme::default(),
            debug_mode: false,
            show_terminal: true,
            hover_highlight: true,
            terminal_position: TerminalPosition::default(),
        }
    }
}

fn default_max_events() -> usize {
    500
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Loads saved settings. Missing or unreadable values fall back to the
    /// defaults.
    pub async fn load(storage: &dyn StorageAdapter) -> Settings {
        match storage.get(SETTINGS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(error = %e, "saved settings unreadable, using defaults");
                    Settings::default()
                }
            },
            Ok(None) => Settings::default(),
            Err(e) => {
                warn!(error = %e, "settings load failed, using defaults");
                Settings::default()
            }
        }
    }

    /// Same retry-once policy as the event log. Returns whether the
    /// settings were stored.
    pub async fn save(&self, storage: &dyn StorageAdapter, clock: &dyn Clock) -> bool {
        let raw = match serde_json::to_string(self) {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "settings serialization failed");
                return false;
            }
        };
        storage::save_with_retry(storage, clock, SETTINGS_KEY, &raw).await
    }
}
