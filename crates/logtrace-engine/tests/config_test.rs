use logtrace_engine::config::{
    ConfigError, ConfigLoader, LogTraceConfig, Settings, StorageConfig, TerminalPosition, Theme,
};
use async_trait::async_trait;
use logtrace_engine::clock::ManualClock;
use logtrace_engine::storage::{
    FileStorage, MemoryStorage, SAVE_RETRY_DELAY_MS, SETTINGS_KEY, StorageAdapter, StorageError,
};
use std::cell::Cell;
use std::path::PathBuf;

/// Storage whose first `failures` writes fail.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    failures: Cell<u32>,
    attempts: Cell<u32>,
}

#[async_trait(?Send)]
impl StorageAdapter for FlakyStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.attempts.set(self.attempts.get() + 1);
        if self.failures.get() > 0 {
            self.failures.set(self.failures.get() - 1);
            return Err(StorageError::Unavailable("quota exceeded".into()));
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }
}

// ============================================================================
// Config file
// ============================================================================

#[test]
fn test_partial_yaml_keeps_defaults() {
    let config = ConfigLoader::parse(
        r#"
ai:
  endpoint: https://api.example.com/analyze
  max_retries: 4
rate_limit:
  max_requests: 3
"#,
    )
    .unwrap();

    assert_eq!(config.ai.endpoint, "https://api.example.com/analyze");
    assert_eq!(config.ai.max_retries, 4);
    assert_eq!(config.ai.timeout_ms, 30000);
    assert_eq!(config.ai.retry_base_delay_ms, 1000);
    assert!(config.ai.api_key.is_none());
    assert_eq!(config.rate_limit.max_requests, 3);
    assert_eq!(config.rate_limit.window_secs, 60);
    assert_eq!(config.credits.daily_allowance, 5);
    assert!(config.storage.dir.is_none());
}

#[test]
fn test_empty_document_is_default() {
    let config = ConfigLoader::parse("{}").unwrap();
    assert_eq!(config, LogTraceConfig::default());
    assert_eq!(config.ai.endpoint, "http://localhost:8787/api/analyze");
}

#[test]
fn test_invalid_endpoint_rejected() {
    let err = ConfigLoader::parse("ai:\n  endpoint: not a url\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));

    let err = ConfigLoader::parse("ai:\n  endpoint: ftp://example.com/analyze\n").unwrap_err();
    match err {
        ConfigError::InvalidEndpoint { reason, .. } => assert!(reason.contains("ftp")),
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_zero_rate_limit_rejected() {
    let err = ConfigLoader::parse("rate_limit:\n  max_requests: 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
    let err = ConfigLoader::parse("rate_limit:\n  window_secs: 0\n").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn test_malformed_yaml() {
    let err = ConfigLoader::parse("ai: [unclosed").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[tokio::test]
async fn test_load_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logtrace.yaml");
    std::fs::write(
        &path,
        "credits:\n  daily_allowance: 9\n  premium: true\nstorage:\n  dir: /tmp/lt\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from(&path).await.unwrap();
    assert_eq!(config.credits.daily_allowance, 9);
    assert!(config.credits.premium);
    assert_eq!(config.storage.resolve_dir(), PathBuf::from("/tmp/lt"));
}

#[tokio::test]
async fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigLoader::load_from(&dir.path().join("absent.yaml"))
        .await
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_api_key_override() {
    let mut config = LogTraceConfig::default();
    config.ai.api_key = Some("from-file".into());

    ConfigLoader::apply_api_key(&mut config, Some("   ".into()));
    assert_eq!(config.ai.api_key.as_deref(), Some("from-file"));

    ConfigLoader::apply_api_key(&mut config, None);
    assert_eq!(config.ai.api_key.as_deref(), Some("from-file"));

    ConfigLoader::apply_api_key(&mut config, Some(" from-env \n".into()));
    assert_eq!(config.ai.api_key.as_deref(), Some("from-env"));
}

#[test]
fn test_storage_dir_defaults_under_logtrace() {
    let dir = StorageConfig::default().resolve_dir();
    assert!(dir.ends_with("logtrace"));
}

// ============================================================================
// Settings
// ============================================================================

#[test]
fn test_settings_defaults() {
    let settings = Settings::default();
    assert_eq!(settings.max_events, 500);
    assert!(settings.auto_save);
    assert_eq!(settings.theme, Theme::Dark);
    assert!(!settings.debug_mode);
    assert!(settings.show_terminal);
    assert!(settings.hover_highlight);
    assert_eq!(settings.terminal_position, TerminalPosition::Bottom);
}

#[test]
fn test_partial_settings_merge_over_defaults() {
    let settings: Settings =
        serde_json::from_str(r#"{"maxEvents": 50, "theme": "light", "terminalPosition": "right"}"#)
            .unwrap();
    assert_eq!(settings.max_events, 50);
    assert_eq!(settings.theme, Theme::Light);
    assert_eq!(settings.terminal_position, TerminalPosition::Right);
    assert!(settings.auto_save);
    assert!(settings.show_terminal);
}

#[tokio::test]
async fn test_settings_save_and_load() {
    let storage = MemoryStorage::new();
    assert_eq!(Settings::load(&storage).await, Settings::default());

    let settings = Settings {
        max_events: 25,
        debug_mode: true,
        theme: Theme::System,
        ..Settings::default()
    };
    assert!(settings.save(&storage, &ManualClock::new(0)).await);

    let raw = storage.peek(SETTINGS_KEY).unwrap();
    assert!(raw.contains("\"maxEvents\":25"));
    assert!(raw.contains("\"debugMode\":true"));
    assert_eq!(Settings::load(&storage).await, settings);
}

#[tokio::test]
async fn test_settings_save_retries_once() {
    let clock = ManualClock::new(0);
    let storage = FlakyStorage::default();
    storage.failures.set(1);

    assert!(Settings::default().save(&storage, &clock).await);
    assert_eq!(storage.attempts.get(), 2);
    assert_eq!(clock.sleeps(), vec![SAVE_RETRY_DELAY_MS]);
    assert!(storage.inner.peek(SETTINGS_KEY).is_some());
}

#[tokio::test]
async fn test_settings_save_gives_up_after_second_failure() {
    let clock = ManualClock::new(0);
    let storage = FlakyStorage::default();
    storage.failures.set(2);

    assert!(!Settings::default().save(&storage, &clock).await);
    assert_eq!(storage.attempts.get(), 2);
    assert!(storage.inner.peek(SETTINGS_KEY).is_none());
}

#[tokio::test]
async fn test_unreadable_settings_fall_back_to_defaults() {
    let storage = MemoryStorage::new();
    storage.set(SETTINGS_KEY, "[1, 2").await.unwrap();
    assert_eq!(Settings::load(&storage).await, Settings::default());
}

// ============================================================================
// File storage
// ============================================================================

#[tokio::test]
async fn test_file_storage_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("nested").join("store"));

    assert_eq!(storage.get("logtrace_events").await.unwrap(), None);

    storage.set("logtrace_events", "[]").await.unwrap();
    assert!(storage.dir().join("logtrace_events.json").exists());
    assert_eq!(
        storage.get("logtrace_events").await.unwrap().as_deref(),
        Some("[]")
    );

    storage.set("logtrace_events", "[1]").await.unwrap();
    assert_eq!(
        storage.get("logtrace_events").await.unwrap().as_deref(),
        Some("[1]")
    );
    assert!(!storage.dir().join("logtrace_events.json.tmp").exists());

    storage.remove("logtrace_events").await.unwrap();
    assert_eq!(storage.get("logtrace_events").await.unwrap(), None);
    storage.remove("logtrace_events").await.unwrap();
}

#[tokio::test]
async fn test_file_storage_rejects_path_keys() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path());

    for key in ["../escape", "a/b", ""] {
        let err = storage.set(key, "x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)), "key {:?}", key);
    }
    assert!(matches!(
        storage.get("..").await.unwrap_err(),
        StorageError::InvalidKey(_)
    ));
}
