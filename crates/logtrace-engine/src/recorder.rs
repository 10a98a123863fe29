//! The interaction event log.
//!
//! In memory the log is authoritative and newest-first. Persistence trails
//! it through a single debounce deadline: every `record` pushes the deadline
//! out, and the host loop calls [`EventRecorder::flush_due`] to write once it
//! has passed.

use crate::clock::Clock;
use crate::config::Settings;
use crate::storage::{self, EVENTS_KEY, StorageAdapter};
use chrono::SecondsFormat;
use logtrace_common::event::{LogEvent, NewEvent};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const AUTOSAVE_DEBOUNCE_MS: u64 = 1000;
pub use crate::storage::SAVE_RETRY_DELAY_MS;

/// A downloadable snapshot of the log.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportBlob {
    pub filename: String,
    pub contents: String,
}

impl ExportBlob {
    pub fn events(&self) -> Result<Vec<LogEvent>, serde_json::Error> {
        serde_json::from_str(&self.contents)
    }
}

struct RecorderState {
    events: VecDeque<LogEvent>,
    max_events: usize,
    auto_save: bool,
    save_due_at: Option<u64>,
}

/// Cheap-to-clone handle; clones share one log.
#[derive(Clone)]
pub struct EventRecorder {
    state: Rc<RefCell<RecorderState>>,
    storage: Rc<dyn StorageAdapter>,
    clock: Rc<dyn Clock>,
}

impl fmt::Debug for EventRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("EventRecorder")
            .field("events", &state.events.len())
            .field("max_events", &state.max_events)
            .field("auto_save", &state.auto_save)
            .field("save_due_at", &state.save_due_at)
            .finish()
    }
}

impl EventRecorder {
    pub fn new(
        storage: Rc<dyn StorageAdapter>,
        clock: Rc<dyn Clock>,
        max_events: usize,
        auto_save: bool,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(RecorderState {
                events: VecDeque::new(),
                max_events: max_events.max(1),
                auto_save,
                save_due_at: None,
            })),
            storage,
            clock,
        }
    }

    pub fn from_settings(
        storage: Rc<dyn StorageAdapter>,
        clock: Rc<dyn Clock>,
        settings: &Settings,
    ) -> Self {
        Self::new(storage, clock, settings.max_events, settings.auto_save)
    }

    /// Replaces the in-memory log with the persisted one. A missing or
    /// unreadable log starts empty. Returns the number of events restored.
    pub async fn load(&self) -> usize {
        let restored = match self.storage.get(EVENTS_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<LogEvent>>(&raw) {
                Ok(events) => events,
                Err(e) => {
                    warn!(error = %e, "persisted events unreadable, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "event load failed, starting empty");
                Vec::new()
            }
        };

        let mut state = self.state.borrow_mut();
        state.events = restored.into();
        let cap = state.max_events;
        state.events.truncate(cap);
        debug!(count = state.events.len(), "events loaded");
        state.events.len()
    }

    /// Stamps the event with a fresh id and the capture time, and puts it at
    /// the front of the log.
    pub fn record(&self, event: NewEvent) -> LogEvent {
        let timestamp = self
            .clock
            .now_utc()
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let event = event.into_event(Uuid::new_v4().to_string(), timestamp);

        let mut state = self.state.borrow_mut();
        state.events.push_front(event.clone());
        let cap = state.max_events;
        state.events.truncate(cap);
        if state.auto_save {
            state.save_due_at = Some(self.clock.now_ms() + AUTOSAVE_DEBOUNCE_MS);
        }
        debug!(kind = %event.event_type, id = %event.id, "event recorded");
        event
    }

    /// Newest first.
    pub fn events(&self) -> Vec<LogEvent> {
        self.state.borrow().events.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.borrow().events.is_empty()
    }

    pub fn max_events(&self) -> usize {
        self.state.borrow().max_events
    }

    /// Shrinking the cap drops the oldest events right away.
    pub fn set_max_events(&self, max_events: usize) {
        let mut state = self.state.borrow_mut();
        state.max_events = max_events.max(1);
        let cap = state.max_events;
        state.events.truncate(cap);
    }

    pub fn auto_save(&self) -> bool {
        self.state.borrow().auto_save
    }

    /// Turning auto-save off also drops a pending save.
    pub fn set_auto_save(&self, enabled: bool) {
        let mut state = self.state.borrow_mut();
        state.auto_save = enabled;
        if !enabled {
            state.save_due_at = None;
        }
    }

    pub fn pending_save_at(&self) -> Option<u64> {
        self.state.borrow().save_due_at
    }

    /// Persists if the debounce deadline has passed. Returns whether a save
    /// was attempted.
    pub async fn flush_due(&self) -> bool {
        let now = self.clock.now_ms();
        let due = {
            let mut state = self.state.borrow_mut();
            match state.save_due_at {
                Some(at) if now >= at => {
                    state.save_due_at = None;
                    true
                }
                _ => false,
            }
        };
        if due {
            self.persist().await;
        }
        due
    }

    /// Persists now, regardless of the deadline or the auto-save setting.
    pub async fn flush(&self) -> bool {
        self.state.borrow_mut().save_due_at = None;
        self.persist().await
    }

    /// Empties the log. With auto-save on the empty log is written
    /// immediately so a reload does not bring the events back.
    pub async fn clear(&self) {
        let auto_save = {
            let mut state = self.state.borrow_mut();
            state.events.clear();
            state.save_due_at = None;
            state.auto_save
        };
        info!("event log cleared");
        if auto_save {
            self.persist().await;
        }
    }

    /// `logtrace-export-<epoch-ms>.json`
    pub fn export(&self) -> Result<ExportBlob, serde_json::Error> {
        let filename = format!("logtrace-export-{}.json", self.clock.now_ms());
        self.export_as(filename)
    }

    /// `logtrace-<YYYY-MM-DD>.json`
    pub fn export_dated(&self) -> Result<ExportBlob, serde_json::Error> {
        let filename = format!("logtrace-{}.json", self.clock.now_utc().format("%Y-%m-%d"));
        self.export_as(filename)
    }

    fn export_as(&self, filename: String) -> Result<ExportBlob, serde_json::Error> {
        let contents = serde_json::to_string_pretty(&self.events())?;
        Ok(ExportBlob { filename, contents })
    }

    /// One retry after [`SAVE_RETRY_DELAY_MS`]; a second failure is only
    /// logged.
    async fn persist(&self) -> bool {
        let payload = match serde_json::to_string(&self.events()) {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "event log serialization failed");
                return false;
            }
        };
        storage::save_with_retry(self.storage.as_ref(), self.clock.as_ref(), EVENTS_KEY, &payload)
            .await
    }

    pub(crate) fn storage(&self) -> &Rc<dyn StorageAdapter> {
        &self.storage
    }

    pub(crate) fn clock(&self) -> &Rc<dyn Clock> {
        &self.clock
    }
}
