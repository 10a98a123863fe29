//! The page-level session controller.
//!
//! Owns the session state and the open panels, turns target events and
//! shortcuts into recorded events, and answers the extension's action
//! envelope. Every surface (direct page input, frame agents, the capture
//! layer, shortcuts) ends up in [`SessionController::on_target_event`].
//! The only awaits are the AI call in [`SessionController::run_debug`] and
//! the settings save.

use crate::config::Settings;
use crate::orchestrator::{DebugContext, DebugError, DebugOrchestrator};
use crate::recorder::EventRecorder;
use logtrace_common::event::{EventType, NewEvent};
use logtrace_common::protocol::{ExtensionRequest, ExtensionResponse};
use logtrace_common::snapshot::{ElementSnapshot, Position};
use logtrace_core::bridge::DirectTargeting;
use logtrace_core::dom::{DomElement, FocusContext};
use logtrace_core::session::{SessionState, TargetEvent};
use logtrace_core::shortcuts::{KeyChord, ShortcutAction, ShortcutMap};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Inspector,
    DebugModal,
    Terminal,
    QuickActions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Move,
    Click,
    Tap,
}

impl PointerKind {
    fn event_type(self) -> EventType {
        match self {
            PointerKind::Move => EventType::Move,
            PointerKind::Click => EventType::Click,
            PointerKind::Tap => EventType::Tap,
        }
    }
}

pub struct SessionController<E: DomElement> {
    session: SessionState<E>,
    settings: Settings,
    recorder: EventRecorder,
    orchestrator: DebugOrchestrator,
    shortcuts: ShortcutMap,
    panels: Vec<Panel>,
    tracing: bool,
    last_hover: Option<ElementSnapshot>,
    targeting: DirectTargeting,
}

impl<E: DomElement> SessionController<E> {
    pub fn new(settings: Settings, recorder: EventRecorder, orchestrator: DebugOrchestrator) -> Self {
        let mut controller = Self {
            session: SessionState::new(),
            settings,
            recorder,
            orchestrator,
            shortcuts: ShortcutMap::default(),
            panels: Vec::new(),
            tracing: false,
            last_hover: None,
            targeting: DirectTargeting::new(),
        };
        if controller.settings.debug_mode {
            controller.activate();
        }
        controller
    }

    pub fn with_shortcuts(mut self, shortcuts: ShortcutMap) -> Self {
        self.shortcuts = shortcuts;
        self
    }

    pub fn session(&self) -> &SessionState<E> {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    pub fn is_active(&self) -> bool {
        self.session.is_active()
    }

    pub fn is_tracing(&self) -> bool {
        self.tracing
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn top_panel(&self) -> Option<Panel> {
        self.panels.last().copied()
    }

    pub fn is_open(&self, panel: Panel) -> bool {
        self.panels.contains(&panel)
    }

    // ============================================================
    // Activation
    // ============================================================

    pub fn activate(&mut self) -> bool {
        if !self.session.activate() {
            return false;
        }
        if self.settings.show_terminal {
            self.open(Panel::Terminal);
        }
        info!("debugging activated");
        true
    }

    /// Closes every panel and stops tracing.
    pub fn deactivate(&mut self) -> bool {
        if !self.session.deactivate() {
            return false;
        }
        self.panels.clear();
        self.tracing = false;
        self.last_hover = None;
        self.targeting.reset();
        info!("debugging deactivated");
        true
    }

    /// Applies changed settings and persists them. The recorder picks up
    /// the cap and auto-save flag immediately. Returns whether the save
    /// succeeded; the new settings stay in effect either way.
    pub async fn update_settings(&mut self, settings: Settings) -> bool {
        self.recorder.set_max_events(settings.max_events);
        self.recorder.set_auto_save(settings.auto_save);
        self.settings = settings;
        let storage = self.recorder.storage().clone();
        let clock = self.recorder.clock().clone();
        self.settings.save(storage.as_ref(), clock.as_ref()).await
    }

    // ============================================================
    // Panels
    // ============================================================

    /// Opening an already open panel brings it to the top.
    pub fn open(&mut self, panel: Panel) {
        self.panels.retain(|p| *p != panel);
        self.panels.push(panel);
    }

    pub fn close(&mut self, panel: Panel) -> bool {
        let before = self.panels.len();
        self.panels.retain(|p| *p != panel);
        self.panels.len() != before
    }

    fn toggle(&mut self, panel: Panel) {
        if !self.close(panel) {
            self.open(panel);
        }
    }

    // ============================================================
    // Targeting
    // ============================================================

    pub fn on_target_event(&mut self, event: TargetEvent<E>) {
        if !self.session.is_active() {
            return;
        }
        match event {
            TargetEvent::Hover { capture, position } => {
                if !self.session.is_accepting() {
                    return;
                }
                let changed = self.last_hover.as_ref() != Some(&capture.snapshot);
                if changed && self.tracing {
                    self.recorder.record(
                        NewEvent::new(EventType::Move)
                            .at(position)
                            .with_element(capture.snapshot.summary()),
                    );
                }
                self.last_hover = Some(capture.snapshot.clone());
                self.session.set_detected_element(capture, position);
            }
            TargetEvent::Click { capture, position } => {
                self.recorder.record(
                    NewEvent::new(EventType::Inspect)
                        .at(position)
                        .with_element(capture.snapshot.summary()),
                );
                self.last_hover = Some(capture.snapshot.clone());
                self.session.set_detected_element(capture, position);
                self.open(Panel::Inspector);
            }
            TargetEvent::DebugRequested { capture, position } => {
                self.recorder.record(
                    NewEvent::new(EventType::Debug)
                        .at(position)
                        .with_element(capture.snapshot.summary()),
                );
                self.session.set_detected_element(capture, position);
                self.open(Panel::DebugModal);
            }
        }
    }

    /// Pointer move over the top-level document.
    pub fn on_pointer_move(&mut self, target: &E, position: Position) {
        if let Some(event) = self.targeting.on_mouse_move(&self.session, target, position) {
            self.on_target_event(event);
        }
    }

    /// Click on the top-level document. Returns `true` when the click was
    /// consumed and the page must not see it.
    pub fn on_pointer_click(&mut self, target: &E, position: Position) -> bool {
        match self.targeting.on_click(&self.session, target, position) {
            Some(event) => {
                self.on_target_event(event);
                true
            }
            None => false,
        }
    }

    /// Raw pointer activity while tracing is on.
    pub fn trace_pointer(&mut self, kind: PointerKind, position: Position) {
        if !self.tracing || !self.session.is_active() {
            return;
        }
        let mut event = NewEvent::new(kind.event_type()).at(position);
        if let Some(capture) = self.session.detected() {
            event = event.with_element(capture.snapshot.summary());
        }
        self.recorder.record(event);
    }

    pub fn toggle_tracing(&mut self) -> bool {
        if self.session.is_active() {
            self.tracing = !self.tracing;
            info!(tracing = self.tracing, "tracing toggled");
        }
        self.tracing
    }

    // ============================================================
    // Shortcuts
    // ============================================================

    /// Resolves and applies a keystroke. Returns the action that ran.
    pub fn on_key(&mut self, chord: &KeyChord, focus: FocusContext) -> Option<ShortcutAction> {
        let action = self
            .shortcuts
            .resolve(chord, self.session.is_active(), focus)?;
        debug!(?action, "shortcut");
        match action {
            ShortcutAction::ToggleTracing => {
                self.toggle_tracing();
            }
            ShortcutAction::EndSession => {
                self.deactivate();
            }
            ShortcutAction::ToggleTerminal => self.toggle(Panel::Terminal),
            ShortcutAction::DebugElement => {
                if let Some(event) = self.targeting.on_debug_key(&self.session) {
                    self.on_target_event(event);
                }
            }
            ShortcutAction::ToggleHoverPause => {
                self.session.toggle_hover_pause();
            }
            ShortcutAction::QuickActions => self.toggle(Panel::QuickActions),
            ShortcutAction::Escape => self.escape(),
        }
        Some(action)
    }

    /// Closes the topmost panel, or deactivates when none is open.
    pub fn escape(&mut self) {
        if self.panels.pop().is_none() {
            self.deactivate();
        }
    }

    // ============================================================
    // AI debugging
    // ============================================================

    /// Snapshot of everything the request needs, read now. A live node is
    /// re-read so computed styles reflect the current page.
    pub fn prepare_debug(&self, prompt: &str) -> DebugContext {
        let element = self
            .session
            .detected()
            .map(|capture| capture.reread().unwrap_or_else(|| capture.snapshot.clone()));
        DebugContext {
            prompt: prompt.to_string(),
            element,
            position: self.session.last_position().unwrap_or_default(),
            events: self.recorder.events(),
            settings: self.settings.clone(),
        }
    }

    pub async fn run_debug(&self, prompt: &str) -> Result<String, DebugError> {
        let context = self.prepare_debug(prompt);
        self.orchestrator.analyze_context(&context).await
    }

    // ============================================================
    // Extension envelope
    // ============================================================

    pub fn handle_extension_request(&mut self, request: ExtensionRequest) -> ExtensionResponse {
        match request {
            ExtensionRequest::Activate => {
                self.activate();
                ExtensionResponse::ok()
            }
            ExtensionRequest::Deactivate => {
                self.deactivate();
                ExtensionResponse::ok()
            }
            ExtensionRequest::CheckStatus => {
                let mut data = Map::new();
                data.insert("isActive".into(), json!(self.session.is_active()));
                data.insert("isTracing".into(), json!(self.tracing));
                ExtensionResponse::ok_with(data)
            }
            ExtensionRequest::GetSettings => match serde_json::to_value(&self.settings) {
                Ok(settings) => {
                    let mut data = Map::new();
                    data.insert("settings".into(), settings);
                    ExtensionResponse::ok_with(data)
                }
                Err(e) => ExtensionResponse::error(format!("Settings unavailable: {}", e)),
            },
        }
    }

    /// Raw `chrome.runtime` message. Unknown actions get an `{error}` reply.
    pub fn handle_extension_message(&mut self, message: Value) -> ExtensionResponse {
        match serde_json::from_value::<ExtensionRequest>(message) {
            Ok(request) => self.handle_extension_request(request),
            Err(e) => {
                debug!(error = %e, "unrecognised extension message");
                ExtensionResponse::error("Unknown action")
            }
        }
    }
}
