//! The listener agent injected into same-origin frames.
//!
//! It lives in the frame's own realm, owns its listeners and highlight
//! overlay, and talks to the parent only through bridge messages.

use super::is_logtrace_ui;
use crate::dom::{AgentDocument, FocusContext};
use crate::extractor;
use crate::shortcuts::{KeyChord, ShortcutAction, ShortcutMap};
use logtrace_common::protocol::{BridgeMessage, ElementReport};
use logtrace_common::snapshot::{ElementSnapshot, Position};
use tracing::debug;

pub struct InjectedAgent<D: AgentDocument> {
    document: D,
    active: bool,
    debug_chord: KeyChord,
    hovered: Option<ElementReport>,
}

impl<D: AgentDocument> InjectedAgent<D> {
    pub fn new(document: D) -> Self {
        let debug_chord = ShortcutMap::default()
            .chord_for(ShortcutAction::DebugElement)
            .cloned()
            .unwrap_or_else(|| KeyChord::ctrl_shift("D"));
        Self::with_debug_chord(document, debug_chord)
    }

    pub fn with_debug_chord(document: D, debug_chord: KeyChord) -> Self {
        Self {
            document,
            active: false,
            debug_chord,
            hovered: None,
        }
    }

    /// Tells the parent the agent is listening for commands.
    pub fn announce(&self) {
        self.document.post_to_parent(&BridgeMessage::Ready);
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    /// Commands from the parent. Everything except activate/deactivate is
    /// ignored.
    pub fn handle_parent_message(&mut self, message: &BridgeMessage) {
        match message {
            BridgeMessage::Activate => self.activate(),
            BridgeMessage::Deactivate => self.deactivate(),
            other => debug!(kind = other.type_name(), "agent ignores message"),
        }
    }

    fn activate(&mut self) {
        if self.active {
            return;
        }
        self.document.attach_listeners();
        self.active = true;
    }

    /// Removes every listener and the highlight so nothing leaks into the
    /// host page.
    fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.document.detach_listeners();
        self.document.remove_highlight();
        self.active = false;
        self.hovered = None;
    }

    pub fn on_mouse_move(&mut self, target: &D::Element, position: Position) {
        if !self.active || is_logtrace_ui(target) {
            return;
        }
        let snapshot = extractor::extract(target);
        if self.document.hover_highlight() {
            self.document.show_highlight(snapshot.rect);
        } else {
            self.document.remove_highlight();
        }

        let unchanged = self
            .hovered
            .as_ref()
            .is_some_and(|previous| previous.element_info == snapshot);
        let report = ElementReport {
            element_info: snapshot,
            mouse_position: position,
        };
        if !unchanged {
            self.document
                .post_to_parent(&BridgeMessage::ElementHover(report.clone()));
        }
        self.hovered = Some(report);
    }

    /// Returns `true` when the click was consumed and the page must not see
    /// it.
    pub fn on_click(&mut self, target: &D::Element, position: Position) -> bool {
        if !self.active || is_logtrace_ui(target) {
            return false;
        }
        let report = ElementReport {
            element_info: extractor::extract(target),
            mouse_position: position,
        };
        self.document
            .post_to_parent(&BridgeMessage::ElementClick(report.clone()));
        self.hovered = Some(report);
        true
    }

    /// Returns `true` when the keystroke was the debug trigger.
    pub fn on_key_down(&mut self, chord: &KeyChord, focus: FocusContext) -> bool {
        if !self.active || focus.is_editable() || !self.debug_chord.matches(chord) {
            return false;
        }
        match &self.hovered {
            Some(report) => {
                self.document
                    .post_to_parent(&BridgeMessage::DebugElement(report.clone()));
            }
            None => debug!("debug trigger with nothing hovered"),
        }
        true
    }

    pub fn hovered_element(&self) -> Option<&ElementSnapshot> {
        self.hovered.as_ref().map(|r| &r.element_info)
    }
}
