use super::is_logtrace_ui;
use crate::dom::DomElement;
use crate::session::{Capture, SessionState, TargetEvent};
use logtrace_common::snapshot::{ElementSnapshot, Position};

/// Targeting on the top-level document, where the content script reads the
/// DOM directly. Emits the same events as a frame bridge.
#[derive(Debug, Default)]
pub struct DirectTargeting {
    last_hover: Option<ElementSnapshot>,
}

impl DirectTargeting {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only reports when the hovered element changed.
    pub fn on_mouse_move<E: DomElement>(
        &mut self,
        session: &SessionState<E>,
        target: &E,
        position: Position,
    ) -> Option<TargetEvent<E>> {
        if !session.is_accepting() || is_logtrace_ui(target) {
            return None;
        }
        let capture = Capture::from_node(target.clone());
        if self.last_hover.as_ref() == Some(&capture.snapshot) {
            return None;
        }
        self.last_hover = Some(capture.snapshot.clone());
        Some(TargetEvent::Hover { capture, position })
    }

    /// Clicks still inspect while hover is paused.
    pub fn on_click<E: DomElement>(
        &mut self,
        session: &SessionState<E>,
        target: &E,
        position: Position,
    ) -> Option<TargetEvent<E>> {
        if !session.is_active() || is_logtrace_ui(target) {
            return None;
        }
        let capture = Capture::from_node(target.clone());
        self.last_hover = Some(capture.snapshot.clone());
        Some(TargetEvent::Click { capture, position })
    }

    /// Debug trigger on whatever the session currently targets.
    pub fn on_debug_key<E: DomElement>(
        &self,
        session: &SessionState<E>,
    ) -> Option<TargetEvent<E>> {
        if !session.is_active() {
            return None;
        }
        let capture = session.detected()?.clone();
        let position = session.last_position().unwrap_or_default();
        Some(TargetEvent::DebugRequested { capture, position })
    }

    pub fn reset(&mut self) {
        self.last_hover = None;
    }
}
