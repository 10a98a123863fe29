use crate::dom::DomElement;
use crate::extractor;
use logtrace_common::snapshot::{ElementSnapshot, Position};

/// A snapshot plus an optional handle to the live node it came from.
///
/// The handle is only meaningful inside the task that captured it and only
/// for same-document captures; re-read through it for things like computed
/// styles at prompt-build time, never after a navigation. Frame-bridged
/// captures carry no node at all.
#[derive(Debug, Clone)]
pub struct Capture<E> {
    pub snapshot: ElementSnapshot,
    pub node: Option<E>,
}

impl<E> Capture<E> {
    /// Capture of an element that lives in another realm.
    pub fn detached(snapshot: ElementSnapshot) -> Self {
        Self {
            snapshot,
            node: None,
        }
    }
}

impl<E: DomElement> Capture<E> {
    pub fn from_node(node: E) -> Self {
        Self {
            snapshot: extractor::extract(&node),
            node: Some(node),
        }
    }

    /// Fresh extraction through the live handle, if there is one.
    pub fn reread(&self) -> Option<ElementSnapshot> {
        self.node.as_ref().map(extractor::extract)
    }
}

/// What targeting reports downstream, the same for every surface.
#[derive(Debug, Clone)]
pub enum TargetEvent<E> {
    Hover { capture: Capture<E>, position: Position },
    Click { capture: Capture<E>, position: Position },
    DebugRequested { capture: Capture<E>, position: Position },
}

impl<E> TargetEvent<E> {
    pub fn capture(&self) -> &Capture<E> {
        match self {
            TargetEvent::Hover { capture, .. }
            | TargetEvent::Click { capture, .. }
            | TargetEvent::DebugRequested { capture, .. } => capture,
        }
    }

    pub fn position(&self) -> Position {
        match self {
            TargetEvent::Hover { position, .. }
            | TargetEvent::Click { position, .. }
            | TargetEvent::DebugRequested { position, .. } => *position,
        }
    }
}

/// The single "is debugging active / what is targeted" state of a page.
#[derive(Debug)]
pub struct SessionState<E> {
    active: bool,
    hover_paused: bool,
    detected: Option<Capture<E>>,
    last_position: Option<Position>,
}

impl<E> Default for SessionState<E> {
    fn default() -> Self {
        Self {
            active: false,
            hover_paused: false,
            detected: None,
            last_position: None,
        }
    }
}

impl<E: Clone> SessionState<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when already active.
    pub fn activate(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.hover_paused = false;
        true
    }

    /// Returns `false` when already inactive. Drops the detected element.
    pub fn deactivate(&mut self) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.hover_paused = false;
        self.detected = None;
        self.last_position = None;
        true
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_hover_paused(&self) -> bool {
        self.hover_paused
    }

    /// Handlers call this first and bail out when it is `false`.
    pub fn is_accepting(&self) -> bool {
        self.active && !self.hover_paused
    }

    pub fn pause_hover(&mut self) {
        if self.active {
            self.hover_paused = true;
        }
    }

    pub fn resume_hover(&mut self) {
        self.hover_paused = false;
    }

    /// Returns the new paused state.
    pub fn toggle_hover_pause(&mut self) -> bool {
        if self.hover_paused {
            self.resume_hover();
        } else {
            self.pause_hover();
        }
        self.hover_paused
    }

    /// Replaces the detected element. Ignored while inactive.
    pub fn set_detected_element(&mut self, capture: Capture<E>, position: Position) {
        if !self.active {
            return;
        }
        self.detected = Some(capture);
        self.last_position = Some(position);
    }

    pub fn detected(&self) -> Option<&Capture<E>> {
        self.detected.as_ref()
    }

    pub fn last_position(&self) -> Option<Position> {
        self.last_position
    }
}
