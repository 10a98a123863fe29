//! Parent-side bridge for one `<iframe>`.

use super::handshake::HandshakeState;
use super::origin::{probe_origin, OriginMode};
use crate::dom::{FrameDocument, FrameHost};
use crate::session::{Capture, TargetEvent};
use logtrace_common::protocol::{BridgeMessage, ElementReport};
use logtrace_common::snapshot::{ElementSnapshot, Position};
use tracing::{debug, info, warn};

/// Wait after an iframe `load` before re-probing; `contentDocument` can
/// report the previous document for a moment during navigation.
pub const SETTLE_DELAY_MS: u64 = 100;

/// Exactly one mode is established at a time. Leaving a variant tears its
/// resources down before the next one is built.
enum BridgeMode<D> {
    Unknown,
    SameOrigin {
        document: D,
        handshake: HandshakeState,
    },
    CrossOrigin {
        layer_installed: bool,
    },
}

pub struct FrameBridge<H: FrameHost> {
    host: H,
    mode: BridgeMode<H::Document>,
    active: bool,
    pending_probe_at: Option<u64>,
    settle_delay_ms: u64,
    hover: Option<(ElementSnapshot, Position)>,
}

impl<H: FrameHost> FrameBridge<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            mode: BridgeMode::Unknown,
            active: false,
            pending_probe_at: None,
            settle_delay_ms: SETTLE_DELAY_MS,
            hover: None,
        }
    }

    pub fn with_settle_delay(mut self, delay_ms: u64) -> Self {
        self.settle_delay_ms = delay_ms;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn origin_mode(&self) -> OriginMode {
        match self.mode {
            BridgeMode::Unknown => OriginMode::Unknown,
            BridgeMode::SameOrigin { .. } => OriginMode::SameOrigin,
            BridgeMode::CrossOrigin { .. } => OriginMode::CrossOrigin,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn handshake(&self) -> Option<HandshakeState> {
        match &self.mode {
            BridgeMode::SameOrigin { handshake, .. } => Some(*handshake),
            _ => None,
        }
    }

    pub fn capture_layer_installed(&self) -> bool {
        matches!(
            self.mode,
            BridgeMode::CrossOrigin {
                layer_installed: true
            }
        )
    }

    pub fn has_pending_probe(&self) -> bool {
        self.pending_probe_at.is_some()
    }

    pub fn current_hover(&self) -> Option<&ElementSnapshot> {
        self.hover.as_ref().map(|(snapshot, _)| snapshot)
    }

    // ============================================================
    // Activation
    // ============================================================

    /// Idempotent. Before the first probe this only records intent; the
    /// mode applies it once it is established.
    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.active = true;
        info!(mode = ?self.origin_mode(), "frame debugging activated");

        match &mut self.mode {
            BridgeMode::Unknown => debug!("origin not probed yet, activation deferred"),
            BridgeMode::SameOrigin { handshake, .. } => {
                let (next, command) = handshake.on_activate();
                *handshake = next;
                if let Some(command) = command {
                    self.host.post_message(&command);
                }
            }
            BridgeMode::CrossOrigin { layer_installed } => {
                if !*layer_installed {
                    install_capture_layer(&self.host);
                    *layer_installed = true;
                }
            }
        }
    }

    /// Idempotent and safe before the frame has loaded.
    pub fn deactivate(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.hover = None;
        info!(mode = ?self.origin_mode(), "frame debugging deactivated");

        match &mut self.mode {
            BridgeMode::Unknown => {}
            BridgeMode::SameOrigin { handshake, .. } => {
                let (next, command) = handshake.on_deactivate();
                *handshake = next;
                if let Some(command) = command {
                    self.host.post_message(&command);
                }
            }
            BridgeMode::CrossOrigin { layer_installed } => {
                if *layer_installed {
                    remove_capture_layer(&self.host);
                    *layer_installed = false;
                }
            }
        }
    }

    // ============================================================
    // Origin detection
    // ============================================================

    /// The iframe fired `load`. Schedules a re-probe after the settle
    /// delay; a second load before then pushes the deadline out.
    pub fn on_frame_load(&mut self, now_ms: u64) {
        let due = now_ms.saturating_add(self.settle_delay_ms);
        debug!(due, "frame load, re-probe scheduled");
        self.pending_probe_at = Some(due);
    }

    /// Milliseconds until the scheduled re-probe is due, zero once it is.
    pub fn probe_due_in(&self, now_ms: u64) -> Option<u64> {
        self.pending_probe_at.map(|due| due.saturating_sub(now_ms))
    }

    pub fn settle_delay_ms(&self) -> u64 {
        self.settle_delay_ms
    }

    /// Runs a scheduled re-probe once it is due. Returns `true` if a probe
    /// ran.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        match self.pending_probe_at {
            Some(due) if now_ms >= due => {
                self.pending_probe_at = None;
                self.redetect();
                true
            }
            _ => false,
        }
    }

    /// Tears down the current mode, probes and establishes the result.
    pub fn redetect(&mut self) {
        self.teardown();
        let (mode, document) = probe_origin(&self.host);
        match (mode, document) {
            (OriginMode::SameOrigin, Some(document)) => self.establish_same_origin(document),
            _ => self.establish_cross_origin(),
        }
        info!(mode = ?self.origin_mode(), "frame origin detected");
    }

    fn teardown(&mut self) {
        let previous = std::mem::replace(&mut self.mode, BridgeMode::Unknown);
        match previous {
            BridgeMode::Unknown => {}
            BridgeMode::SameOrigin { handshake, .. } => {
                // The old agent usually went away with its document; if it
                // survived it must drop its listeners and highlight.
                if handshake == HandshakeState::ReadyActive {
                    self.host.post_message(&BridgeMessage::Deactivate);
                }
            }
            BridgeMode::CrossOrigin { layer_installed } => {
                if layer_installed {
                    remove_capture_layer(&self.host);
                }
            }
        }
        self.hover = None;
    }

    fn establish_same_origin(&mut self, document: H::Document) {
        if let Err(e) = document.inject_agent() {
            warn!(error = %e, "agent injection failed, using capture layer instead");
            self.establish_cross_origin();
            return;
        }
        self.mode = BridgeMode::SameOrigin {
            document,
            handshake: HandshakeState::AwaitingReady,
        };
    }

    fn establish_cross_origin(&mut self) {
        let layer_installed = if self.active {
            install_capture_layer(&self.host);
            true
        } else {
            false
        };
        self.mode = BridgeMode::CrossOrigin { layer_installed };
    }

    // ============================================================
    // Same-origin channel
    // ============================================================

    /// Dispatches a message posted by the frame's agent.
    pub fn handle_message<E>(&mut self, message: BridgeMessage) -> Option<TargetEvent<E>> {
        let BridgeMode::SameOrigin { handshake, .. } = &mut self.mode else {
            debug!(kind = message.type_name(), "bridge message outside same-origin mode dropped");
            return None;
        };

        match message {
            BridgeMessage::Ready => {
                let (next, command) = handshake.on_ready(self.active);
                *handshake = next;
                if let Some(command) = command {
                    self.host.post_message(&command);
                }
                None
            }
            BridgeMessage::Activate | BridgeMessage::Deactivate => {
                debug!(kind = message.type_name(), "parent-bound command ignored");
                None
            }
            BridgeMessage::ElementHover(report) => {
                if !self.active || *handshake != HandshakeState::ReadyActive {
                    return None;
                }
                let (capture, position) = self.remember(report);
                Some(TargetEvent::Hover { capture, position })
            }
            BridgeMessage::ElementClick(report) => {
                if !self.active || *handshake != HandshakeState::ReadyActive {
                    return None;
                }
                let (capture, position) = self.remember(report);
                Some(TargetEvent::Click { capture, position })
            }
            BridgeMessage::DebugElement(report) => {
                if !self.active || *handshake != HandshakeState::ReadyActive {
                    return None;
                }
                let (capture, position) = self.remember(report);
                Some(TargetEvent::DebugRequested { capture, position })
            }
        }
    }

    fn remember<E>(&mut self, report: ElementReport) -> (Capture<E>, Position) {
        let position = report.mouse_position;
        self.hover = Some((report.element_info.clone(), position));
        (Capture::detached(report.element_info), position)
    }

    // ============================================================
    // Cross-origin capture layer
    // ============================================================

    /// Pointer moved over the capture layer. `client` is in parent client
    /// coordinates.
    ///
    /// The element under the pointer cannot be read across origins, so the
    /// result is a placeholder carrying the frame-local coordinates. Frames
    /// that scroll internally are not corrected for.
    pub fn on_layer_pointer_move<E>(&mut self, client: Position) -> Option<TargetEvent<E>> {
        if !self.active || !self.capture_layer_installed() {
            return None;
        }
        let local = self.host.bounding_rect().to_local(client);
        let snapshot = ElementSnapshot::cross_origin_placeholder(local);
        self.hover = Some((snapshot.clone(), local));
        Some(TargetEvent::Hover {
            capture: Capture::detached(snapshot),
            position: local,
        })
    }

    /// Click on the capture layer promotes the current hover, the same way
    /// a same-origin click does.
    pub fn on_layer_click<E>(&mut self, client: Position) -> Option<TargetEvent<E>> {
        if !self.active || !self.capture_layer_installed() {
            return None;
        }
        let local = self.host.bounding_rect().to_local(client);
        let snapshot = match &self.hover {
            Some((snapshot, _)) => snapshot.clone(),
            None => ElementSnapshot::cross_origin_placeholder(local),
        };
        self.hover = Some((snapshot.clone(), local));
        Some(TargetEvent::Click {
            capture: Capture::detached(snapshot),
            position: local,
        })
    }

    /// Debug trigger while hovering a cross-origin frame.
    pub fn on_layer_debug_key<E>(&self) -> Option<TargetEvent<E>> {
        if !self.active || !self.capture_layer_installed() {
            return None;
        }
        let (snapshot, position) = self.hover.as_ref()?;
        Some(TargetEvent::DebugRequested {
            capture: Capture::detached(snapshot.clone()),
            position: *position,
        })
    }

    /// Keeps the capture layer aligned after the frame moved or resized.
    pub fn on_frame_geometry_changed(&self) {
        if self.capture_layer_installed() {
            self.host.show_capture_layer(self.host.bounding_rect());
        }
    }
}

fn install_capture_layer<H: FrameHost>(host: &H) {
    host.show_capture_layer(host.bounding_rect());
    host.set_pointer_events(false);
    debug!("capture layer installed");
}

fn remove_capture_layer<H: FrameHost>(host: &H) {
    host.remove_capture_layer();
    host.set_pointer_events(true);
    debug!("capture layer removed");
}

impl<H: FrameHost> Drop for FrameBridge<H> {
    fn drop(&mut self) {
        self.deactivate();
    }
}
