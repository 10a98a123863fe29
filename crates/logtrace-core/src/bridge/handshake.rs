use logtrace_common::protocol::BridgeMessage;

/// Parent-side view of the agent channel in a same-origin frame.
///
/// ```text
/// AwaitingReady --ready (active)--> ReadyActive
/// AwaitingReady --ready (idle)----> ReadyInactive
/// ReadyInactive --activate--------> ReadyActive
/// ReadyActive   --deactivate------> ReadyInactive
/// ```
///
/// `activate` before `ready` sends nothing; the command goes out once the
/// agent has announced itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingReady,
    ReadyActive,
    ReadyInactive,
}

impl HandshakeState {
    pub fn is_ready(&self) -> bool {
        !matches!(self, HandshakeState::AwaitingReady)
    }

    /// The agent announced itself. It may be a fresh agent after a reload
    /// even if we were already ready, so an active channel re-sends
    /// `activate`.
    pub fn on_ready(self, want_active: bool) -> (Self, Option<BridgeMessage>) {
        if want_active {
            (HandshakeState::ReadyActive, Some(BridgeMessage::Activate))
        } else {
            (HandshakeState::ReadyInactive, None)
        }
    }

    pub fn on_activate(self) -> (Self, Option<BridgeMessage>) {
        match self {
            HandshakeState::AwaitingReady => (self, None),
            HandshakeState::ReadyInactive => {
                (HandshakeState::ReadyActive, Some(BridgeMessage::Activate))
            }
            HandshakeState::ReadyActive => (self, None),
        }
    }

    pub fn on_deactivate(self) -> (Self, Option<BridgeMessage>) {
        match self {
            HandshakeState::ReadyActive => {
                (HandshakeState::ReadyInactive, Some(BridgeMessage::Deactivate))
            }
            other => (other, None),
        }
    }
}
