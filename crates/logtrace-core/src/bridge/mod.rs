//! Element targeting across the top document and embedded frames.
//!
//! Same-origin frames get an injected agent that reports over
//! `postMessage`; cross-origin frames get a transparent capture layer and
//! placeholder snapshots. Both surface as [`TargetEvent`]s so consumers never
//! branch on the frame's origin.
//!
//! [`TargetEvent`]: crate::session::TargetEvent

pub mod agent;
pub mod direct;
pub mod frame;
pub mod handshake;
pub mod origin;

pub use agent::InjectedAgent;
pub use direct::DirectTargeting;
pub use frame::{FrameBridge, SETTLE_DELAY_MS};
pub use handshake::HandshakeState;
pub use origin::{probe_origin, OriginMode};

use crate::dom::DomElement;

/// Ids of LogTrace's own overlays and panels start with this prefix.
pub const UI_ID_PREFIX: &str = "logtrace-";

/// Whether `element` belongs to LogTrace's own UI (the element or one of its
/// ancestors carries a `logtrace-` id).
pub fn is_logtrace_ui<E: DomElement>(element: &E) -> bool {
    let mut current = Some(element.clone());
    while let Some(node) = current {
        if node
            .id()
            .is_some_and(|id| id.starts_with(UI_ID_PREFIX))
        {
            return true;
        }
        current = node.parent_element();
    }
    false
}
