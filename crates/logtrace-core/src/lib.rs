pub mod bridge;
pub mod dom;
pub mod extractor;
pub mod session;
pub mod shortcuts;

#[cfg(target_arch = "wasm32")]
pub mod wasm;
#[cfg(target_arch = "wasm32")]
pub mod web_dom;

pub use bridge::{DirectTargeting, FrameBridge, InjectedAgent, OriginMode};
pub use dom::{AgentDocument, DomElement, FocusContext, FrameDocument, FrameHost, ProbeError};
pub use extractor::{extract, extract_with, ExtractOptions};
pub use session::{Capture, SessionState, TargetEvent};
pub use shortcuts::{KeyChord, ShortcutAction, ShortcutMap};

#[cfg(target_arch = "wasm32")]
pub use wasm::*;
