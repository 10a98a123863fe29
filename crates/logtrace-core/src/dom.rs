//! The slice of the DOM the extractor and the bridge need.
//!
//! On `wasm32` these traits are implemented over `web-sys` (see
//! `web_dom.rs`). Tests implement them with in-memory fakes.

use logtrace_common::protocol::BridgeMessage;
use logtrace_common::snapshot::Rect;
use thiserror::Error;

/// Read-only view of a live element.
///
/// Every accessor degrades instead of failing: an element without a usable
/// `className` (SVG, detached nodes) reports `None` and the extractor falls
/// back to an empty value.
pub trait DomElement: Clone {
    fn tag_name(&self) -> String;
    fn id(&self) -> Option<String>;
    fn class_list(&self) -> Option<Vec<String>>;
    fn text_content(&self) -> Option<String>;
    /// Attributes in document order.
    fn attributes(&self) -> Vec<(String, String)>;
    fn bounding_rect(&self) -> Rect;
    fn parent_element(&self) -> Option<Self>;
    /// Resolved value of a CSS property from the platform's computed style.
    fn computed_style(&self, property: &str) -> Option<String>;
    /// Whether the inline handler property (`onclick`, ...) holds a function.
    fn has_inline_handler(&self, property: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// The browser refused access because the frame is cross-origin.
    #[error("security error: {0}")]
    Security(String),
    /// Anything else, such as the frame being removed mid-probe.
    #[error("probe failed: {0}")]
    Other(String),
}

/// The `<iframe>` element as seen from the parent document.
pub trait FrameHost {
    type Document: FrameDocument;

    /// `iframe.contentDocument`. `Ok(None)` and `Err` both mean the document
    /// is not scriptable from the parent.
    fn content_document(&self) -> Result<Option<Self::Document>, ProbeError>;

    /// The frame's bounding rect in parent client coordinates.
    fn bounding_rect(&self) -> Rect;

    /// Toggles `pointer-events` on the iframe element itself.
    fn set_pointer_events(&self, enabled: bool);

    /// `iframe.contentWindow.postMessage(message, "*")`.
    fn post_message(&self, message: &BridgeMessage);

    /// Places the transparent capture layer over `rect` in the parent
    /// document. Replaces an existing layer.
    fn show_capture_layer(&self, rect: Rect);

    fn remove_capture_layer(&self);
}

/// A same-origin frame document the parent can inject into.
pub trait FrameDocument {
    /// Installs the listener agent inside the frame's realm. Must be safe to
    /// call on a document that already carries an agent.
    fn inject_agent(&self) -> Result<(), ProbeError>;
}

/// The environment an injected agent runs in: the frame's own document.
pub trait AgentDocument {
    type Element: DomElement;

    fn attach_listeners(&self);
    fn detach_listeners(&self);
    fn show_highlight(&self, rect: Rect);
    fn remove_highlight(&self);
    /// Whether hovered elements get an outline. Read on every move, so the
    /// user's setting applies without re-injecting.
    fn hover_highlight(&self) -> bool {
        true
    }
    /// `window.parent.postMessage(message, "*")`.
    fn post_to_parent(&self, message: &BridgeMessage);
}

/// Where keyboard focus currently sits. Shortcuts never fire while the user
/// is typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusContext {
    #[default]
    Document,
    Input,
    TextArea,
    ContentEditable,
}

impl FocusContext {
    pub fn is_editable(&self) -> bool {
        !matches!(self, FocusContext::Document)
    }
}
