#![allow(dead_code)]

use logtrace_common::protocol::BridgeMessage;
use logtrace_common::snapshot::Rect;
use logtrace_core::dom::{AgentDocument, DomElement, FrameDocument, FrameHost, ProbeError};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

// ============================================================================
// Fake elements
// ============================================================================

#[derive(Default)]
pub struct NodeData {
    pub tag: String,
    pub id: Option<String>,
    pub classes: Option<Vec<String>>,
    pub text: Option<String>,
    pub attributes: Vec<(String, String)>,
    pub rect: Rect,
    pub styles: HashMap<String, String>,
    pub inline_handlers: Vec<String>,
    pub parent: RefCell<Weak<NodeData>>,
    pub children: RefCell<Vec<Rc<NodeData>>>,
}

#[derive(Clone)]
pub struct FakeElement(pub Rc<NodeData>);

impl FakeElement {
    pub fn new(tag: &str) -> ElementBuilder {
        ElementBuilder {
            data: NodeData {
                tag: tag.to_uppercase(),
                classes: Some(Vec::new()),
                ..NodeData::default()
            },
        }
    }

    /// Attaches `child` under `self`. The parent keeps the child alive.
    pub fn append(&self, child: &FakeElement) {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child.0.clone());
    }
}

impl std::fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FakeElement({})", self.0.tag)
    }
}

pub struct ElementBuilder {
    data: NodeData,
}

impl ElementBuilder {
    pub fn id(mut self, id: &str) -> Self {
        self.data.id = Some(id.to_string());
        self
    }

    pub fn class(mut self, class: &str) -> Self {
        self.data
            .classes
            .get_or_insert_with(Vec::new)
            .push(class.to_string());
        self
    }

    pub fn no_class_name(mut self) -> Self {
        self.data.classes = None;
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.data.text = Some(text.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.data
            .attributes
            .push((name.to_string(), value.to_string()));
        self
    }

    pub fn rect(mut self, left: f64, top: f64, width: f64, height: f64) -> Self {
        self.data.rect = Rect::new(left, top, width, height);
        self
    }

    pub fn style(mut self, name: &str, value: &str) -> Self {
        self.data.styles.insert(name.to_string(), value.to_string());
        self
    }

    pub fn handler(mut self, property: &str) -> Self {
        self.data.inline_handlers.push(property.to_string());
        self
    }

    pub fn build(self) -> FakeElement {
        FakeElement(Rc::new(self.data))
    }
}

impl DomElement for FakeElement {
    fn tag_name(&self) -> String {
        self.0.tag.clone()
    }

    fn id(&self) -> Option<String> {
        self.0.id.clone()
    }

    fn class_list(&self) -> Option<Vec<String>> {
        self.0.classes.clone()
    }

    fn text_content(&self) -> Option<String> {
        self.0.text.clone()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.0.attributes.clone()
    }

    fn bounding_rect(&self) -> Rect {
        self.0.rect
    }

    fn parent_element(&self) -> Option<Self> {
        self.0.parent.borrow().upgrade().map(FakeElement)
    }

    fn computed_style(&self, property: &str) -> Option<String> {
        self.0.styles.get(property).cloned()
    }

    fn has_inline_handler(&self, property: &str) -> bool {
        self.0.inline_handlers.iter().any(|h| h == property)
    }
}

/// `<body><main id="app"><div class="card shadow">{target}</div></main></body>`
pub fn nested_in_card(target: &FakeElement) -> (FakeElement, FakeElement, FakeElement) {
    let body = FakeElement::new("body").build();
    let main = FakeElement::new("main").id("app").build();
    let card = FakeElement::new("div").class("card").class("shadow").build();
    body.append(&main);
    main.append(&card);
    card.append(target);
    (body, main, card)
}

// ============================================================================
// Fake frame host
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    Probe,
    Inject(u32),
    Post(BridgeMessage),
    ShowLayer(Rect),
    RemoveLayer,
    PointerEvents(bool),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FrameOrigin {
    Same,
    Cross,
    NullDocument,
    Detached,
    InjectionFails,
}

pub struct FrameState {
    pub origin: Cell<FrameOrigin>,
    pub rect: Cell<Rect>,
    pub document_generation: Cell<u32>,
    pub calls: RefCell<Vec<HostCall>>,
    pub layer: Cell<Option<Rect>>,
    pub pointer_events: Cell<bool>,
}

#[derive(Clone)]
pub struct FakeFrameHost(pub Rc<FrameState>);

impl FakeFrameHost {
    pub fn new(origin: FrameOrigin, rect: Rect) -> Self {
        Self(Rc::new(FrameState {
            origin: Cell::new(origin),
            rect: Cell::new(rect),
            document_generation: Cell::new(0),
            calls: RefCell::new(Vec::new()),
            layer: Cell::new(None),
            pointer_events: Cell::new(true),
        }))
    }

    /// Simulates a navigation to a document with the given origin.
    pub fn navigate(&self, origin: FrameOrigin) {
        self.0.origin.set(origin);
        self.0
            .document_generation
            .set(self.0.document_generation.get() + 1);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.0.calls.borrow().clone()
    }

    pub fn clear_calls(&self) {
        self.0.calls.borrow_mut().clear();
    }

    pub fn posted(&self) -> Vec<BridgeMessage> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                HostCall::Post(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    pub fn layer(&self) -> Option<Rect> {
        self.0.layer.get()
    }

    pub fn pointer_events(&self) -> bool {
        self.0.pointer_events.get()
    }
}

pub struct FakeFrameDocument {
    state: Rc<FrameState>,
    generation: u32,
}

impl FrameDocument for FakeFrameDocument {
    fn inject_agent(&self) -> Result<(), ProbeError> {
        if self.state.origin.get() == FrameOrigin::InjectionFails {
            return Err(ProbeError::Other("script blocked by CSP".into()));
        }
        self.state
            .calls
            .borrow_mut()
            .push(HostCall::Inject(self.generation));
        Ok(())
    }
}

impl FrameHost for FakeFrameHost {
    type Document = FakeFrameDocument;

    fn content_document(&self) -> Result<Option<FakeFrameDocument>, ProbeError> {
        self.0.calls.borrow_mut().push(HostCall::Probe);
        let document = FakeFrameDocument {
            state: self.0.clone(),
            generation: self.0.document_generation.get(),
        };
        match self.0.origin.get() {
            FrameOrigin::Same | FrameOrigin::InjectionFails => Ok(Some(document)),
            FrameOrigin::Cross => Err(ProbeError::Security("Blocked a frame".into())),
            FrameOrigin::NullDocument => Ok(None),
            FrameOrigin::Detached => Err(ProbeError::Other("frame removed".into())),
        }
    }

    fn bounding_rect(&self) -> Rect {
        self.0.rect.get()
    }

    fn set_pointer_events(&self, enabled: bool) {
        self.0.pointer_events.set(enabled);
        self.0
            .calls
            .borrow_mut()
            .push(HostCall::PointerEvents(enabled));
    }

    fn post_message(&self, message: &BridgeMessage) {
        self.0
            .calls
            .borrow_mut()
            .push(HostCall::Post(message.clone()));
    }

    fn show_capture_layer(&self, rect: Rect) {
        self.0.layer.set(Some(rect));
        self.0.calls.borrow_mut().push(HostCall::ShowLayer(rect));
    }

    fn remove_capture_layer(&self) {
        self.0.layer.set(None);
        self.0.calls.borrow_mut().push(HostCall::RemoveLayer);
    }
}

// ============================================================================
// Fake agent document
// ============================================================================

#[derive(Default)]
pub struct AgentDocState {
    pub listeners_attached: Cell<bool>,
    pub attach_count: Cell<u32>,
    pub highlight: Cell<Option<Rect>>,
    pub highlight_disabled: Cell<bool>,
    pub to_parent: RefCell<Vec<BridgeMessage>>,
}

#[derive(Clone, Default)]
pub struct FakeAgentDocument(pub Rc<AgentDocState>);

impl FakeAgentDocument {
    pub fn set_hover_highlight(&self, enabled: bool) {
        self.0.highlight_disabled.set(!enabled);
    }

    pub fn sent(&self) -> Vec<BridgeMessage> {
        self.0.to_parent.borrow().clone()
    }
}

impl AgentDocument for FakeAgentDocument {
    type Element = FakeElement;

    fn attach_listeners(&self) {
        self.0.listeners_attached.set(true);
        self.0.attach_count.set(self.0.attach_count.get() + 1);
    }

    fn detach_listeners(&self) {
        self.0.listeners_attached.set(false);
    }

    fn show_highlight(&self, rect: Rect) {
        self.0.highlight.set(Some(rect));
    }

    fn remove_highlight(&self) {
        self.0.highlight.set(None);
    }

    fn hover_highlight(&self) -> bool {
        !self.0.highlight_disabled.get()
    }

    fn post_to_parent(&self, message: &BridgeMessage) {
        self.0.to_parent.borrow_mut().push(message.clone());
    }
}
