//! `web-sys` implementations of the DOM traits.

use crate::bridge::InjectedAgent;
use crate::dom::{AgentDocument, DomElement, FocusContext, FrameDocument, FrameHost, ProbeError};
use crate::shortcuts::KeyChord;
use logtrace_common::protocol::BridgeMessage;
use logtrace_common::snapshot::{Position, Rect};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, HtmlIFrameElement, KeyboardEvent, MessageEvent, MouseEvent, Window};

const HIGHLIGHT_ID: &str = "logtrace-highlight";
const LAYER_ID: &str = "logtrace-frame-layer";
const AGENT_MARKER: &str = "__logtraceAgent";

impl DomElement for Element {
    fn tag_name(&self) -> String {
        Element::tag_name(self)
    }

    fn id(&self) -> Option<String> {
        let id = Element::id(self);
        (!id.is_empty()).then_some(id)
    }

    fn class_list(&self) -> Option<Vec<String>> {
        let list = Element::class_list(self);
        Some((0..list.length()).filter_map(|i| list.item(i)).collect())
    }

    fn text_content(&self) -> Option<String> {
        self.unchecked_ref::<web_sys::Node>().text_content()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        let map = Element::attributes(self);
        (0..map.length())
            .filter_map(|i| map.item(i))
            .map(|attr| (attr.name(), attr.value()))
            .collect()
    }

    fn bounding_rect(&self) -> Rect {
        let rect = self.get_bounding_client_rect();
        Rect::new(rect.left(), rect.top(), rect.width(), rect.height())
    }

    fn parent_element(&self) -> Option<Self> {
        self.unchecked_ref::<web_sys::Node>().parent_element()
    }

    fn computed_style(&self, property: &str) -> Option<String> {
        let window = self.owner_document()?.default_view()?;
        let style = window.get_computed_style(self).ok()??;
        style.get_property_value(property).ok()
    }

    fn has_inline_handler(&self, property: &str) -> bool {
        js_sys::Reflect::get(self, &JsValue::from_str(property))
            .map(|value| value.is_function())
            .unwrap_or(false)
    }
}

pub fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

pub fn decode_message(data: JsValue) -> Option<BridgeMessage> {
    if let Some(raw) = data.as_string() {
        return BridgeMessage::decode(&raw);
    }
    serde_wasm_bindgen::from_value(data).ok()
}

fn focus_context(document: &Document) -> FocusContext {
    let Some(active) = document.active_element() else {
        return FocusContext::Document;
    };
    match active.tag_name().to_lowercase().as_str() {
        "input" => FocusContext::Input,
        "textarea" => FocusContext::TextArea,
        _ if active
            .dyn_ref::<HtmlElement>()
            .is_some_and(|el| el.is_content_editable()) =>
        {
            FocusContext::ContentEditable
        }
        _ => FocusContext::Document,
    }
}

pub fn chord_from_event(event: &KeyboardEvent) -> KeyChord {
    KeyChord {
        key: event.key(),
        ctrl: event.ctrl_key(),
        shift: event.shift_key(),
        alt: event.alt_key(),
        meta: event.meta_key(),
    }
}

fn pointer(event: &MouseEvent) -> Position {
    Position::new(event.client_x() as f64, event.client_y() as f64)
}

fn target_element(event: &MouseEvent) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

fn overlay_style(rect: Rect, position: &str, extra: &str) -> String {
    format!(
        "position:{};left:{}px;top:{}px;width:{}px;height:{}px;z-index:2147483646;{}",
        position, rect.left, rect.top, rect.width, rect.height, extra
    )
}

// ============================================================
// Parent side: the iframe element
// ============================================================

/// Pointer activity on the cross-origin capture layer, in parent client
/// coordinates.
#[derive(Debug, Clone, Copy)]
pub enum LayerPointer {
    Move(Position),
    Click(Position),
}

type LayerCallback = Rc<dyn Fn(LayerPointer)>;

struct LayerHandle {
    element: Element,
    _on_move: Closure<dyn FnMut(MouseEvent)>,
    _on_click: Closure<dyn FnMut(MouseEvent)>,
}

pub struct WebFrameHost {
    iframe: HtmlIFrameElement,
    layer: RefCell<Option<LayerHandle>>,
    on_layer: RefCell<Option<LayerCallback>>,
    hover_highlight: Rc<Cell<bool>>,
}

impl WebFrameHost {
    pub fn new(iframe: HtmlIFrameElement) -> Self {
        Self {
            iframe,
            layer: RefCell::new(None),
            on_layer: RefCell::new(None),
            hover_highlight: Rc::new(Cell::new(true)),
        }
    }

    /// Shared with every agent this host injects.
    pub fn set_hover_highlight(&self, enabled: bool) {
        self.hover_highlight.set(enabled);
    }

    pub fn iframe(&self) -> &HtmlIFrameElement {
        &self.iframe
    }

    pub fn set_layer_callback(&self, callback: LayerCallback) {
        *self.on_layer.borrow_mut() = Some(callback);
    }

    fn parent_document(&self) -> Option<Document> {
        self.iframe.owner_document()
    }

    fn layer_closure(
        &self,
        make: fn(Position) -> LayerPointer,
        swallow: bool,
    ) -> Closure<dyn FnMut(MouseEvent)> {
        let callback = self.on_layer.borrow().clone();
        Closure::wrap(Box::new(move |event: MouseEvent| {
            if swallow {
                event.prevent_default();
                event.stop_propagation();
            }
            if let Some(callback) = &callback {
                callback(make(pointer(&event)));
            }
        }) as Box<dyn FnMut(MouseEvent)>)
    }
}

impl FrameHost for WebFrameHost {
    type Document = WebFrameDocument;

    fn content_document(&self) -> Result<Option<WebFrameDocument>, ProbeError> {
        let value = js_sys::Reflect::get(&self.iframe, &JsValue::from_str("contentDocument"))
            .map_err(|err| {
                let name = js_sys::Reflect::get(&err, &JsValue::from_str("name"))
                    .ok()
                    .and_then(|n| n.as_string())
                    .unwrap_or_default();
                let message = format!("{:?}", err);
                if name == "SecurityError" {
                    ProbeError::Security(message)
                } else {
                    ProbeError::Other(message)
                }
            })?;
        if value.is_null() || value.is_undefined() {
            return Ok(None);
        }
        let document = value
            .dyn_into::<Document>()
            .map_err(|_| ProbeError::Other("contentDocument is not a Document".into()))?;
        let window = self
            .iframe
            .content_window()
            .ok_or_else(|| ProbeError::Other("frame has no window".into()))?;
        Ok(Some(WebFrameDocument {
            document,
            window,
            hover_highlight: self.hover_highlight.clone(),
        }))
    }

    fn bounding_rect(&self) -> Rect {
        DomElement::bounding_rect(self.iframe.unchecked_ref::<Element>())
    }

    fn set_pointer_events(&self, enabled: bool) {
        let value = if enabled { "" } else { "none" };
        let _ = self.iframe.style().set_property("pointer-events", value);
    }

    fn post_message(&self, message: &BridgeMessage) {
        let Some(window) = self.iframe.content_window() else {
            tracing::debug!("frame has no window, message dropped");
            return;
        };
        match to_js(message) {
            Ok(value) => {
                if let Err(err) = window.post_message(&value, "*") {
                    tracing::warn!(?err, "postMessage to frame failed");
                }
            }
            Err(err) => tracing::warn!(?err, "bridge message serialization failed"),
        }
    }

    fn show_capture_layer(&self, rect: Rect) {
        let style = overlay_style(rect, "fixed", "background:transparent;pointer-events:auto;cursor:crosshair;");
        if let Some(handle) = self.layer.borrow().as_ref() {
            let _ = handle.element.set_attribute("style", &style);
            return;
        }
        let Some(document) = self.parent_document() else {
            return;
        };
        let Some(body) = document.body() else {
            return;
        };
        let Ok(element) = document.create_element("div") else {
            return;
        };
        element.set_id(LAYER_ID);
        let _ = element.set_attribute("style", &style);
        let on_move = self.layer_closure(LayerPointer::Move, false);
        let on_click = self.layer_closure(LayerPointer::Click, true);
        let _ = element.add_event_listener_with_callback("mousemove", on_move.as_ref().unchecked_ref());
        let _ = element.add_event_listener_with_callback("click", on_click.as_ref().unchecked_ref());
        if body.append_child(&element).is_ok() {
            *self.layer.borrow_mut() = Some(LayerHandle {
                element,
                _on_move: on_move,
                _on_click: on_click,
            });
        }
    }

    fn remove_capture_layer(&self) {
        if let Some(handle) = self.layer.borrow_mut().take() {
            handle.element.remove();
        }
    }
}

// ============================================================
// Same-origin frame document and its agent
// ============================================================

pub struct WebFrameDocument {
    document: Document,
    window: Window,
    hover_highlight: Rc<Cell<bool>>,
}

impl FrameDocument for WebFrameDocument {
    fn inject_agent(&self) -> Result<(), ProbeError> {
        let marker = JsValue::from_str(AGENT_MARKER);
        if js_sys::Reflect::has(&self.window, &marker).unwrap_or(false) {
            return Ok(());
        }

        let agent = Rc::new_cyclic(|weak: &Weak<RefCell<InjectedAgent<WebAgentDocument>>>| {
            RefCell::new(InjectedAgent::new(WebAgentDocument {
                document: self.document.clone(),
                window: self.window.clone(),
                agent: weak.clone(),
                highlight: RefCell::new(None),
                hover_highlight: self.hover_highlight.clone(),
                listeners: RefCell::new(None),
            }))
        });

        let receiver = agent.clone();
        let on_message = Closure::wrap(Box::new(move |event: MessageEvent| {
            if let Some(message) = decode_message(event.data()) {
                receiver.borrow_mut().handle_parent_message(&message);
            }
        }) as Box<dyn FnMut(MessageEvent)>);
        self.window
            .add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())
            .map_err(|e| ProbeError::Other(format!("{:?}", e)))?;
        // The listener lives as long as the frame's window.
        on_message.forget();

        js_sys::Reflect::set(&self.window, &marker, &JsValue::TRUE)
            .map_err(|e| ProbeError::Other(format!("{:?}", e)))?;
        agent.borrow().announce();
        Ok(())
    }
}

/// Capture-phase document listeners for pointer and keyboard input.
struct InputListeners {
    on_move: Closure<dyn FnMut(MouseEvent)>,
    on_click: Closure<dyn FnMut(MouseEvent)>,
    on_key: Closure<dyn FnMut(KeyboardEvent)>,
}

impl InputListeners {
    fn new(
        document: &Document,
        mut on_move: impl FnMut(&Element, Position) + 'static,
        mut on_click: impl FnMut(&Element, Position) -> bool + 'static,
        mut on_key: impl FnMut(&KeyChord, FocusContext) -> bool + 'static,
    ) -> Self {
        let on_move = Closure::wrap(Box::new(move |event: MouseEvent| {
            if let Some(target) = target_element(&event) {
                on_move(&target, pointer(&event));
            }
        }) as Box<dyn FnMut(MouseEvent)>);

        let on_click = Closure::wrap(Box::new(move |event: MouseEvent| {
            if let Some(target) = target_element(&event) {
                if on_click(&target, pointer(&event)) {
                    event.prevent_default();
                    event.stop_propagation();
                }
            }
        }) as Box<dyn FnMut(MouseEvent)>);

        let focus_document = document.clone();
        let on_key = Closure::wrap(Box::new(move |event: KeyboardEvent| {
            if on_key(&chord_from_event(&event), focus_context(&focus_document)) {
                event.prevent_default();
            }
        }) as Box<dyn FnMut(KeyboardEvent)>);

        let listeners = Self {
            on_move,
            on_click,
            on_key,
        };
        let target = document.unchecked_ref::<web_sys::EventTarget>();
        for (kind, callback) in listeners.callbacks() {
            let _ = target.add_event_listener_with_callback_and_bool(kind, callback, true);
        }
        listeners
    }

    fn callbacks(&self) -> [(&'static str, &js_sys::Function); 3] {
        [
            ("mousemove", self.on_move.as_ref().unchecked_ref()),
            ("click", self.on_click.as_ref().unchecked_ref()),
            ("keydown", self.on_key.as_ref().unchecked_ref()),
        ]
    }

    fn remove(&self, document: &Document) {
        let target = document.unchecked_ref::<web_sys::EventTarget>();
        for (kind, callback) in self.callbacks() {
            let _ = target.remove_event_listener_with_callback_and_bool(kind, callback, true);
        }
    }
}

/// Outline drawn over the hovered element, in page coordinates.
fn show_overlay(document: &Document, window: &Window, slot: &RefCell<Option<Element>>, rect: Rect) {
    let scroll_x = window.scroll_x().unwrap_or(0.0);
    let scroll_y = window.scroll_y().unwrap_or(0.0);
    let page_rect = Rect::new(rect.left + scroll_x, rect.top + scroll_y, rect.width, rect.height);
    let style = overlay_style(
        page_rect,
        "absolute",
        "pointer-events:none;border:2px solid #3b82f6;background:rgba(59,130,246,0.1);box-sizing:border-box;",
    );

    if let Some(existing) = slot.borrow().as_ref() {
        let _ = existing.set_attribute("style", &style);
        return;
    }
    let (Some(body), Ok(element)) = (document.body(), document.create_element("div")) else {
        return;
    };
    element.set_id(HIGHLIGHT_ID);
    let _ = element.set_attribute("style", &style);
    if body.append_child(&element).is_ok() {
        *slot.borrow_mut() = Some(element);
    }
}

fn remove_overlay(slot: &RefCell<Option<Element>>) {
    if let Some(element) = slot.borrow_mut().take() {
        element.remove();
    }
}

pub struct WebAgentDocument {
    document: Document,
    window: Window,
    agent: Weak<RefCell<InjectedAgent<WebAgentDocument>>>,
    highlight: RefCell<Option<Element>>,
    hover_highlight: Rc<Cell<bool>>,
    listeners: RefCell<Option<InputListeners>>,
}

impl AgentDocument for WebAgentDocument {
    type Element = Element;

    fn attach_listeners(&self) {
        if self.listeners.borrow().is_some() {
            return;
        }
        let (on_move, on_click, on_key) = (self.agent.clone(), self.agent.clone(), self.agent.clone());
        let listeners = InputListeners::new(
            &self.document,
            move |target, position| {
                if let Some(agent) = on_move.upgrade() {
                    agent.borrow_mut().on_mouse_move(target, position);
                }
            },
            move |target, position| {
                on_click
                    .upgrade()
                    .is_some_and(|agent| agent.borrow_mut().on_click(target, position))
            },
            move |chord, focus| {
                on_key
                    .upgrade()
                    .is_some_and(|agent| agent.borrow_mut().on_key_down(chord, focus))
            },
        );
        *self.listeners.borrow_mut() = Some(listeners);
    }

    fn detach_listeners(&self) {
        if let Some(listeners) = self.listeners.borrow_mut().take() {
            listeners.remove(&self.document);
        }
    }

    fn show_highlight(&self, rect: Rect) {
        show_overlay(&self.document, &self.window, &self.highlight, rect);
    }

    fn remove_highlight(&self) {
        remove_overlay(&self.highlight);
    }

    fn hover_highlight(&self) -> bool {
        self.hover_highlight.get()
    }

    fn post_to_parent(&self, message: &BridgeMessage) {
        let parent = match self.window.parent() {
            Ok(Some(parent)) => parent,
            _ => return,
        };
        if let Ok(value) = to_js(message) {
            let _ = parent.post_message(&value, "*");
        }
    }
}

// ============================================================
// Top-level page
// ============================================================

/// Input from the top-level document, delivered by [`WebPage`].
pub trait PageInput {
    fn on_mouse_move(&self, target: &Element, position: Position);
    /// Returns `true` when the click was consumed.
    fn on_click(&self, target: &Element, position: Position) -> bool;
    /// Returns `true` when the keystroke was handled.
    fn on_key_down(&self, chord: &KeyChord, focus: FocusContext) -> bool;
}

/// The content script's own document: listeners and the hover overlay.
pub struct WebPage {
    document: Document,
    window: Window,
    highlight: RefCell<Option<Element>>,
    listeners: RefCell<Option<InputListeners>>,
    // Detaching can happen inside one of the listeners (a shortcut that
    // ends the session), so the closures outlive their removal.
    retired: RefCell<Option<InputListeners>>,
}

impl WebPage {
    pub fn from_window(window: Window) -> Option<Self> {
        let document = window.document()?;
        Some(Self {
            document,
            window,
            highlight: RefCell::new(None),
            listeners: RefCell::new(None),
            retired: RefCell::new(None),
        })
    }

    pub fn attach(&self, input: Weak<dyn PageInput>) {
        if self.listeners.borrow().is_some() {
            return;
        }
        let (on_move, on_click, on_key) = (input.clone(), input.clone(), input);
        let listeners = InputListeners::new(
            &self.document,
            move |target, position| {
                if let Some(input) = on_move.upgrade() {
                    input.on_mouse_move(target, position);
                }
            },
            move |target, position| {
                on_click
                    .upgrade()
                    .is_some_and(|input| input.on_click(target, position))
            },
            move |chord, focus| {
                on_key
                    .upgrade()
                    .is_some_and(|input| input.on_key_down(chord, focus))
            },
        );
        *self.listeners.borrow_mut() = Some(listeners);
    }

    /// Removes the listeners and the overlay.
    pub fn detach(&self) {
        if let Some(listeners) = self.listeners.borrow_mut().take() {
            listeners.remove(&self.document);
            *self.retired.borrow_mut() = Some(listeners);
        }
        self.remove_highlight();
    }

    pub fn show_highlight(&self, rect: Rect) {
        show_overlay(&self.document, &self.window, &self.highlight, rect);
    }

    pub fn remove_highlight(&self) {
        remove_overlay(&self.highlight);
    }
}
