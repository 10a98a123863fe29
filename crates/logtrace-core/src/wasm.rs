use crate::bridge::{DirectTargeting, FrameBridge, OriginMode};
use crate::dom::FocusContext;
use crate::extractor;
use crate::session::{SessionState, TargetEvent};
use crate::shortcuts::{KeyChord, ShortcutAction, ShortcutMap};
use crate::web_dom::{decode_message, to_js, LayerPointer, PageInput, WebFrameHost, WebPage};
use logtrace_common::sanitize;
use logtrace_common::snapshot::{ElementSnapshot, Position};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlIFrameElement};

#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// Extract the context snapshot of a live element.
#[wasm_bindgen(js_name = extractElement)]
pub fn extract_element(element: &Element) -> Result<JsValue, JsValue> {
    to_js(&extractor::extract(element))
}

#[wasm_bindgen(js_name = sanitizeText)]
pub fn sanitize_text(input: &str) -> String {
    sanitize::sanitize(input)
}

/// Returns the validation message, or `undefined` when the prompt is valid.
#[wasm_bindgen(js_name = validatePrompt)]
pub fn validate_prompt(prompt: &str) -> Option<String> {
    sanitize::validate_prompt(prompt).err().map(|e| e.to_string())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TargetNotification<'a> {
    kind: &'static str,
    element: &'a ElementSnapshot,
    position: Position,
}

#[derive(Serialize)]
struct ShortcutNotification {
    kind: &'static str,
    action: ShortcutAction,
}

fn call(callback: &js_sys::Function, value: Result<JsValue, JsValue>) {
    match value {
        Ok(value) => {
            if let Err(err) = callback.call1(&JsValue::NULL, &value) {
                tracing::warn!(?err, "callback threw");
            }
        }
        Err(err) => tracing::warn!(?err, "notification serialization failed"),
    }
}

fn notify(callback: &js_sys::Function, event: TargetEvent<Element>) {
    let kind = match &event {
        TargetEvent::Hover { .. } => "hover",
        TargetEvent::Click { .. } => "click",
        TargetEvent::DebugRequested { .. } => "debug",
    };
    let notification = TargetNotification {
        kind,
        element: &event.capture().snapshot,
        position: event.position(),
    };
    call(callback, to_js(&notification));
}

// ============================================================
// Top-level page
// ============================================================

struct PageState {
    session: SessionState<Element>,
    targeting: DirectTargeting,
    shortcuts: ShortcutMap,
    hover_highlight: bool,
}

struct PageInner {
    state: RefCell<PageState>,
    page: WebPage,
    callback: js_sys::Function,
}

impl PageInner {
    /// Stores the target as the detected element when it moved or was
    /// clicked.
    fn apply(&self, event: &TargetEvent<Element>) {
        let mut state = self.state.borrow_mut();
        if !matches!(event, TargetEvent::DebugRequested { .. }) {
            state
                .session
                .set_detected_element(event.capture().clone(), event.position());
        }
        if state.hover_highlight {
            self.page.show_highlight(event.capture().snapshot.rect);
        }
    }
}

impl PageInput for PageInner {
    fn on_mouse_move(&self, target: &Element, position: Position) {
        let event = {
            let mut state = self.state.borrow_mut();
            let PageState {
                session, targeting, ..
            } = &mut *state;
            targeting.on_mouse_move(session, target, position)
        };
        if let Some(event) = event {
            self.apply(&event);
            notify(&self.callback, event);
        }
    }

    fn on_click(&self, target: &Element, position: Position) -> bool {
        let event = {
            let mut state = self.state.borrow_mut();
            let PageState {
                session, targeting, ..
            } = &mut *state;
            targeting.on_click(session, target, position)
        };
        let Some(event) = event else {
            return false;
        };
        self.apply(&event);
        notify(&self.callback, event);
        true
    }

    /// Debug and hover-pause run here; every resolved action is also
    /// reported so the host UI can react.
    fn on_key_down(&self, chord: &KeyChord, focus: FocusContext) -> bool {
        let (action, event) = {
            let mut state = self.state.borrow_mut();
            let Some(action) = state.shortcuts.resolve(chord, state.session.is_active(), focus) else {
                return false;
            };
            let event = match action {
                ShortcutAction::DebugElement => state.targeting.on_debug_key(&state.session),
                ShortcutAction::ToggleHoverPause => {
                    state.session.toggle_hover_pause();
                    None
                }
                _ => None,
            };
            (action, event)
        };
        if let Some(event) = event {
            notify(&self.callback, event);
        }
        call(
            &self.callback,
            to_js(&ShortcutNotification {
                kind: "shortcut",
                action,
            }),
        );
        true
    }
}

/// Targeting for the page the content script runs in. Listeners are only
/// installed while active.
#[wasm_bindgen]
pub struct LogTracePage {
    inner: Rc<PageInner>,
}

#[wasm_bindgen]
impl LogTracePage {
    #[wasm_bindgen(constructor)]
    pub fn new(on_event: js_sys::Function) -> Result<LogTracePage, JsValue> {
        let page = web_sys::window()
            .and_then(WebPage::from_window)
            .ok_or_else(|| JsValue::from_str("no document to attach to"))?;
        Ok(Self {
            inner: Rc::new(PageInner {
                state: RefCell::new(PageState {
                    session: SessionState::new(),
                    targeting: DirectTargeting::new(),
                    shortcuts: ShortcutMap::default(),
                    hover_highlight: true,
                }),
                page,
                callback: on_event,
            }),
        })
    }

    /// Returns `false` when already active.
    pub fn activate(&self) -> bool {
        if !self.inner.state.borrow_mut().session.activate() {
            return false;
        }
        let weak = Rc::downgrade(&self.inner);
        let input: Weak<dyn PageInput> = weak;
        self.inner.page.attach(input);
        true
    }

    /// Removes every listener and the overlay, and forgets the target.
    pub fn deactivate(&self) -> bool {
        let mut state = self.inner.state.borrow_mut();
        if !state.session.deactivate() {
            return false;
        }
        state.targeting.reset();
        drop(state);
        self.inner.page.detach();
        true
    }

    #[wasm_bindgen(js_name = isActive)]
    pub fn is_active(&self) -> bool {
        self.inner.state.borrow().session.is_active()
    }

    #[wasm_bindgen(js_name = setHoverHighlight)]
    pub fn set_hover_highlight(&self, enabled: bool) {
        self.inner.state.borrow_mut().hover_highlight = enabled;
        if !enabled {
            self.inner.page.remove_highlight();
        }
    }

    /// Returns the new paused state.
    #[wasm_bindgen(js_name = toggleHoverPause)]
    pub fn toggle_hover_pause(&self) -> bool {
        self.inner.state.borrow_mut().session.toggle_hover_pause()
    }

    /// Snapshot of the detected element, or `null`.
    pub fn detected(&self) -> Result<JsValue, JsValue> {
        match self.inner.state.borrow().session.detected() {
            Some(capture) => to_js(&capture.snapshot),
            None => Ok(JsValue::NULL),
        }
    }

    #[wasm_bindgen(js_name = debugCurrent)]
    pub fn debug_current(&self) {
        let event = {
            let state = self.inner.state.borrow();
            state.targeting.on_debug_key(&state.session)
        };
        if let Some(event) = event {
            notify(&self.inner.callback, event);
        }
    }
}

// ============================================================
// Frames
// ============================================================

/// Arms a timer for the pending re-probe. A timer that wakes before a
/// pushed-out deadline re-arms for the remainder.
fn schedule_settle(bridge: Weak<RefCell<FrameBridge<WebFrameHost>>>, delay_ms: u64) {
    let Some(window) = web_sys::window() else {
        return;
    };
    let callback = Closure::once_into_js(move || {
        let Some(bridge) = bridge.upgrade() else {
            return;
        };
        let now = js_sys::Date::now() as u64;
        let remaining = {
            let mut bridge = bridge.borrow_mut();
            if bridge.tick(now) {
                None
            } else {
                bridge.probe_due_in(now)
            }
        };
        if let Some(remaining) = remaining {
            schedule_settle(Rc::downgrade(&bridge), remaining.max(1));
        }
    });
    let delay = i32::try_from(delay_ms).unwrap_or(i32::MAX);
    if let Err(err) =
        window.set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), delay)
    {
        tracing::warn!(?err, "settle timer not armed");
    }
}

/// Debugging bridge for one iframe, driven from the content script.
#[wasm_bindgen]
pub struct LogTraceFrame {
    bridge: Rc<RefCell<FrameBridge<WebFrameHost>>>,
    callback: js_sys::Function,
}

#[wasm_bindgen]
impl LogTraceFrame {
    #[wasm_bindgen(constructor)]
    pub fn new(iframe: HtmlIFrameElement, on_event: js_sys::Function) -> Self {
        let bridge = Rc::new(RefCell::new(FrameBridge::new(WebFrameHost::new(iframe))));

        let weak = Rc::downgrade(&bridge);
        let callback = on_event.clone();
        bridge
            .borrow()
            .host()
            .set_layer_callback(Rc::new(move |pointer: LayerPointer| {
                let Some(bridge) = weak.upgrade() else {
                    return;
                };
                let event = match pointer {
                    LayerPointer::Move(client) => bridge.borrow_mut().on_layer_pointer_move(client),
                    LayerPointer::Click(client) => bridge.borrow_mut().on_layer_click(client),
                };
                if let Some(event) = event {
                    notify(&callback, event);
                }
            }));

        Self {
            bridge,
            callback: on_event,
        }
    }

    pub fn activate(&self) {
        self.bridge.borrow_mut().activate();
    }

    pub fn deactivate(&self) {
        self.bridge.borrow_mut().deactivate();
    }

    /// Call from the iframe's `load` listener. The re-probe runs on its own
    /// timer once the settle delay has passed.
    #[wasm_bindgen(js_name = onLoad)]
    pub fn on_load(&self) {
        let delay = {
            let mut bridge = self.bridge.borrow_mut();
            bridge.on_frame_load(js_sys::Date::now() as u64);
            bridge.settle_delay_ms()
        };
        schedule_settle(Rc::downgrade(&self.bridge), delay);
    }

    /// Runs the pending re-probe if it is due. Returns whether it ran.
    pub fn tick(&self) -> bool {
        self.bridge.borrow_mut().tick(js_sys::Date::now() as u64)
    }

    /// Applies to agents in this frame on their next pointer move.
    #[wasm_bindgen(js_name = setHoverHighlight)]
    pub fn set_hover_highlight(&self, enabled: bool) {
        self.bridge.borrow().host().set_hover_highlight(enabled);
    }

    /// Probe immediately, for frames that finished loading before the
    /// bridge existed.
    pub fn detect(&self) {
        self.bridge.borrow_mut().redetect();
    }

    /// Feed a `message` event whose source is this frame's window. Returns
    /// whether it was a LogTrace bridge message.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&self, data: JsValue) -> bool {
        let Some(message) = decode_message(data) else {
            return false;
        };
        let event = self.bridge.borrow_mut().handle_message::<Element>(message);
        if let Some(event) = event {
            notify(&self.callback, event);
        }
        true
    }

    #[wasm_bindgen(js_name = debugCurrent)]
    pub fn debug_current(&self) {
        let event = self.bridge.borrow().on_layer_debug_key::<Element>();
        if let Some(event) = event {
            notify(&self.callback, event);
        }
    }

    #[wasm_bindgen(js_name = onGeometryChanged)]
    pub fn on_geometry_changed(&self) {
        self.bridge.borrow().on_frame_geometry_changed();
    }

    pub fn mode(&self) -> String {
        match self.bridge.borrow().origin_mode() {
            OriginMode::Unknown => "unknown",
            OriginMode::SameOrigin => "same-origin",
            OriginMode::CrossOrigin => "cross-origin",
        }
        .to_string()
    }

    #[wasm_bindgen(js_name = getVersion)]
    pub fn get_version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }
}
