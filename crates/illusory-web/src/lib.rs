//! Browser host for illusory transitions.
//!
//! [`WebDocument`] implements [`Document`] on top of `web-sys`. Elements are
//! addressed through a registry that hands out a [`NodeId`] per DOM element;
//! listeners, timers and animation frames are `gloo` handles that unregister
//! when dropped.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use gloo::events::EventListener;
use gloo::render::{AnimationFrame, request_animation_frame};
use gloo::timers::callback::Timeout;
use illusory_core::document::{
    Document, DomEvent, EventKind, FrameId, Listener, ListenerId, NodeId, Task, TimerId,
};
use illusory_core::{Options, Rect, TransitionOptions, illusory};
use thiserror::Error;
use tracing::{debug, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    AnimationEvent, CssStyleDeclaration, Element, Event, EventTarget, HtmlElement, Node,
    SvgElement, TransitionEvent, Window,
};

#[derive(Debug, Error)]
pub enum WebError {
    #[error("no global window")]
    NoWindow,
    #[error("window has no document")]
    NoDocument,
    #[error("document has no body")]
    NoBody,
}

#[derive(Default)]
struct Registry {
    elements: HashMap<NodeId, Element>,
    next: u64,
}

impl Registry {
    fn id_of(&mut self, element: &Element) -> NodeId {
        let known = self
            .elements
            .iter()
            .find_map(|(id, known)| (known == element).then_some(*id));
        if let Some(id) = known {
            return id;
        }
        self.next += 1;
        let id = NodeId(self.next);
        self.elements.insert(id, element.clone());
        id
    }

    fn get(&self, id: NodeId) -> Option<Element> {
        self.elements.get(&id).cloned()
    }

    /// Drop ids for `root` and everything inside it.
    fn forget_subtree(&mut self, root: &Element) {
        self.elements.retain(|_, element| {
            let node: &Node = element;
            !root.contains(Some(node))
        });
    }
}

/// [`Document`] backed by the page's DOM.
pub struct WebDocument {
    window: Window,
    root: NodeId,
    registry: Rc<RefCell<Registry>>,
    listeners: RefCell<HashMap<ListenerId, EventListener>>,
    timers: Rc<RefCell<HashMap<TimerId, Timeout>>>,
    frames: Rc<RefCell<HashMap<FrameId, AnimationFrame>>>,
    next_id: Cell<u64>,
}

impl WebDocument {
    /// Use `document.body` as the root.
    pub fn new() -> Result<Rc<Self>, WebError> {
        let window = web_sys::window().ok_or(WebError::NoWindow)?;
        let document = window.document().ok_or(WebError::NoDocument)?;
        let body = document.body().ok_or(WebError::NoBody)?;

        let mut registry = Registry::default();
        let root = registry.id_of(&body);
        Ok(Rc::new(Self {
            window,
            root,
            registry: Rc::new(RefCell::new(registry)),
            listeners: RefCell::new(HashMap::new()),
            timers: Rc::new(RefCell::new(HashMap::new())),
            frames: Rc::new(RefCell::new(HashMap::new())),
            next_id: Cell::new(0),
        }))
    }

    /// Id for a DOM element, registering it on first use.
    pub fn node_id(&self, element: &Element) -> NodeId {
        self.registry.borrow_mut().id_of(element)
    }

    pub fn element(&self, node: NodeId) -> Option<Element> {
        self.registry.borrow().get(node)
    }

    fn next_id(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    fn register(&self, node: Node) -> Option<NodeId> {
        node.dyn_into::<Element>()
            .ok()
            .map(|element| self.node_id(&element))
    }

    fn computed(&self, element: &Element) -> Option<CssStyleDeclaration> {
        self.window.get_computed_style(element).ok().flatten()
    }
}

fn inline_declaration(element: &Element) -> Option<CssStyleDeclaration> {
    if let Some(html) = element.dyn_ref::<HtmlElement>() {
        return Some(html.style());
    }
    element.dyn_ref::<SvgElement>().map(|svg| svg.style())
}

fn to_dom_event(
    registry: &Weak<RefCell<Registry>>,
    kind: EventKind,
    fallback: NodeId,
    event: &Event,
) -> DomEvent {
    let target = event
        .target()
        .and_then(|target| target.dyn_into::<Element>().ok())
        .and_then(|element| {
            registry
                .upgrade()
                .map(|registry| registry.borrow_mut().id_of(&element))
        })
        .unwrap_or(fallback);
    let property = match kind {
        EventKind::TransitionEnd => event
            .dyn_ref::<TransitionEvent>()
            .map(|event| event.property_name()),
        EventKind::AnimationEnd => event
            .dyn_ref::<AnimationEvent>()
            .map(|event| event.animation_name()),
        EventKind::Scroll => None,
    };
    DomEvent {
        kind,
        target,
        property,
    }
}

impl Document for WebDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.element(node)
            .map(|element| element.tag_name())
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.element(node)?.parent_element()?;
        Some(self.node_id(&parent))
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        let Some(element) = self.element(node) else {
            return Vec::new();
        };
        let children = element.children();
        (0..children.length())
            .filter_map(|index| children.item(index))
            .map(|child| self.node_id(&child))
            .collect()
    }

    fn clone_node(&self, node: NodeId, deep: bool) -> NodeId {
        let copy = self
            .element(node)
            .and_then(|element| element.clone_node_with_deep(deep).ok())
            .and_then(|copy| self.register(copy));
        copy.unwrap_or_else(|| {
            warn!(?node, "clone failed; using an unregistered node");
            NodeId(0)
        })
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        let (Some(parent), Some(child)) = (self.element(parent), self.element(child)) else {
            return;
        };
        if let Err(err) = parent.append_child(&child) {
            warn!(?err, "append_child failed");
        }
    }

    fn remove(&self, node: NodeId) {
        if let Some(element) = self.element(node) {
            element.remove();
            self.registry.borrow_mut().forget_subtree(&element);
        }
    }

    fn attribute_names(&self, node: NodeId) -> Vec<String> {
        self.element(node)
            .map(|element| {
                let names: js_sys::Array = element.get_attribute_names();
                names.iter().filter_map(|name| name.as_string()).collect()
            })
            .unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element(node)?.get_attribute(name)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element(node) {
            if let Err(err) = element.set_attribute(name, value) {
                warn!(?err, name, "set_attribute failed");
            }
        }
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(element) = self.element(node) {
            if let Err(err) = element.remove_attribute(name) {
                warn!(?err, name, "remove_attribute failed");
            }
        }
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        self.element(node)
            .map(|element| {
                let rect = element.get_bounding_client_rect();
                Rect::new(rect.left(), rect.top(), rect.width(), rect.height())
            })
            .unwrap_or_default()
    }

    fn computed_style(&self, node: NodeId, property: &str) -> String {
        self.element(node)
            .and_then(|element| self.computed(&element))
            .and_then(|style| style.get_property_value(property).ok())
            .unwrap_or_default()
    }

    fn inline_style(&self, node: NodeId, property: &str) -> String {
        self.element(node)
            .as_ref()
            .and_then(inline_declaration)
            .and_then(|style| style.get_property_value(property).ok())
            .unwrap_or_default()
    }

    fn set_inline_style(&self, node: NodeId, property: &str, value: &str) {
        let Some(style) = self.element(node).as_ref().and_then(inline_declaration) else {
            return;
        };
        let result = if value.is_empty() {
            style.remove_property(property).map(|_| ())
        } else {
            style.set_property(property, value)
        };
        if let Err(err) = result {
            warn!(?err, property, value, "style write failed");
        }
    }

    fn force_layout(&self, node: NodeId) {
        if let Some(element) = self.element(node) {
            // Reading geometry flushes pending style and layout.
            let _ = element.get_bounding_client_rect();
        }
    }

    fn scroll_offset(&self, node: NodeId) -> (f64, f64) {
        if node == self.root {
            return (
                self.window.scroll_x().unwrap_or_default(),
                self.window.scroll_y().unwrap_or_default(),
            );
        }
        self.element(node)
            .map(|element| (element.scroll_left() as f64, element.scroll_top() as f64))
            .unwrap_or_default()
    }

    fn add_listener(&self, node: NodeId, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id());
        // Document scrolling is reported on the window, not on the body.
        let target: EventTarget = if node == self.root && kind == EventKind::Scroll {
            self.window.clone().into()
        } else {
            match self.element(node) {
                Some(element) => element.into(),
                None => return id,
            }
        };

        let registry = Rc::downgrade(&self.registry);
        let mut listener = listener;
        let handle = EventListener::new(&target, kind.as_str(), move |event| {
            let event = to_dom_event(&registry, kind, node, event);
            listener(&event);
        });
        self.listeners.borrow_mut().insert(id, handle);
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        let removed = self.listeners.borrow_mut().remove(&id);
        drop(removed);
    }

    fn set_timeout(&self, delay_ms: f64, task: Task) -> TimerId {
        let id = TimerId(self.next_id());
        let timers = Rc::downgrade(&self.timers);
        let millis = delay_ms.max(0.0).ceil().min(u32::MAX as f64) as u32;
        let timeout = Timeout::new(millis, move || {
            let fired = timers
                .upgrade()
                .and_then(|timers| timers.borrow_mut().remove(&id));
            task();
            drop(fired);
        });
        self.timers.borrow_mut().insert(id, timeout);
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        let removed = self.timers.borrow_mut().remove(&id);
        drop(removed);
    }

    fn request_frame(&self, task: Task) -> FrameId {
        let id = FrameId(self.next_id());
        let frames = Rc::downgrade(&self.frames);
        let frame = request_animation_frame(move |_timestamp| {
            let fired = frames
                .upgrade()
                .and_then(|frames| frames.borrow_mut().remove(&id));
            task();
            drop(fired);
        });
        self.frames.borrow_mut().insert(id, frame);
        id
    }

    fn cancel_frame(&self, id: FrameId) {
        let removed = self.frames.borrow_mut().remove(&id);
        drop(removed);
    }
}

/// JavaScript entry point: morph `from` into `to`.
///
/// `duration` and `easing` are CSS strings; unset values use the defaults.
#[wasm_bindgen(js_name = illusory)]
pub async fn morph(
    from: Element,
    to: Element,
    duration: Option<String>,
    easing: Option<String>,
) -> Result<(), JsValue> {
    let document = WebDocument::new().map_err(|err| JsValue::from_str(&err.to_string()))?;
    let from = document.node_id(&from);
    let to = document.node_id(&to);

    let mut options = Options::new();
    if let Some(duration) = duration {
        options = options.with_duration(duration);
    }
    if let Some(easing) = easing {
        options = options.with_easing(easing);
    }
    debug!(?from, ?to, "morph requested from JavaScript");

    illusory(document, from, to, TransitionOptions::new(options))
        .await
        .map_err(|err| JsValue::from_str(&err.to_string()))
}
