//! Element snapshots and the clone lifecycle.
//!
//! An [`IllusoryElement`] wraps one natural element. Construction captures its
//! geometry and visual styles, then builds a fixed-position clone that the
//! transition animates in place of the original.
//!
//! ```text
//! Constructed -> Attached -> (Hidden | Shown)* -> Detached
//! ```
//!
//! `Detached` is terminal. Every operation on a detached snapshot is a no-op
//! or returns an empty value, so cleanup code can always touch snapshots.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use tracing::{debug, trace, warn};

use crate::css::parse_alpha;
use crate::document::{Document, DomEvent, EventKind, ListenerId, NodeId, TimerId};
use crate::geometry::Rect;
use crate::options::{
    CloneDecision, DataAttributes, ElementOptions, ProcessClone, TransitionTiming,
};

/// Added to the transition duration before a wait gives up.
pub const WAIT_MARGIN_MS: f64 = 50.0;

/// Attribute set on every clone root.
pub const CLONE_MARKER: &str = "data-illusory-clone";

const INTERNAL_DATA_PREFIX: &str = "data-illusory-";

/// Computed styles copied from the natural element onto the clone root.
pub const CAPTURED_STYLES: &[&str] = &[
    "background-color",
    "border-radius",
    "box-shadow",
    "color",
    "opacity",
    "transform",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructed,
    Attached,
    Hidden,
    Shown,
    Detached,
}

/// How a [`IllusoryElement::wait_for`] future settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A completion event for the property arrived.
    Ended,
    /// The guard timer fired first.
    TimedOut,
    /// The snapshot was detached before completion.
    Detached,
}

impl WaitOutcome {
    pub fn is_interrupted(&self) -> bool {
        !matches!(self, Self::Ended)
    }
}

/// A node handed to the `processClone` visitor.
pub struct CloneNode<'a> {
    pub document: &'a dyn Document,
    pub node: NodeId,
    /// 0 for the clone root.
    pub depth: usize,
}

impl CloneNode<'_> {
    pub fn tag_name(&self) -> String {
        self.document.tag_name(self.node)
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        self.document.attribute(self.node, name)
    }
}

struct WaitSlot {
    document: Rc<dyn Document>,
    sender: RefCell<Option<oneshot::Sender<WaitOutcome>>>,
    listeners: RefCell<Vec<ListenerId>>,
    timer: Cell<Option<TimerId>>,
}

impl WaitSlot {
    fn settle(&self, outcome: WaitOutcome) {
        let sender = self.sender.borrow_mut().take();
        if let Some(sender) = sender {
            let _ = sender.send(outcome);
        }
        self.release();
    }

    /// Drop the listeners and the guard timer together.
    fn release(&self) {
        let listeners = std::mem::take(&mut *self.listeners.borrow_mut());
        for id in listeners {
            self.document.remove_listener(id);
        }
        if let Some(timer) = self.timer.take() {
            self.document.clear_timeout(timer);
        }
    }

    fn is_settled(&self) -> bool {
        self.sender.borrow().is_none()
    }
}

/// Future returned by [`IllusoryElement::wait_for`].
///
/// Dropping it before it settles releases its listeners and timer.
#[must_use = "futures do nothing unless polled"]
pub struct WaitFor {
    receiver: oneshot::Receiver<WaitOutcome>,
    slot: Option<Rc<WaitSlot>>,
}

impl Future for WaitFor {
    type Output = WaitOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<WaitOutcome> {
        match self.receiver.poll_unpin(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(WaitOutcome::Detached),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for WaitFor {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.release();
        }
    }
}

struct Inner {
    document: Rc<dyn Document>,
    natural: NodeId,
    clone: NodeId,
    rect: Rect,
    transform_origin: String,
    natural_to_clone_scale: f64,
    captured: BTreeMap<String, String>,
    overrides: RefCell<BTreeMap<String, String>>,
    lifecycle: Cell<Lifecycle>,
    /// Inline `visibility` of the natural element while it is hidden.
    natural_visibility: RefCell<Option<String>>,
    wait_guard_ms: Cell<f64>,
    waiters: RefCell<Vec<Rc<WaitSlot>>>,
}

impl Inner {
    fn show_natural(&self) {
        let previous = self.natural_visibility.borrow_mut().take();
        if let Some(previous) = previous {
            self.document
                .set_inline_style(self.natural, "visibility", &previous);
        }
    }

    fn detach(&self) {
        if self.lifecycle.get() == Lifecycle::Detached {
            return;
        }
        self.lifecycle.set(Lifecycle::Detached);

        let waiters = std::mem::take(&mut *self.waiters.borrow_mut());
        for slot in waiters {
            slot.settle(WaitOutcome::Detached);
        }
        self.document.remove(self.clone);
        debug!(natural = ?self.natural, clone = ?self.clone, "snapshot detached");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.show_natural();
        self.detach();
    }
}

/// Snapshot of one natural element plus its animated clone.
///
/// Cloning the handle is cheap; all handles share one clone. When the last
/// handle is dropped the clone is detached and the natural element shown.
#[derive(Clone)]
pub struct IllusoryElement {
    inner: Rc<Inner>,
}

impl IllusoryElement {
    /// Snapshot `natural` and build its clone.
    ///
    /// Geometry is captured before anything else touches the element.
    pub fn new(document: Rc<dyn Document>, natural: NodeId, options: &ElementOptions) -> Self {
        let rect = document.bounding_rect(natural);
        let transform_origin = document.computed_style(natural, "transform-origin");
        let captured: BTreeMap<String, String> = CAPTURED_STYLES
            .iter()
            .map(|property| {
                (
                    property.to_string(),
                    document.computed_style(natural, property),
                )
            })
            .collect();

        let mut natural_to_clone_scale = options.natural_to_clone_scale;
        if !(natural_to_clone_scale.is_finite() && natural_to_clone_scale > 0.0) {
            warn!(natural_to_clone_scale, "ignoring invalid natural-to-clone scale");
            natural_to_clone_scale = 1.0;
        }

        let clone = document.clone_node(natural, options.include_children);
        filter_attributes(&*document, clone, &options.preserve_data_attributes);
        if let Some(visitor) = &options.process_clone {
            visit_clone(&*document, clone, 0, visitor);
        }
        document.set_attribute(clone, CLONE_MARKER, "");

        for (property, value) in &captured {
            document.set_inline_style(clone, property, value);
        }
        let placement = [
            ("position", "fixed".to_string()),
            ("box-sizing", "border-box".to_string()),
            ("margin", "0px".to_string()),
            ("left", format!("{}px", rect.left)),
            ("top", format!("{}px", rect.top)),
            ("width", format!("{}px", rect.width)),
            ("height", format!("{}px", rect.height)),
            ("pointer-events", "none".to_string()),
            ("transition", "none".to_string()),
            ("transform-origin", transform_origin.clone()),
        ];
        for (property, value) in &placement {
            document.set_inline_style(clone, property, value);
        }

        trace!(?natural, ?clone, ?rect, %transform_origin, "snapshot constructed");

        Self {
            inner: Rc::new(Inner {
                document,
                natural,
                clone,
                rect,
                transform_origin,
                natural_to_clone_scale,
                captured,
                overrides: RefCell::new(BTreeMap::new()),
                lifecycle: Cell::new(Lifecycle::Constructed),
                natural_visibility: RefCell::new(None),
                wait_guard_ms: Cell::new(WAIT_MARGIN_MS),
                waiters: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn document(&self) -> &Rc<dyn Document> {
        &self.inner.document
    }

    pub fn natural(&self) -> NodeId {
        self.inner.natural
    }

    pub fn clone_node(&self) -> NodeId {
        self.inner.clone
    }

    /// Geometry captured at construction.
    pub fn rect(&self) -> Rect {
        self.inner.rect
    }

    pub fn transform_origin(&self) -> &str {
        &self.inner.transform_origin
    }

    pub fn natural_to_clone_scale(&self) -> f64 {
        self.inner.natural_to_clone_scale
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.lifecycle.get()
    }

    pub fn is_detached(&self) -> bool {
        self.lifecycle() == Lifecycle::Detached
    }

    pub fn tag_name(&self) -> String {
        self.inner.document.tag_name(self.inner.natural)
    }

    /// Computed value of a [`CAPTURED_STYLES`] property at construction.
    pub fn captured_style(&self, property: &str) -> Option<&str> {
        self.inner.captured.get(property).map(String::as_str)
    }

    /// Whether the captured background colour is fully opaque.
    ///
    /// An unreadable colour counts as transparent.
    pub fn has_opaque_background(&self) -> bool {
        self.captured_style("background-color")
            .and_then(parse_alpha)
            .is_some_and(|alpha| alpha >= 1.0)
    }

    /// Insert the clone into `container`. Only the first call has an effect.
    pub fn attach(&self, container: NodeId) {
        if self.lifecycle() != Lifecycle::Constructed {
            return;
        }
        self.inner.document.append_child(container, self.inner.clone);
        self.inner.lifecycle.set(Lifecycle::Attached);
        debug!(clone = ?self.inner.clone, ?container, "snapshot attached");
    }

    pub fn set_style(&self, property: &str, value: &str) {
        if self.is_detached() {
            return;
        }
        self.inner
            .overrides
            .borrow_mut()
            .insert(property.to_string(), value.to_string());
        self.inner
            .document
            .set_inline_style(self.inner.clone, property, value);
    }

    /// Last value written through [`set_style`](Self::set_style), else the
    /// clone's computed value. Empty once detached.
    pub fn get_style(&self, property: &str) -> String {
        if self.is_detached() {
            return String::new();
        }
        if let Some(value) = self.inner.overrides.borrow().get(property) {
            return value.clone();
        }
        self.inner
            .document
            .computed_style(self.inner.clone, property)
    }

    /// Wait for a `transitionend` for `property`, or any `animationend`, on the
    /// clone.
    ///
    /// The guard timer is the transition duration plus [`WAIT_MARGIN_MS`], or
    /// the bare margin before [`enable_transitions`](Self::enable_transitions).
    pub fn wait_for(&self, property: &str) -> WaitFor {
        let (sender, receiver) = oneshot::channel();
        if self.is_detached() {
            let _ = sender.send(WaitOutcome::Detached);
            return WaitFor {
                receiver,
                slot: None,
            };
        }

        let document = &self.inner.document;
        let clone = self.inner.clone;
        let slot = Rc::new(WaitSlot {
            document: document.clone(),
            sender: RefCell::new(Some(sender)),
            listeners: RefCell::new(Vec::new()),
            timer: Cell::new(None),
        });

        for kind in [EventKind::TransitionEnd, EventKind::AnimationEnd] {
            let weak = Rc::downgrade(&slot);
            let property = property.to_string();
            let id = document.add_listener(
                clone,
                kind,
                Box::new(move |event: &DomEvent| {
                    // `animationend` names the animation, not a property.
                    let matches = event.target == clone
                        && (event.kind == EventKind::AnimationEnd
                            || event
                                .property
                                .as_deref()
                                .is_none_or(|name| name == property));
                    if !matches {
                        return;
                    }
                    if let Some(slot) = weak.upgrade() {
                        slot.settle(WaitOutcome::Ended);
                    }
                }),
            );
            slot.listeners.borrow_mut().push(id);
        }

        let guard_ms = self.inner.wait_guard_ms.get();
        let weak = Rc::downgrade(&slot);
        let owned = property.to_string();
        let timer = document.set_timeout(
            guard_ms,
            Box::new(move || {
                if let Some(slot) = weak.upgrade() {
                    debug!(property = %owned, guard_ms, "wait timed out");
                    slot.settle(WaitOutcome::TimedOut);
                }
            }),
        );
        slot.timer.set(Some(timer));

        let mut waiters = self.inner.waiters.borrow_mut();
        waiters.retain(|waiter| !waiter.is_settled());
        waiters.push(slot.clone());

        WaitFor {
            receiver,
            slot: Some(slot),
        }
    }

    pub fn hide(&self) {
        if self.is_detached() {
            return;
        }
        self.inner
            .document
            .set_inline_style(self.inner.clone, "visibility", "hidden");
        self.inner.lifecycle.set(Lifecycle::Hidden);
    }

    pub fn show(&self) {
        if self.is_detached() {
            return;
        }
        self.inner
            .document
            .set_inline_style(self.inner.clone, "visibility", "visible");
        self.inner.lifecycle.set(Lifecycle::Shown);
    }

    /// Hide the natural element while keeping its layout box.
    pub fn hide_natural(&self) {
        let mut saved = self.inner.natural_visibility.borrow_mut();
        if saved.is_none() {
            *saved = Some(
                self.inner
                    .document
                    .inline_style(self.inner.natural, "visibility"),
            );
        }
        drop(saved);
        self.inner
            .document
            .set_inline_style(self.inner.natural, "visibility", "hidden");
    }

    /// Restore the natural element's inline visibility as it was before hiding.
    pub fn show_natural(&self) {
        self.inner.show_natural();
    }

    /// Force style and layout so the next writes start a transition.
    pub fn flush_css(&self) {
        if self.is_detached() {
            return;
        }
        self.inner.document.force_layout(self.inner.clone);
    }

    /// Turn on transitions for the animated properties and size the wait guard.
    pub fn enable_transitions(&self, timing: &TransitionTiming, composite_only: bool) {
        if self.is_detached() {
            return;
        }
        self.inner
            .wait_guard_ms
            .set(timing.duration_ms + WAIT_MARGIN_MS);
        self.set_style("transition", &timing.transition_value(composite_only));
    }

    /// Shift the clone from its captured position. Used for scroll anchoring.
    pub fn set_offset(&self, dx: f64, dy: f64) {
        let rect = self.inner.rect.translated(dx, dy);
        self.set_style("left", &format!("{}px", rect.left));
        self.set_style("top", &format!("{}px", rect.top));
    }

    /// Remove the clone and settle pending waits. Repeated calls do nothing.
    pub fn detach(&self) {
        self.inner.detach();
    }
}

impl fmt::Debug for IllusoryElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IllusoryElement")
            .field("natural", &self.inner.natural)
            .field("clone", &self.inner.clone)
            .field("rect", &self.inner.rect)
            .field("lifecycle", &self.inner.lifecycle.get())
            .finish()
    }
}

fn filter_attributes(document: &dyn Document, node: NodeId, policy: &DataAttributes) {
    for name in document.attribute_names(node) {
        let is_data = name.starts_with("data-");
        if is_data && !name.starts_with(INTERNAL_DATA_PREFIX) && !policy.keeps(&name) {
            document.remove_attribute(node, &name);
        }
    }
    for child in document.children(node) {
        filter_attributes(document, child, policy);
    }
}

fn visit_clone(document: &dyn Document, node: NodeId, depth: usize, visitor: &ProcessClone) {
    let decision = visitor(&CloneNode {
        document,
        node,
        depth,
    });
    if decision == CloneDecision::Drop {
        if depth == 0 {
            warn!(?node, "processClone cannot drop the clone root; keeping it");
        } else {
            document.remove(node);
            return;
        }
    }
    for child in document.children(node) {
        visit_clone(document, child, depth + 1, visitor);
    }
}
