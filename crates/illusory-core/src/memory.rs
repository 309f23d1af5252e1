//! In-memory [`Document`] with a virtual clock.
//!
//! `MemoryDocument` keeps a node tree with attributes, inline and sheet styles
//! and fixed layout rects. Timers and animation frames run against a virtual
//! clock that only moves when [`MemoryDocument::step`] or
//! [`MemoryDocument::advance`] is called, so transitions are fully
//! deterministic.
//!
//! CSS transitions are simulated the way browsers batch style writes: a
//! property only transitions when its value changed since the last
//! [`Document::force_layout`] and the node's `transition` list gives it a
//! non-zero duration. In that case a `transitionend` is dispatched once the
//! delay and duration elapse.
//!
//! # Usage
//!
//! ```
//! use illusory_core::geometry::Rect;
//! use illusory_core::memory::MemoryDocument;
//!
//! let doc = MemoryDocument::new();
//! let card = doc.append_element(doc.root_node(), "div", Rect::new(0.0, 0.0, 100.0, 50.0));
//! assert!(doc.is_attached(card));
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::css::{parse_px, parse_transition_list};
use crate::document::{
    Document, DomEvent, EventKind, FrameId, Listener, ListenerId, NodeId, Task, TimerId,
};
use crate::geometry::Rect;

/// Virtual time between two animation frames.
pub const FRAME_INTERVAL_MS: f64 = 16.0;

/// Viewport-sized rect given to the root node.
pub const VIEWPORT: Rect = Rect {
    left: 0.0,
    top: 0.0,
    width: 1280.0,
    height: 720.0,
};

const INHERITED: &[&str] = &["visibility", "color"];

fn initial_value(property: &str) -> &'static str {
    match property {
        "opacity" => "1",
        "transform" => "none",
        "visibility" => "visible",
        "display" => "block",
        "position" => "static",
        "background-color" => "rgba(0, 0, 0, 0)",
        "border-radius" => "0px",
        "box-shadow" => "none",
        "color" => "rgb(0, 0, 0)",
        "transition" => "none",
        "z-index" => "auto",
        _ => "",
    }
}

#[derive(Debug, Clone, Default)]
struct NodeData {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: BTreeMap<String, String>,
    inline: BTreeMap<String, String>,
    sheet: BTreeMap<String, String>,
    rect: Rect,
    scroll: (f64, f64),
    /// Computed values as of the last layout flush.
    committed: Option<BTreeMap<String, String>>,
}

enum Job {
    Run(Task),
    TransitionEnd { node: NodeId, property: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskKind {
    Timer,
    Frame,
}

struct Scheduled {
    id: u64,
    kind: TaskKind,
    due: f64,
    seq: u64,
    job: Job,
}

struct ListenerEntry {
    node: NodeId,
    kind: EventKind,
    callback: Rc<RefCell<Listener>>,
}

#[derive(Default)]
struct State {
    nodes: HashMap<NodeId, NodeData>,
    next_node: u64,
    next_task: u64,
    next_listener: u64,
    seq: u64,
    now_ms: f64,
    listeners: BTreeMap<ListenerId, ListenerEntry>,
    tasks: Vec<Scheduled>,
    /// Pending simulated transitions keyed by node and property.
    running: HashMap<(NodeId, String), u64>,
    layout_flushes: usize,
}

impl State {
    fn insert(&mut self, data: NodeData) -> NodeId {
        self.next_node += 1;
        let id = NodeId(self.next_node);
        self.nodes.insert(id, data);
        id
    }

    fn schedule(&mut self, kind: TaskKind, delay_ms: f64, job: Job) -> u64 {
        self.next_task += 1;
        self.seq += 1;
        let id = self.next_task;
        self.tasks.push(Scheduled {
            id,
            kind,
            due: self.now_ms + delay_ms.max(0.0),
            seq: self.seq,
            job,
        });
        id
    }

    fn cancel(&mut self, kind: TaskKind, id: u64) {
        self.tasks.retain(|task| !(task.kind == kind && task.id == id));
    }

    fn is_attached(&self, root: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == root {
                return true;
            }
            current = self.nodes.get(&id).and_then(|data| data.parent);
        }
        false
    }

    fn computed(&self, node: NodeId, property: &str) -> String {
        let Some(data) = self.nodes.get(&node) else {
            return String::new();
        };
        if let Some(value) = data.inline.get(property).or_else(|| data.sheet.get(property)) {
            return value.clone();
        }
        if property == "transform-origin" {
            return format!("{}px {}px", data.rect.width * 0.5, data.rect.height * 0.5);
        }
        if INHERITED.contains(&property) {
            if let Some(parent) = data.parent {
                return self.computed(parent, property);
            }
        }
        initial_value(property).to_string()
    }

    fn detach_from_parent(&mut self, node: NodeId) {
        let parent = self.nodes.get_mut(&node).and_then(|data| data.parent.take());
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|child| *child != node);
        }
    }

    fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = vec![node];
        let mut index = 0;
        while index < out.len() {
            if let Some(data) = self.nodes.get(&out[index]) {
                out.extend(data.children.iter().copied());
            }
            index += 1;
        }
        out
    }

    fn clone_subtree(&mut self, node: NodeId, deep: bool) -> Option<NodeId> {
        let source = self.nodes.get(&node)?.clone();
        let copy = self.insert(NodeData {
            parent: None,
            children: Vec::new(),
            committed: None,
            scroll: (0.0, 0.0),
            ..source.clone()
        });
        if deep {
            for child in source.children {
                if let Some(child_copy) = self.clone_subtree(child, true) {
                    if let Some(data) = self.nodes.get_mut(&child_copy) {
                        data.parent = Some(copy);
                    }
                    if let Some(data) = self.nodes.get_mut(&copy) {
                        data.children.push(child_copy);
                    }
                }
            }
        }
        Some(copy)
    }
}

/// Deterministic in-memory document.
pub struct MemoryDocument {
    root: NodeId,
    state: RefCell<State>,
}

impl MemoryDocument {
    /// Create a document whose root covers [`VIEWPORT`].
    pub fn new() -> Rc<Self> {
        let mut state = State::default();
        let root = state.insert(NodeData {
            tag: "body".to_string(),
            rect: VIEWPORT,
            ..NodeData::default()
        });
        Rc::new(Self {
            root,
            state: RefCell::new(state),
        })
    }

    pub fn root_node(&self) -> NodeId {
        self.root
    }

    /// Create a parentless element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.state.borrow_mut().insert(NodeData {
            tag: tag.to_string(),
            ..NodeData::default()
        })
    }

    /// Create an element with a layout rect and append it to `parent`.
    pub fn append_element(&self, parent: NodeId, tag: &str, rect: Rect) -> NodeId {
        let node = self.create_element(tag);
        self.set_rect(node, rect);
        self.append_child(parent, node);
        node
    }

    pub fn set_rect(&self, node: NodeId, rect: Rect) {
        if let Some(data) = self.state.borrow_mut().nodes.get_mut(&node) {
            data.rect = rect;
        }
    }

    /// Author (stylesheet) style; inline declarations take precedence.
    pub fn set_sheet_style(&self, node: NodeId, property: &str, value: &str) {
        if let Some(data) = self.state.borrow_mut().nodes.get_mut(&node) {
            data.sheet.insert(property.to_string(), value.to_string());
        }
    }

    /// Scroll a container and dispatch `scroll` to its listeners.
    pub fn scroll_to(&self, node: NodeId, left: f64, top: f64) {
        if let Some(data) = self.state.borrow_mut().nodes.get_mut(&node) {
            data.scroll = (left, top);
        }
        self.dispatch(&DomEvent::scroll(node));
    }

    /// Deliver an event to the listeners registered on its target.
    pub fn dispatch(&self, event: &DomEvent) {
        let callbacks: Vec<(ListenerId, Rc<RefCell<Listener>>)> = self
            .state
            .borrow()
            .listeners
            .iter()
            .filter(|(_, entry)| entry.node == event.target && entry.kind == event.kind)
            .map(|(id, entry)| (*id, entry.callback.clone()))
            .collect();

        for (id, callback) in callbacks {
            if !self.state.borrow().listeners.contains_key(&id) {
                continue;
            }
            if let Ok(mut callback) = callback.try_borrow_mut() {
                (*callback)(event);
            }
        }
    }

    pub fn now_ms(&self) -> f64 {
        self.state.borrow().now_ms
    }

    pub fn is_attached(&self, node: NodeId) -> bool {
        self.state.borrow().is_attached(self.root, node)
    }

    pub fn layout_flushes(&self) -> usize {
        self.state.borrow().layout_flushes
    }

    pub fn listener_count(&self) -> usize {
        self.state.borrow().listeners.len()
    }

    pub fn pending_timers(&self) -> usize {
        self.count_tasks(TaskKind::Timer)
    }

    pub fn pending_frames(&self) -> usize {
        self.count_tasks(TaskKind::Frame)
    }

    /// Simulated transitions that have not yet emitted `transitionend`.
    pub fn running_transitions(&self) -> usize {
        self.state.borrow().running.len()
    }

    fn count_tasks(&self, kind: TaskKind) -> usize {
        self.state
            .borrow()
            .tasks
            .iter()
            .filter(|task| task.kind == kind && matches!(task.job, Job::Run(_)))
            .count()
    }

    fn next_due(&self) -> Option<f64> {
        self.state
            .borrow()
            .tasks
            .iter()
            .map(|task| task.due)
            .min_by(f64::total_cmp)
    }

    /// Run the earliest scheduled task, moving the clock to its due time.
    ///
    /// Returns `false` when nothing is scheduled.
    pub fn step(&self) -> bool {
        let job = {
            let mut state = self.state.borrow_mut();
            let next = state
                .tasks
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.due.total_cmp(&b.due).then(a.seq.cmp(&b.seq)))
                .map(|(index, _)| index);
            let Some(index) = next else {
                return false;
            };
            let task = state.tasks.remove(index);
            state.now_ms = state.now_ms.max(task.due);
            if let Job::TransitionEnd { node, property } = &task.job {
                state.running.remove(&(*node, property.clone()));
            }
            task.job
        };

        match job {
            Job::Run(task) => task(),
            Job::TransitionEnd { node, property } => {
                tracing::trace!(?node, %property, "transitionend");
                self.dispatch(&DomEvent::transition_end(node, property));
            }
        }
        true
    }

    /// Run every task due within the next `ms` and move the clock forward.
    pub fn advance(&self, ms: f64) {
        let target = self.now_ms() + ms;
        while self.next_due().is_some_and(|due| due <= target) {
            self.step();
        }
        let mut state = self.state.borrow_mut();
        state.now_ms = state.now_ms.max(target);
    }

    /// Poll `future` to completion, running scheduled tasks whenever it stalls.
    ///
    /// Returns `None` if the future is still pending once nothing is left to run.
    pub fn run_until_complete<F: Future>(&self, future: F) -> Option<F::Output> {
        let mut future = pin!(future);
        let waker = futures::task::noop_waker();
        let mut cx = Context::from_waker(&waker);
        loop {
            if let Poll::Ready(output) = future.as_mut().poll(&mut cx) {
                return Some(output);
            }
            if !self.step() {
                return None;
            }
        }
    }

    fn track_transition(&self, state: &mut State, node: NodeId, property: &str) {
        if !state.is_attached(self.root, node) {
            return;
        }
        let Some(before) = state
            .nodes
            .get(&node)
            .and_then(|data| data.committed.as_ref())
            .map(|committed| {
                committed
                    .get(property)
                    .cloned()
                    .unwrap_or_else(|| initial_value(property).to_string())
            })
        else {
            // Never laid out: there is no before-change style to transition from.
            return;
        };

        let key = (node, property.to_string());
        if let Some(id) = state.running.remove(&key) {
            state.cancel(TaskKind::Timer, id);
        }

        let after = state.computed(node, property);
        if before == after {
            return;
        }

        let entry = parse_transition_list(&state.computed(node, "transition"))
            .into_iter()
            .rev()
            .find(|entry| entry.applies_to(property));
        let Some(entry) = entry.filter(|entry| entry.duration_ms > 0.0) else {
            return;
        };

        let id = state.schedule(
            TaskKind::Timer,
            entry.delay_ms + entry.duration_ms,
            Job::TransitionEnd {
                node,
                property: property.to_string(),
            },
        );
        state.running.insert(key, id);
    }
}

impl Document for MemoryDocument {
    fn root(&self) -> NodeId {
        self.root
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.state
            .borrow()
            .nodes
            .get(&node)
            .map(|data| data.tag.to_ascii_uppercase())
            .unwrap_or_default()
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.state.borrow().nodes.get(&node)?.parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.state
            .borrow()
            .nodes
            .get(&node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn clone_node(&self, node: NodeId, deep: bool) -> NodeId {
        let mut state = self.state.borrow_mut();
        match state.clone_subtree(node, deep) {
            Some(copy) => copy,
            None => state.insert(NodeData::default()),
        }
    }

    fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut state = self.state.borrow_mut();
        if !state.nodes.contains_key(&parent) || !state.nodes.contains_key(&child) {
            return;
        }
        state.detach_from_parent(child);
        if let Some(data) = state.nodes.get_mut(&child) {
            data.parent = Some(parent);
        }
        if let Some(data) = state.nodes.get_mut(&parent) {
            data.children.push(child);
        }
    }

    fn remove(&self, node: NodeId) {
        let mut state = self.state.borrow_mut();
        state.detach_from_parent(node);

        // Detached nodes never finish their transitions.
        let subtree = state.subtree(node);
        let cancelled: Vec<u64> = state
            .running
            .iter()
            .filter(|((id, _), _)| subtree.contains(id))
            .map(|(_, task)| *task)
            .collect();
        state.running.retain(|(id, _), _| !subtree.contains(id));
        for id in cancelled {
            state.cancel(TaskKind::Timer, id);
        }
        for id in subtree {
            if let Some(data) = state.nodes.get_mut(&id) {
                data.committed = None;
            }
        }
    }

    fn attribute_names(&self, node: NodeId) -> Vec<String> {
        self.state
            .borrow()
            .nodes
            .get(&node)
            .map(|data| data.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.state
            .borrow()
            .nodes
            .get(&node)?
            .attributes
            .get(name)
            .cloned()
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.state.borrow_mut().nodes.get_mut(&node) {
            data.attributes.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        if let Some(data) = self.state.borrow_mut().nodes.get_mut(&node) {
            data.attributes.remove(name);
        }
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        let state = self.state.borrow();
        if !state.is_attached(self.root, node) {
            return Rect::default();
        }

        let mut current = Some(node);
        while let Some(id) = current {
            if state.computed(id, "display") == "none" {
                return Rect::default();
            }
            current = state.nodes.get(&id).and_then(|data| data.parent);
        }

        let Some(data) = state.nodes.get(&node) else {
            return Rect::default();
        };
        if state.computed(node, "position") == "fixed" {
            let read = |property: &str, fallback: f64| {
                parse_px(&state.computed(node, property)).unwrap_or(fallback)
            };
            return Rect::new(
                read("left", data.rect.left),
                read("top", data.rect.top),
                read("width", data.rect.width),
                read("height", data.rect.height),
            );
        }
        data.rect
    }

    fn computed_style(&self, node: NodeId, property: &str) -> String {
        self.state.borrow().computed(node, property)
    }

    fn inline_style(&self, node: NodeId, property: &str) -> String {
        self.state
            .borrow()
            .nodes
            .get(&node)
            .and_then(|data| data.inline.get(property).cloned())
            .unwrap_or_default()
    }

    fn set_inline_style(&self, node: NodeId, property: &str, value: &str) {
        let mut state = self.state.borrow_mut();
        let Some(data) = state.nodes.get_mut(&node) else {
            return;
        };
        if value.is_empty() {
            data.inline.remove(property);
        } else {
            data.inline.insert(property.to_string(), value.to_string());
        }
        if property != "transition" {
            self.track_transition(&mut state, node, property);
        }
    }

    fn force_layout(&self, _node: NodeId) {
        let mut state = self.state.borrow_mut();
        state.layout_flushes += 1;

        let attached = state.subtree(self.root);
        let snapshots: Vec<(NodeId, BTreeMap<String, String>)> = attached
            .into_iter()
            .filter_map(|id| {
                let data = state.nodes.get(&id)?;
                let committed = data
                    .inline
                    .keys()
                    .chain(data.sheet.keys())
                    .map(|property| (property.clone(), state.computed(id, property)))
                    .collect();
                Some((id, committed))
            })
            .collect();

        for (id, committed) in snapshots {
            if let Some(data) = state.nodes.get_mut(&id) {
                data.committed = Some(committed);
            }
        }
    }

    fn scroll_offset(&self, node: NodeId) -> (f64, f64) {
        self.state
            .borrow()
            .nodes
            .get(&node)
            .map(|data| data.scroll)
            .unwrap_or_default()
    }

    fn add_listener(&self, node: NodeId, kind: EventKind, listener: Listener) -> ListenerId {
        let mut state = self.state.borrow_mut();
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.listeners.insert(
            id,
            ListenerEntry {
                node,
                kind,
                callback: Rc::new(RefCell::new(listener)),
            },
        );
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        // Bind the entry so its callback drops after the borrow is released.
        let removed = self.state.borrow_mut().listeners.remove(&id);
        drop(removed);
    }

    fn set_timeout(&self, delay_ms: f64, task: Task) -> TimerId {
        TimerId(
            self.state
                .borrow_mut()
                .schedule(TaskKind::Timer, delay_ms, Job::Run(task)),
        )
    }

    fn clear_timeout(&self, id: TimerId) {
        let removed = {
            let mut state = self.state.borrow_mut();
            let index = state
                .tasks
                .iter()
                .position(|task| task.kind == TaskKind::Timer && task.id == id.0);
            index.map(|index| state.tasks.remove(index))
        };
        drop(removed);
    }

    fn request_frame(&self, task: Task) -> FrameId {
        FrameId(
            self.state
                .borrow_mut()
                .schedule(TaskKind::Frame, FRAME_INTERVAL_MS, Job::Run(task)),
        )
    }

    fn cancel_frame(&self, id: FrameId) {
        let removed = {
            let mut state = self.state.borrow_mut();
            let index = state
                .tasks
                .iter()
                .position(|task| task.kind == TaskKind::Frame && task.id == id.0);
            index.map(|index| state.tasks.remove(index))
        };
        drop(removed);
    }
}
