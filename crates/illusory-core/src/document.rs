//! Host document abstraction.
//!
//! Everything the transition needs from a rendering environment goes through
//! [`Document`]: tree edits, geometry and style queries, event listeners,
//! timers and animation frames. Implementations are single-threaded and take
//! `&self`, mirroring how DOM handles behave.

use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// Opaque handle to a node owned by a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(pub u64);

/// Events the transition listens for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    TransitionEnd,
    AnimationEnd,
    Scroll,
}

impl EventKind {
    /// DOM event type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransitionEnd => "transitionend",
            Self::AnimationEnd => "animationend",
            Self::Scroll => "scroll",
        }
    }
}

/// An event delivered to a listener.
#[derive(Debug, Clone, PartialEq)]
pub struct DomEvent {
    pub kind: EventKind,
    pub target: NodeId,
    /// Property name for `transitionend`, animation name for `animationend`.
    pub property: Option<String>,
}

impl DomEvent {
    pub fn transition_end(target: NodeId, property: impl Into<String>) -> Self {
        Self {
            kind: EventKind::TransitionEnd,
            target,
            property: Some(property.into()),
        }
    }

    pub fn scroll(target: NodeId) -> Self {
        Self {
            kind: EventKind::Scroll,
            target,
            property: None,
        }
    }
}

pub type Listener = Box<dyn FnMut(&DomEvent)>;
pub type Task = Box<dyn FnOnce()>;

/// A browser-like rendering environment.
pub trait Document {
    /// Default container for clones (the document root).
    fn root(&self) -> NodeId;

    fn tag_name(&self, node: NodeId) -> String;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Copy a node (and its subtree if `deep`). The copy has no parent.
    fn clone_node(&self, node: NodeId, deep: bool) -> NodeId;

    /// Append `child`, moving it out of any previous parent.
    fn append_child(&self, parent: NodeId, child: NodeId);

    /// Remove a node from its parent. No-op for parentless nodes.
    fn remove(&self, node: NodeId);

    fn attribute_names(&self, node: NodeId) -> Vec<String>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&self, node: NodeId, name: &str);

    fn bounding_rect(&self, node: NodeId) -> Rect;

    fn computed_style(&self, node: NodeId, property: &str) -> String;

    fn inline_style(&self, node: NodeId, property: &str) -> String;

    /// Write an inline declaration. An empty value removes it.
    fn set_inline_style(&self, node: NodeId, property: &str, value: &str);

    /// Force a synchronous style and layout recomputation.
    fn force_layout(&self, node: NodeId);

    /// Current `(scrollLeft, scrollTop)` of a scroll container.
    fn scroll_offset(&self, node: NodeId) -> (f64, f64);

    fn add_listener(&self, node: NodeId, kind: EventKind, listener: Listener) -> ListenerId;

    /// Unknown or already removed ids are ignored.
    fn remove_listener(&self, id: ListenerId);

    fn set_timeout(&self, delay_ms: f64, task: Task) -> TimerId;

    /// Unknown or already fired ids are ignored.
    fn clear_timeout(&self, id: TimerId);

    fn request_frame(&self, task: Task) -> FrameId;

    fn cancel_frame(&self, id: FrameId);
}
