//! Morph one element into another by animating clones of both.
//!
//! The host environment is reached through the [`Document`] trait.
//! [`MemoryDocument`] is a deterministic in-memory host used by tests and
//! the demo binary.

pub mod css;
pub mod document;
pub mod error;
pub mod geometry;
pub mod memory;
pub mod options;
pub mod orchestrator;
pub mod pipeline;
pub mod scroll;
pub mod snapshot;

pub use document::{Document, DomEvent, EventKind, NodeId};
pub use error::IllusoryError;
pub use geometry::{Delta, Point, Rect, compute_delta};
pub use memory::MemoryDocument;
pub use options::{
    CloneDecision, DataAttributes, ElementOptions, HookResult, IgnoreTransparency, Options,
    Settings, TransitionOptions, TransitionTiming,
};
pub use orchestrator::{Illusory, Subject, illusory};
pub use scroll::ScrollSynchronizer;
pub use snapshot::{CloneNode, IllusoryElement, Lifecycle, WaitFor, WaitOutcome};
