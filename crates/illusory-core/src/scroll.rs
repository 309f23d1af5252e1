//! Keeps fixed-position clones anchored to their scroll containers.
//!
//! Scroll events are coalesced: the first event schedules an animation frame
//! and later events are absorbed until it runs. The frame moves each clone by
//! the scroll distance, since the synchronizer started, of the containers that
//! hold its natural element. Clones outside a container ignore its scrolling.

use std::cell::Cell;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use crate::document::{Document, DomEvent, EventKind, FrameId, ListenerId, NodeId};
use crate::snapshot::IllusoryElement;

struct Shared {
    document: Rc<dyn Document>,
    /// Each snapshot with the indices of the `origins` that contain it.
    anchors: Vec<(IllusoryElement, Vec<usize>)>,
    /// Containers with their scroll offset at start.
    origins: Vec<(NodeId, (f64, f64))>,
    frame: Cell<Option<FrameId>>,
    updates: Cell<usize>,
}

impl Shared {
    fn schedule(self: &Rc<Self>) {
        if self.frame.get().is_some() {
            return;
        }
        let weak: Weak<Self> = Rc::downgrade(self);
        let frame = self.document.request_frame(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.frame.set(None);
                shared.update();
            }
        }));
        self.frame.set(Some(frame));
    }

    fn update(&self) {
        let scrolled: Vec<(f64, f64)> = self
            .origins
            .iter()
            .map(|(container, (left, top))| {
                let (now_left, now_top) = self.document.scroll_offset(*container);
                (left - now_left, top - now_top)
            })
            .collect();
        for (snapshot, containers) in &self.anchors {
            let (dx, dy) = containers
                .iter()
                .map(|index| scrolled[*index])
                .fold((0.0, 0.0), |(x, y), (dx, dy)| (x + dx, y + dy));
            snapshot.set_offset(dx, dy);
            trace!(clone = ?snapshot.clone_node(), dx, dy, "clone re-anchored");
        }
        self.updates.set(self.updates.get() + 1);
    }
}

/// Whether `node` is `container` or one of its descendants.
fn is_inside(document: &dyn Document, node: NodeId, container: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == container {
            return true;
        }
        current = document.parent(id);
    }
    false
}

/// Scroll listeners for one transition. Dropping it stops synchronization.
pub struct ScrollSynchronizer {
    shared: Rc<Shared>,
    listeners: Vec<ListenerId>,
    stopped: bool,
}

impl ScrollSynchronizer {
    /// Listen for scrolls on each of `relative_to`.
    ///
    /// An empty list registers nothing and leaves the clones viewport-fixed.
    pub fn start(
        document: Rc<dyn Document>,
        relative_to: &[NodeId],
        snapshots: Vec<IllusoryElement>,
    ) -> Self {
        let origins: Vec<(NodeId, (f64, f64))> = relative_to
            .iter()
            .map(|container| (*container, document.scroll_offset(*container)))
            .collect();
        let anchors = snapshots
            .into_iter()
            .map(|snapshot| {
                let containers = origins
                    .iter()
                    .enumerate()
                    .filter(|(_, (container, _))| {
                        is_inside(&*document, snapshot.natural(), *container)
                    })
                    .map(|(index, _)| index)
                    .collect();
                (snapshot, containers)
            })
            .collect();
        let shared = Rc::new(Shared {
            document: document.clone(),
            anchors,
            origins,
            frame: Cell::new(None),
            updates: Cell::new(0),
        });

        let listeners = relative_to
            .iter()
            .map(|container| {
                let weak = Rc::downgrade(&shared);
                document.add_listener(
                    *container,
                    EventKind::Scroll,
                    Box::new(move |_: &DomEvent| {
                        if let Some(shared) = weak.upgrade() {
                            shared.schedule();
                        }
                    }),
                )
            })
            .collect::<Vec<_>>();

        debug!(containers = listeners.len(), "scroll sync started");
        Self {
            shared,
            listeners,
            stopped: false,
        }
    }

    /// Number of frames that re-anchored the clones.
    pub fn updates(&self) -> usize {
        self.shared.updates.get()
    }

    /// Release listeners and any pending frame. Repeated calls do nothing.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        for id in self.listeners.drain(..) {
            self.shared.document.remove_listener(id);
        }
        if let Some(frame) = self.shared.frame.take() {
            self.shared.document.cancel_frame(frame);
        }
        debug!(updates = self.updates(), "scroll sync stopped");
    }
}

impl Drop for ScrollSynchronizer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::memory::{FRAME_INTERVAL_MS, MemoryDocument};
    use crate::options::ElementOptions;

    fn setup() -> (Rc<MemoryDocument>, NodeId, IllusoryElement) {
        let doc = MemoryDocument::new();
        let list = doc.append_element(doc.root_node(), "ul", Rect::new(0.0, 0.0, 300.0, 600.0));
        let item = doc.append_element(list, "li", Rect::new(0.0, 100.0, 300.0, 40.0));
        let element = IllusoryElement::new(doc.clone(), item, &ElementOptions::default());
        element.attach(doc.root_node());
        (doc, list, element)
    }

    #[test]
    fn test_scroll_events_coalesce_per_frame() {
        let (doc, list, element) = setup();
        let sync = ScrollSynchronizer::start(doc.clone(), &[list], vec![element.clone()]);

        doc.scroll_to(list, 0.0, 10.0);
        doc.scroll_to(list, 0.0, 20.0);
        doc.scroll_to(list, 0.0, 30.0);
        assert_eq!(doc.pending_frames(), 1);

        doc.advance(FRAME_INTERVAL_MS);
        assert_eq!(sync.updates(), 1);
        assert_eq!(doc.bounding_rect(element.clone_node()).top, 70.0);

        doc.scroll_to(list, 0.0, 0.0);
        doc.advance(FRAME_INTERVAL_MS);
        assert_eq!(sync.updates(), 2);
        assert_eq!(doc.bounding_rect(element.clone_node()).top, 100.0);
    }

    #[test]
    fn test_clones_outside_container_stay_put() {
        let (doc, list, element) = setup();
        let section = Rect::new(300.0, 0.0, 500.0, 600.0);
        let detail = doc.append_element(doc.root_node(), "section", section);
        let outside = IllusoryElement::new(doc.clone(), detail, &ElementOptions::default());
        outside.attach(doc.root_node());
        let _sync = ScrollSynchronizer::start(
            doc.clone(),
            &[list],
            vec![element.clone(), outside.clone()],
        );

        doc.scroll_to(list, 0.0, 100.0);
        doc.advance(FRAME_INTERVAL_MS);
        assert_eq!(doc.bounding_rect(element.clone_node()).top, 0.0);
        assert_eq!(doc.bounding_rect(outside.clone_node()).top, 0.0);
        assert_eq!(outside.get_style("top"), "0px");

        doc.scroll_to(list, 0.0, 0.0);
        doc.advance(FRAME_INTERVAL_MS);
        assert_eq!(doc.bounding_rect(element.clone_node()).top, 100.0);
        assert_eq!(doc.bounding_rect(outside.clone_node()).top, 0.0);
    }

    #[test]
    fn test_nested_containers_accumulate() {
        let (doc, list, element) = setup();
        let root = doc.root_node();
        let _sync = ScrollSynchronizer::start(doc.clone(), &[list, root], vec![element.clone()]);

        doc.scroll_to(list, 0.0, 10.0);
        doc.scroll_to(root, 0.0, 5.0);
        doc.advance(FRAME_INTERVAL_MS);
        assert_eq!(doc.bounding_rect(element.clone_node()).top, 85.0);
    }

    #[test]
    fn test_empty_relative_to_registers_nothing() {
        let (doc, list, element) = setup();
        let sync = ScrollSynchronizer::start(doc.clone(), &[], vec![element.clone()]);
        assert_eq!(doc.listener_count(), 0);

        doc.scroll_to(list, 0.0, 50.0);
        assert_eq!(doc.pending_frames(), 0);
        assert_eq!(sync.updates(), 0);
        assert_eq!(doc.bounding_rect(element.clone_node()).top, 100.0);
    }

    #[test]
    fn test_stop_releases_listeners_and_pending_frame() {
        let (doc, list, element) = setup();
        let mut sync = ScrollSynchronizer::start(doc.clone(), &[list], vec![element]);
        assert_eq!(doc.listener_count(), 1);

        doc.scroll_to(list, 0.0, 10.0);
        sync.stop();
        sync.stop();
        assert_eq!(doc.listener_count(), 0);
        assert_eq!(doc.pending_frames(), 0);
        assert_eq!(sync.updates(), 0);
    }

    #[test]
    fn test_drop_stops_sync() {
        let (doc, list, element) = setup();
        let sync = ScrollSynchronizer::start(doc.clone(), &[list], vec![element]);
        drop(sync);
        assert_eq!(doc.listener_count(), 0);
    }
}
