//! The `illusory()` entry point.
//!
//! One invocation runs these phases strictly in order:
//!
//! ```text
//! Normalize -> Attach -> beforeAttach -> Flush -> beforeAnimate
//!   -> ApplyDelta -> AwaitCompletion -> beforeDetach -> Cleanup
//! ```
//!
//! Cleanup runs no matter how the earlier phases ended. A failed hook skips
//! straight to cleanup and its error is returned afterwards.

use std::rc::Rc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::document::{Document, NodeId};
use crate::error::IllusoryError;
use crate::geometry::{Delta, compute_delta};
use crate::options::{HookResult, Options, Settings, TransitionOptions};
use crate::pipeline;
use crate::scroll::ScrollSynchronizer;
use crate::snapshot::IllusoryElement;

/// Either side of a transition.
#[derive(Debug, Clone)]
pub enum Subject {
    /// A natural element; a snapshot is built for it.
    Element(NodeId),
    /// An existing snapshot, used as-is.
    Snapshot(IllusoryElement),
}

impl From<NodeId> for Subject {
    fn from(node: NodeId) -> Self {
        Self::Element(node)
    }
}

impl From<IllusoryElement> for Subject {
    fn from(element: IllusoryElement) -> Self {
        Self::Snapshot(element)
    }
}

impl From<&IllusoryElement> for Subject {
    fn from(element: &IllusoryElement) -> Self {
        Self::Snapshot(element.clone())
    }
}

/// Morph `from` into `to` using built-in global defaults.
pub async fn illusory(
    document: Rc<dyn Document>,
    from: impl Into<Subject>,
    to: impl Into<Subject>,
    options: impl Into<TransitionOptions>,
) -> Result<(), IllusoryError> {
    Illusory::new(document)
        .transition(from, to, options)
        .await
}

/// A document plus the global options tier.
pub struct Illusory {
    document: Rc<dyn Document>,
    defaults: Options,
}

impl Illusory {
    pub fn new(document: Rc<dyn Document>) -> Self {
        Self {
            document,
            defaults: Options::default(),
        }
    }

    /// Replace the global defaults.
    pub fn with_defaults(mut self, defaults: Options) -> Self {
        self.defaults = defaults;
        self
    }

    /// Build a snapshot with the global and element tiers applied.
    pub fn snapshot(&self, natural: NodeId, element: &Options) -> IllusoryElement {
        let settings = element.layered_over(&self.defaults).resolve(&*self.document);
        IllusoryElement::new(self.document.clone(), natural, &settings.element_options())
    }

    pub async fn transition(
        &self,
        from: impl Into<Subject>,
        to: impl Into<Subject>,
        options: impl Into<TransitionOptions>,
    ) -> Result<(), IllusoryError> {
        let options = options.into();
        let settings = options.merged(&self.defaults).resolve(&*self.document);

        let from = self.normalize(from.into(), &settings);
        let to = self.normalize(to.into(), &settings);
        debug!(
            from = ?from.natural(),
            to = ?to.natural(),
            duration_ms = settings.timing.duration_ms,
            "transition started"
        );

        from.attach(settings.container);
        to.attach(settings.container);
        from.set_style("z-index", &settings.z_index.to_string());
        to.set_style("z-index", &(settings.z_index + 1).to_string());

        let delta = compute_delta(&from, &to);
        let reverse = compute_delta(&to, &from);
        let cross_fade = pipeline::should_cross_fade(&to, &settings.ignore_transparency);
        pipeline::apply(
            &to,
            &pipeline::starting_styles(&reverse, &to, &from, settings.composite_only),
        );

        from.hide_natural();
        to.hide_natural();
        let mut scroll = ScrollSynchronizer::start(
            self.document.clone(),
            &settings.relative_to,
            vec![from.clone(), to.clone()],
        );

        let result = animate(&from, &to, &settings, &delta, cross_fade).await;

        scroll.stop();
        from.show_natural();
        to.show_natural();
        from.detach();
        to.detach();
        debug!(ok = result.is_ok(), "transition finished");
        result
    }

    fn normalize(&self, subject: Subject, settings: &Settings) -> IllusoryElement {
        match subject {
            Subject::Element(node) => IllusoryElement::new(
                self.document.clone(),
                node,
                &settings.element_options(),
            ),
            Subject::Snapshot(element) => element,
        }
    }
}

async fn animate(
    from: &IllusoryElement,
    to: &IllusoryElement,
    settings: &Settings,
    delta: &Delta,
    cross_fade: bool,
) -> Result<(), IllusoryError> {
    run_hook(
        "beforeAttach",
        settings.before_attach.as_ref().map(|hook| hook(from, to)),
    )
    .await?;

    from.flush_css();
    to.flush_css();
    from.enable_transitions(&settings.timing, settings.composite_only);
    to.enable_transitions(&settings.timing, settings.composite_only);

    run_hook(
        "beforeAnimate",
        settings.before_animate.as_ref().map(|hook| hook(from, to)),
    )
    .await?;

    // Opacity only transitions when it actually changes.
    let mut waits = vec![from.wait_for("transform"), to.wait_for("transform")];
    if !pipeline::is_transparent(to) {
        waits.push(to.wait_for("opacity"));
    }
    if cross_fade && !pipeline::is_transparent(from) {
        waits.push(from.wait_for("opacity"));
    }
    pipeline::apply(
        from,
        &pipeline::animate_styles(delta, from, to, settings, cross_fade),
    );
    pipeline::apply(to, &pipeline::resting_styles(to, settings.composite_only));

    let outcomes = join_all(waits).await;
    let canceled = outcomes.iter().any(|outcome| outcome.is_interrupted());
    if canceled {
        debug!(?outcomes, "transition interrupted");
    }

    run_hook(
        "beforeDetach",
        settings
            .before_detach
            .as_ref()
            .map(|hook| hook(from, to, canceled)),
    )
    .await
}

async fn run_hook(hook: &'static str, result: Option<HookResult>) -> Result<(), IllusoryError> {
    let outcome = match result {
        None | Some(HookResult::Ready) => Ok(()),
        Some(HookResult::Failed(err)) => Err(err),
        Some(HookResult::Pending(future)) => future.await,
    };
    outcome.map_err(|source| {
        warn!(hook, error = %source, "hook failed");
        IllusoryError::Hook { hook, source }
    })
}
