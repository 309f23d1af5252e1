//! Layered transition options.
//!
//! Options come in three tiers, merged explicitly rather than through shared
//! mutable defaults:
//!
//! ```text
//! call-site overrides  >  element-level defaults  >  global defaults
//! ```
//!
//! Each tier is an [`Options`] value whose fields are all optional.
//! [`Options::layered_over`] merges two tiers and [`Options::resolve`] fills the
//! gaps with built-in defaults, producing concrete [`Settings`].

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};

use crate::css::{DEFAULT_DURATION_MS, duration_ms};
use crate::document::{Document, NodeId};
use crate::geometry::Delta;
use crate::snapshot::{CloneNode, IllusoryElement};

pub const DEFAULT_DURATION: &str = "300ms";
pub const DEFAULT_EASING: &str = "ease";
pub const DEFAULT_Z_INDEX: i32 = 1;

/// Future returned by an asynchronous hook.
pub type HookFuture = LocalBoxFuture<'static, anyhow::Result<()>>;

/// What a lifecycle hook hands back to the orchestrator.
pub enum HookResult {
    /// Nothing to wait for.
    Ready,
    /// The hook failed synchronously.
    Failed(anyhow::Error),
    /// Suspend the transition until the future settles.
    Pending(HookFuture),
}

impl HookResult {
    pub fn wait<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + 'static,
    {
        Self::Pending(Box::pin(future))
    }
}

impl From<()> for HookResult {
    fn from(_: ()) -> Self {
        Self::Ready
    }
}

impl From<anyhow::Result<()>> for HookResult {
    fn from(result: anyhow::Result<()>) -> Self {
        match result {
            Ok(()) => Self::Ready,
            Err(err) => Self::Failed(err),
        }
    }
}

impl fmt::Debug for HookResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str("Ready"),
            Self::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// `beforeAttach` / `beforeAnimate`: receives `(from, to)`.
pub type Hook = Rc<dyn Fn(&IllusoryElement, &IllusoryElement) -> HookResult>;

/// `beforeDetach`: receives `(from, to, canceled)`.
pub type DetachHook = Rc<dyn Fn(&IllusoryElement, &IllusoryElement, bool) -> HookResult>;

/// Per-property override: `(delta, computed_delta_style, current_style) -> css`.
pub type DeltaHandler = Rc<dyn Fn(&Delta, &str, &str) -> String>;

/// Decision returned by the clone visitor for each node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloneDecision {
    Keep,
    Drop,
}

/// Visitor called once per cloned node, before attachment.
pub type ProcessClone = Rc<dyn Fn(&CloneNode<'_>) -> CloneDecision>;

/// Which `data-*` attributes survive cloning. `data-illusory-*` always does.
#[derive(Clone, Default)]
pub enum DataAttributes {
    #[default]
    Drop,
    Keep,
    Filter(Rc<dyn Fn(&str) -> bool>),
}

impl DataAttributes {
    pub fn filter(predicate: impl Fn(&str) -> bool + 'static) -> Self {
        Self::Filter(Rc::new(predicate))
    }

    /// Whether a `data-*` attribute named `name` is kept.
    pub fn keeps(&self, name: &str) -> bool {
        match self {
            Self::Drop => false,
            Self::Keep => true,
            Self::Filter(predicate) => predicate(name),
        }
    }
}

impl From<bool> for DataAttributes {
    fn from(keep: bool) -> Self {
        if keep { Self::Keep } else { Self::Drop }
    }
}

impl fmt::Debug for DataAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drop => f.write_str("Drop"),
            Self::Keep => f.write_str("Keep"),
            Self::Filter(_) => f.write_str("Filter(..)"),
        }
    }
}

/// Which targets never cross-fade, regardless of their background.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreTransparency {
    #[default]
    None,
    All,
    /// Tag names, matched case-insensitively.
    Tags(Vec<String>),
}

impl IgnoreTransparency {
    pub fn ignores(&self, tag: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Tags(tags) => tags.iter().any(|t| t.eq_ignore_ascii_case(tag)),
        }
    }
}

impl From<bool> for IgnoreTransparency {
    fn from(ignore: bool) -> Self {
        if ignore { Self::All } else { Self::None }
    }
}

/// Per-property handler map; later layers replace entries by key.
#[derive(Clone, Default)]
pub struct DeltaHandlers {
    handlers: BTreeMap<String, DeltaHandler>,
}

impl DeltaHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        property: &str,
        handler: impl Fn(&Delta, &str, &str) -> String + 'static,
    ) -> Self {
        self.insert(property, handler);
        self
    }

    pub fn insert(
        &mut self,
        property: &str,
        handler: impl Fn(&Delta, &str, &str) -> String + 'static,
    ) {
        self.handlers.insert(property.to_string(), Rc::new(handler));
    }

    pub fn get(&self, property: &str) -> Option<&DeltaHandler> {
        self.handlers.get(property)
    }

    fn layered_over(&self, base: &Self) -> Self {
        let mut handlers = base.handlers.clone();
        handlers.extend(
            self.handlers
                .iter()
                .map(|(property, handler)| (property.clone(), handler.clone())),
        );
        Self { handlers }
    }
}

impl fmt::Debug for DeltaHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.handlers.keys()).finish()
    }
}

/// One configuration tier. Unset fields defer to the tier below.
#[derive(Clone, Default)]
pub struct Options {
    pub include_children: Option<bool>,
    pub composite_only: Option<bool>,
    pub duration: Option<String>,
    pub easing: Option<String>,
    pub z_index: Option<i32>,
    pub ignore_transparency: Option<IgnoreTransparency>,
    pub preserve_data_attributes: Option<DataAttributes>,
    pub process_clone: Option<ProcessClone>,
    pub relative_to: Option<Vec<NodeId>>,
    pub natural_to_clone_scale: Option<f64>,
    /// Parent for the clones; the document root when unset.
    pub container: Option<NodeId>,
    pub delta_handlers: DeltaHandlers,
    pub before_attach: Option<Hook>,
    pub before_animate: Option<Hook>,
    pub before_detach: Option<DetachHook>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include_children(mut self, include: bool) -> Self {
        self.include_children = Some(include);
        self
    }

    pub fn with_composite_only(mut self, composite_only: bool) -> Self {
        self.composite_only = Some(composite_only);
        self
    }

    pub fn with_duration(mut self, duration: impl Into<String>) -> Self {
        self.duration = Some(duration.into());
        self
    }

    pub fn with_easing(mut self, easing: impl Into<String>) -> Self {
        self.easing = Some(easing.into());
        self
    }

    pub fn with_z_index(mut self, z_index: i32) -> Self {
        self.z_index = Some(z_index);
        self
    }

    pub fn with_ignore_transparency(mut self, ignore: impl Into<IgnoreTransparency>) -> Self {
        self.ignore_transparency = Some(ignore.into());
        self
    }

    pub fn with_preserve_data_attributes(mut self, policy: impl Into<DataAttributes>) -> Self {
        self.preserve_data_attributes = Some(policy.into());
        self
    }

    pub fn with_process_clone(
        mut self,
        visitor: impl Fn(&CloneNode<'_>) -> CloneDecision + 'static,
    ) -> Self {
        self.process_clone = Some(Rc::new(visitor));
        self
    }

    pub fn with_relative_to(mut self, containers: Vec<NodeId>) -> Self {
        self.relative_to = Some(containers);
        self
    }

    pub fn with_natural_to_clone_scale(mut self, scale: f64) -> Self {
        self.natural_to_clone_scale = Some(scale);
        self
    }

    pub fn with_container(mut self, container: NodeId) -> Self {
        self.container = Some(container);
        self
    }

    pub fn with_delta_handler(
        mut self,
        property: &str,
        handler: impl Fn(&Delta, &str, &str) -> String + 'static,
    ) -> Self {
        self.delta_handlers.insert(property, handler);
        self
    }

    pub fn with_before_attach<F, R>(mut self, hook: F) -> Self
    where
        F: Fn(&IllusoryElement, &IllusoryElement) -> R + 'static,
        R: Into<HookResult>,
    {
        self.before_attach = Some(Rc::new(
            move |from: &IllusoryElement, to: &IllusoryElement| hook(from, to).into(),
        ));
        self
    }

    pub fn with_before_animate<F, R>(mut self, hook: F) -> Self
    where
        F: Fn(&IllusoryElement, &IllusoryElement) -> R + 'static,
        R: Into<HookResult>,
    {
        self.before_animate = Some(Rc::new(
            move |from: &IllusoryElement, to: &IllusoryElement| hook(from, to).into(),
        ));
        self
    }

    pub fn with_before_detach<F, R>(mut self, hook: F) -> Self
    where
        F: Fn(&IllusoryElement, &IllusoryElement, bool) -> R + 'static,
        R: Into<HookResult>,
    {
        self.before_detach = Some(Rc::new(
            move |from: &IllusoryElement, to: &IllusoryElement, canceled: bool| {
                hook(from, to, canceled).into()
            },
        ));
        self
    }

    /// Merge two tiers; values set on `self` win over `base`.
    pub fn layered_over(&self, base: &Options) -> Options {
        Options {
            include_children: self.include_children.or(base.include_children),
            composite_only: self.composite_only.or(base.composite_only),
            duration: self.duration.clone().or_else(|| base.duration.clone()),
            easing: self.easing.clone().or_else(|| base.easing.clone()),
            z_index: self.z_index.or(base.z_index),
            ignore_transparency: self
                .ignore_transparency
                .clone()
                .or_else(|| base.ignore_transparency.clone()),
            preserve_data_attributes: self
                .preserve_data_attributes
                .clone()
                .or_else(|| base.preserve_data_attributes.clone()),
            process_clone: self
                .process_clone
                .clone()
                .or_else(|| base.process_clone.clone()),
            relative_to: self.relative_to.clone().or_else(|| base.relative_to.clone()),
            natural_to_clone_scale: self.natural_to_clone_scale.or(base.natural_to_clone_scale),
            container: self.container.or(base.container),
            delta_handlers: self.delta_handlers.layered_over(&base.delta_handlers),
            before_attach: self
                .before_attach
                .clone()
                .or_else(|| base.before_attach.clone()),
            before_animate: self
                .before_animate
                .clone()
                .or_else(|| base.before_animate.clone()),
            before_detach: self
                .before_detach
                .clone()
                .or_else(|| base.before_detach.clone()),
        }
    }

    /// Fill unset fields with built-in defaults.
    ///
    /// The document is only consulted for its root, which stands in for an
    /// unset `container` and `relative_to`.
    pub fn resolve(&self, document: &dyn Document) -> Settings {
        let root = document.root();
        let duration = self
            .duration
            .clone()
            .unwrap_or_else(|| DEFAULT_DURATION.to_string());
        Settings {
            include_children: self.include_children.unwrap_or(true),
            composite_only: self.composite_only.unwrap_or(false),
            timing: TransitionTiming::new(
                &duration,
                self.easing.as_deref().unwrap_or(DEFAULT_EASING),
            ),
            z_index: self.z_index.unwrap_or(DEFAULT_Z_INDEX),
            ignore_transparency: self.ignore_transparency.clone().unwrap_or_default(),
            preserve_data_attributes: self.preserve_data_attributes.clone().unwrap_or_default(),
            process_clone: self.process_clone.clone(),
            relative_to: self.relative_to.clone().unwrap_or_else(|| vec![root]),
            natural_to_clone_scale: self.natural_to_clone_scale.unwrap_or(1.0),
            container: self.container.unwrap_or(root),
            delta_handlers: self.delta_handlers.clone(),
            before_attach: self.before_attach.clone(),
            before_animate: self.before_animate.clone(),
            before_detach: self.before_detach.clone(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("include_children", &self.include_children)
            .field("composite_only", &self.composite_only)
            .field("duration", &self.duration)
            .field("easing", &self.easing)
            .field("z_index", &self.z_index)
            .field("ignore_transparency", &self.ignore_transparency)
            .field("preserve_data_attributes", &self.preserve_data_attributes)
            .field("relative_to", &self.relative_to)
            .field("natural_to_clone_scale", &self.natural_to_clone_scale)
            .field("container", &self.container)
            .field("delta_handlers", &self.delta_handlers)
            .finish_non_exhaustive()
    }
}

/// Options passed to a single `illusory()` call.
#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    /// Call-site overrides.
    pub overrides: Options,
    /// Element-level defaults, also used for snapshots built by the call.
    pub element: Options,
}

impl TransitionOptions {
    pub fn new(overrides: Options) -> Self {
        Self {
            overrides,
            element: Options::default(),
        }
    }

    pub fn with_element(mut self, element: Options) -> Self {
        self.element = element;
        self
    }

    /// Apply both tiers over the global defaults.
    pub fn merged(&self, global: &Options) -> Options {
        self.overrides
            .layered_over(&self.element.layered_over(global))
    }
}

impl From<Options> for TransitionOptions {
    fn from(overrides: Options) -> Self {
        Self::new(overrides)
    }
}

/// Transition duration and timing function shared by both clones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionTiming {
    pub duration_ms: f64,
    pub easing: String,
}

impl Default for TransitionTiming {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_DURATION_MS,
            easing: DEFAULT_EASING.to_string(),
        }
    }
}

impl TransitionTiming {
    /// Unparseable durations fall back to the default duration.
    pub fn new(duration: &str, easing: &str) -> Self {
        Self {
            duration_ms: duration_ms(duration),
            easing: easing.to_string(),
        }
    }

    /// `transition` shorthand covering the animated properties.
    pub fn transition_value(&self, composite_only: bool) -> String {
        let mut properties = vec!["transform", "opacity"];
        if !composite_only {
            properties.push("border-radius");
        }
        properties
            .iter()
            .map(|property| format!("{property} {}ms {}", self.duration_ms, self.easing))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Options snapshots are constructed with.
#[derive(Clone)]
pub struct ElementOptions {
    pub include_children: bool,
    pub preserve_data_attributes: DataAttributes,
    pub process_clone: Option<ProcessClone>,
    pub natural_to_clone_scale: f64,
}

impl Default for ElementOptions {
    fn default() -> Self {
        Self {
            include_children: true,
            preserve_data_attributes: DataAttributes::Drop,
            process_clone: None,
            natural_to_clone_scale: 1.0,
        }
    }
}

impl fmt::Debug for ElementOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementOptions")
            .field("include_children", &self.include_children)
            .field("preserve_data_attributes", &self.preserve_data_attributes)
            .field("process_clone", &self.process_clone.is_some())
            .field("natural_to_clone_scale", &self.natural_to_clone_scale)
            .finish()
    }
}

/// Fully resolved options for one transition.
#[derive(Clone)]
pub struct Settings {
    pub include_children: bool,
    pub composite_only: bool,
    pub timing: TransitionTiming,
    pub z_index: i32,
    pub ignore_transparency: IgnoreTransparency,
    pub preserve_data_attributes: DataAttributes,
    pub process_clone: Option<ProcessClone>,
    pub relative_to: Vec<NodeId>,
    pub natural_to_clone_scale: f64,
    pub container: NodeId,
    pub delta_handlers: DeltaHandlers,
    pub before_attach: Option<Hook>,
    pub before_animate: Option<Hook>,
    pub before_detach: Option<DetachHook>,
}

impl Settings {
    pub fn element_options(&self) -> ElementOptions {
        ElementOptions {
            include_children: self.include_children,
            preserve_data_attributes: self.preserve_data_attributes.clone(),
            process_clone: self.process_clone.clone(),
            natural_to_clone_scale: self.natural_to_clone_scale,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("include_children", &self.include_children)
            .field("composite_only", &self.composite_only)
            .field("timing", &self.timing)
            .field("z_index", &self.z_index)
            .field("ignore_transparency", &self.ignore_transparency)
            .field("relative_to", &self.relative_to)
            .field("natural_to_clone_scale", &self.natural_to_clone_scale)
            .field("container", &self.container)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocument;

    #[test]
    fn test_defaults() {
        let doc = MemoryDocument::new();
        let settings = Options::default().resolve(&*doc);

        assert!(settings.include_children);
        assert!(!settings.composite_only);
        assert_eq!(settings.timing.duration_ms, 300.0);
        assert_eq!(settings.timing.easing, "ease");
        assert_eq!(settings.z_index, 1);
        assert_eq!(settings.ignore_transparency, IgnoreTransparency::None);
        assert!(!settings.preserve_data_attributes.keeps("data-id"));
        assert_eq!(settings.relative_to, vec![doc.root_node()]);
        assert_eq!(settings.container, doc.root_node());
        assert_eq!(settings.natural_to_clone_scale, 1.0);
    }

    #[test]
    fn test_precedence_call_over_element_over_global() {
        let global = Options::new()
            .with_duration("1s")
            .with_easing("linear")
            .with_z_index(5);
        let element = Options::new().with_duration("500ms").with_composite_only(true);
        let call = Options::new().with_duration("200ms");

        let merged = TransitionOptions::new(call)
            .with_element(element)
            .merged(&global);

        assert_eq!(merged.duration.as_deref(), Some("200ms"));
        assert_eq!(merged.composite_only, Some(true));
        assert_eq!(merged.easing.as_deref(), Some("linear"));
        assert_eq!(merged.z_index, Some(5));
    }

    #[test]
    fn test_delta_handlers_merge_by_key() {
        let base = Options::new()
            .with_delta_handler("opacity", |_, _, _| "base".to_string())
            .with_delta_handler("transform", |_, _, _| "base".to_string());
        let over = Options::new().with_delta_handler("opacity", |_, _, _| "over".to_string());

        let merged = over.layered_over(&base);
        let delta = Delta::identity();
        let opacity = merged.delta_handlers.get("opacity").unwrap();
        let transform = merged.delta_handlers.get("transform").unwrap();
        assert_eq!(opacity(&delta, "", ""), "over");
        assert_eq!(transform(&delta, "", ""), "base");
    }

    #[test]
    fn test_invalid_duration_falls_back() {
        let timing = TransitionTiming::new("soon", "ease-in");
        assert_eq!(timing.duration_ms, 300.0);
        assert_eq!(timing.easing, "ease-in");
    }

    #[test]
    fn test_transition_value() {
        let timing = TransitionTiming::new("250ms", "linear");
        assert_eq!(
            timing.transition_value(true),
            "transform 250ms linear, opacity 250ms linear"
        );
        assert!(timing.transition_value(false).ends_with("border-radius 250ms linear"));
    }

    #[test]
    fn test_ignore_transparency() {
        assert!(!IgnoreTransparency::None.ignores("IMG"));
        assert!(IgnoreTransparency::All.ignores("DIV"));
        let tags = IgnoreTransparency::Tags(vec!["img".to_string()]);
        assert!(tags.ignores("IMG"));
        assert!(!tags.ignores("DIV"));
    }

    #[test]
    fn test_data_attribute_policy() {
        assert!(DataAttributes::from(true).keeps("data-x"));
        assert!(!DataAttributes::from(false).keeps("data-x"));
        let policy = DataAttributes::filter(|name| name.starts_with("data-keep"));
        assert!(policy.keeps("data-keep-me"));
        assert!(!policy.keeps("data-other"));
    }

    #[test]
    fn test_ignore_transparency_from_json() {
        let all: IgnoreTransparency = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(all, IgnoreTransparency::All);

        let tags: IgnoreTransparency = serde_json::from_str(r#"{"tags": ["video"]}"#).unwrap();
        assert!(tags.ignores("VIDEO"));

        let decision: CloneDecision = serde_json::from_str(r#""drop""#).unwrap();
        assert_eq!(decision, CloneDecision::Drop);
    }
}
