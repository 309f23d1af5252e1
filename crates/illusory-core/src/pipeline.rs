//! Maps a [`Delta`] onto the animated CSS properties.
//!
//! The "from" clone animates toward the target geometry while the "to" clone
//! starts at the reverse delta and animates back to its captured styles.
//! Only `transform`, `opacity` and `border-radius` are ever written.

use crate::css::CornerRadii;
use crate::geometry::Delta;
use crate::options::{DeltaHandlers, IgnoreTransparency, Settings};
use crate::snapshot::IllusoryElement;

/// Property writes in application order.
pub type StyleWrites = Vec<(&'static str, String)>;

/// Default `transform` handler: the delta followed by the clone's own transform.
pub fn default_transform(_delta: &Delta, computed: &str, current: &str) -> String {
    let current = current.trim();
    if current.is_empty() || current == "none" {
        computed.to_string()
    } else {
        format!("{computed} {current}")
    }
}

/// `radius` expressed in the pre-scale space of a clone scaled by `delta`.
///
/// Radii that are not plain pixel values pass through unchanged.
pub fn corrected_radius(radius: &str, delta: &Delta) -> String {
    match CornerRadii::parse(radius) {
        Some(radii) => radii
            .scaled(delta.inverse_scale_x, delta.inverse_scale_y)
            .to_css(),
        None => radius.to_string(),
    }
}

/// Whether the "from" clone fades out while the "to" clone fades in.
pub fn should_cross_fade(to: &IllusoryElement, ignore: &IgnoreTransparency) -> bool {
    !ignore.ignores(&to.tag_name()) && !to.has_opaque_background()
}

/// Whether the captured opacity is zero, so fading to or from `"0"` changes nothing.
pub fn is_transparent(element: &IllusoryElement) -> bool {
    element
        .captured_style("opacity")
        .and_then(|value| value.trim().parse::<f64>().ok())
        == Some(0.0)
}

fn resolve(
    handlers: &DeltaHandlers,
    property: &'static str,
    delta: &Delta,
    computed: String,
    current: &str,
) -> String {
    match handlers.get(property) {
        Some(handler) => handler(delta, &computed, current),
        None if property == "transform" => default_transform(delta, &computed, current),
        None => computed,
    }
}

/// Styles that carry the "from" clone onto the target geometry.
pub fn animate_styles(
    delta: &Delta,
    from: &IllusoryElement,
    to: &IllusoryElement,
    settings: &Settings,
    cross_fade: bool,
) -> StyleWrites {
    let handlers = &settings.delta_handlers;
    let current = |property: &str| from.captured_style(property).unwrap_or_default().to_string();

    let mut writes = vec![(
        "transform",
        resolve(handlers, "transform", delta, delta.to_css(), &current("transform")),
    )];

    if cross_fade || handlers.get("opacity").is_some() {
        let computed = if cross_fade {
            "0".to_string()
        } else {
            current("opacity")
        };
        writes.push((
            "opacity",
            resolve(handlers, "opacity", delta, computed, &current("opacity")),
        ));
    }

    if !settings.composite_only {
        let target = to.captured_style("border-radius").unwrap_or_default();
        let computed = corrected_radius(target, delta);
        writes.push((
            "border-radius",
            resolve(
                handlers,
                "border-radius",
                delta,
                computed,
                &current("border-radius"),
            ),
        ));
    }

    writes
}

/// Initial styles for the "to" clone, written before the first flush.
///
/// `reverse` maps the "to" clone back onto the "from" geometry.
pub fn starting_styles(
    reverse: &Delta,
    to: &IllusoryElement,
    from: &IllusoryElement,
    composite_only: bool,
) -> StyleWrites {
    let current = to.captured_style("transform").unwrap_or_default();
    let mut writes = vec![
        (
            "transform",
            default_transform(reverse, &reverse.to_css(), current),
        ),
        ("opacity", "0".to_string()),
    ];
    if !composite_only {
        let radius = from.captured_style("border-radius").unwrap_or_default();
        writes.push(("border-radius", corrected_radius(radius, reverse)));
    }
    writes
}

/// The "to" clone's captured styles, which it animates back to.
pub fn resting_styles(to: &IllusoryElement, composite_only: bool) -> StyleWrites {
    let mut properties = vec!["transform", "opacity"];
    if !composite_only {
        properties.push("border-radius");
    }
    properties
        .into_iter()
        .map(|property| {
            (
                property,
                to.captured_style(property).unwrap_or_default().to_string(),
            )
        })
        .collect()
}

pub fn apply(element: &IllusoryElement, writes: &StyleWrites) {
    for (property, value) in writes {
        element.set_style(property, value);
    }
}
