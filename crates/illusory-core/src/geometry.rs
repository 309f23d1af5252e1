//! Rectangles and the affine delta between two snapshots.
//!
//! The delta maps the start snapshot's box onto the end snapshot's box using a
//! translate followed by a scale. Because CSS scales around `transform-origin`
//! rather than the top-left corner, the translation carries a correction term
//! that cancels the displacement the origin would otherwise introduce.
//!
//! ```text
//! p' = origin + translate + scale * (p - origin)
//! ```

use serde::{Deserialize, Serialize};

use crate::css::parse_transform_origin;
use crate::snapshot::IllusoryElement;

/// Bounding geometry of an element in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// True when either dimension cannot be used as a divisor.
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.width > 0.0)
            || !(self.height.is_finite() && self.height > 0.0)
    }

    /// Move the rect by the given offset.
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            left: self.left + dx,
            top: self.top + dy,
            ..*self
        }
    }
}

/// A point in an element's local pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Translate + scale mapping one box onto another, with precomputed inverses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub x: f64,
    pub y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub inverse_scale_x: f64,
    pub inverse_scale_y: f64,
}

impl Default for Delta {
    fn default() -> Self {
        Self::identity()
    }
}

impl Delta {
    pub fn identity() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            inverse_scale_x: 1.0,
            inverse_scale_y: 1.0,
        }
    }

    /// Compute the delta from raw geometry.
    ///
    /// `origin` is the start box's transform-origin in its local pixel space and
    /// `natural_to_clone_scale` the compensating factor of the start snapshot.
    /// A zero or non-finite dimension on either side clamps that axis to a scale
    /// of 1 with no origin correction.
    pub fn between(start: &Rect, origin: Point, natural_to_clone_scale: f64, end: &Rect) -> Self {
        let (x, scale_x, inverse_scale_x) = resolve_axis(
            natural_to_clone_scale,
            start.left,
            start.width,
            end.left,
            end.width,
            origin.x,
        );
        let (y, scale_y, inverse_scale_y) = resolve_axis(
            natural_to_clone_scale,
            start.top,
            start.height,
            end.top,
            end.height,
            origin.y,
        );

        Self {
            x,
            y,
            scale_x,
            scale_y,
            inverse_scale_x,
            inverse_scale_y,
        }
    }

    /// Render as a CSS transform list: `translate(Xpx, Ypx) scale(SX, SY)`.
    pub fn to_css(&self) -> String {
        format!(
            "translate({}px, {}px) scale({}, {})",
            self.x, self.y, self.scale_x, self.scale_y
        )
    }
}

/// Returns `(translation, scale, inverse_scale)` for one axis.
fn resolve_axis(
    natural_to_clone_scale: f64,
    start_pos: f64,
    start_len: f64,
    end_pos: f64,
    end_len: f64,
    origin: f64,
) -> (f64, f64, f64) {
    let translation = end_pos - start_pos;
    let scale = natural_to_clone_scale * end_len / start_len;
    let inverse = 1.0 / scale;

    if !(scale.is_finite() && scale > 0.0 && inverse.is_finite()) {
        return (translation, 1.0, 1.0);
    }

    let displacement = natural_to_clone_scale * (origin / start_len) * (end_len * (1.0 - inverse));
    (translation + displacement, scale, inverse)
}

/// Compute the delta that maps `start`'s clone onto `end`'s geometry.
pub fn compute_delta(start: &IllusoryElement, end: &IllusoryElement) -> Delta {
    let start_rect = start.rect();
    let origin = parse_transform_origin(
        start.transform_origin(),
        start_rect.width,
        start_rect.height,
    );
    Delta::between(
        &start_rect,
        origin,
        start.natural_to_clone_scale(),
        &end.rect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_shrink_around_center() {
        let start = Rect::new(0.0, 0.0, 100.0, 50.0);
        let end = Rect::new(200.0, 100.0, 50.0, 25.0);
        let delta = Delta::between(&start, Point::new(50.0, 25.0), 1.0, &end);

        assert!(approx_eq(delta.scale_x, 0.5));
        assert!(approx_eq(delta.scale_y, 0.5));
        assert!(approx_eq(delta.inverse_scale_x, 2.0));
        assert!(approx_eq(delta.inverse_scale_y, 2.0));
        assert!(approx_eq(delta.x, 175.0));
        assert!(approx_eq(delta.y, 87.5));
    }

    #[test]
    fn test_top_left_origin_has_no_correction() {
        let start = Rect::new(10.0, 20.0, 100.0, 100.0);
        let end = Rect::new(60.0, 80.0, 300.0, 50.0);
        let delta = Delta::between(&start, Point::new(0.0, 0.0), 1.0, &end);

        assert!(approx_eq(delta.x, 50.0));
        assert!(approx_eq(delta.y, 60.0));
        assert!(approx_eq(delta.scale_x, 3.0));
        assert!(approx_eq(delta.scale_y, 0.5));
    }

    #[test]
    fn test_corner_lands_on_target() {
        // Applying the CSS transform around the origin must put the start box's
        // top-left corner on the end box's top-left corner.
        let start = Rect::new(30.0, 40.0, 120.0, 80.0);
        let end = Rect::new(300.0, 10.0, 60.0, 200.0);
        let origin = Point::new(90.0, 20.0);
        let delta = Delta::between(&start, origin, 1.0, &end);

        let corner_x = start.left + origin.x + delta.x + delta.scale_x * (0.0 - origin.x);
        let corner_y = start.top + origin.y + delta.y + delta.scale_y * (0.0 - origin.y);
        assert!((corner_x - end.left).abs() < 1e-9);
        assert!((corner_y - end.top).abs() < 1e-9);
    }

    #[test]
    fn test_inverse_consistency() {
        let sizes = [0.5, 1.0, 3.0, 17.25, 640.0, 1e5];
        for &w0 in &sizes {
            for &w1 in &sizes {
                let start = Rect::new(0.0, 0.0, w0, w1);
                let end = Rect::new(5.0, 5.0, w1, w0);
                let delta = Delta::between(&start, Point::new(w0 / 2.0, w1 / 2.0), 1.0, &end);
                assert!((delta.scale_x * delta.inverse_scale_x - 1.0).abs() < 1e-12);
                assert!((delta.scale_y * delta.inverse_scale_y - 1.0).abs() < 1e-12);
                assert!(delta.scale_x > 0.0 && delta.scale_y > 0.0);
            }
        }
    }

    #[test]
    fn test_zero_width_start_clamps_scale() {
        let start = Rect::new(0.0, 0.0, 0.0, 50.0);
        let end = Rect::new(40.0, 0.0, 80.0, 100.0);
        let delta = Delta::between(&start, Point::new(0.0, 25.0), 1.0, &end);

        assert_eq!(delta.scale_x, 1.0);
        assert_eq!(delta.inverse_scale_x, 1.0);
        assert!(approx_eq(delta.x, 40.0));
        assert!(approx_eq(delta.scale_y, 2.0));
        assert!(delta.y.is_finite());
    }

    #[test]
    fn test_zero_height_end_clamps_scale() {
        let start = Rect::new(0.0, 0.0, 100.0, 50.0);
        let end = Rect::new(0.0, 10.0, 100.0, 0.0);
        let delta = Delta::between(&start, Point::new(50.0, 25.0), 1.0, &end);

        assert_eq!(delta.scale_y, 1.0);
        assert_eq!(delta.inverse_scale_y, 1.0);
        assert!(approx_eq(delta.y, 10.0));
    }

    #[test]
    fn test_natural_to_clone_scale_compensation() {
        let start = Rect::new(0.0, 0.0, 100.0, 100.0);
        let end = Rect::new(0.0, 0.0, 100.0, 100.0);
        let delta = Delta::between(&start, Point::new(0.0, 0.0), 2.0, &end);

        assert!(approx_eq(delta.scale_x, 2.0));
        assert!(approx_eq(delta.inverse_scale_y, 0.5));
    }

    #[test]
    fn test_to_css() {
        let delta = Delta {
            x: 175.0,
            y: 87.5,
            scale_x: 0.5,
            scale_y: 0.5,
            inverse_scale_x: 2.0,
            inverse_scale_y: 2.0,
        };
        assert_eq!(delta.to_css(), "translate(175px, 87.5px) scale(0.5, 0.5)");
        assert_eq!(
            Delta::identity().to_css(),
            "translate(0px, 0px) scale(1, 1)"
        );
    }

    #[test]
    fn test_rect_helpers() {
        let rect = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect.right(), 40.0);
        assert_eq!(rect.bottom(), 60.0);
        assert!(!rect.is_degenerate());
        assert!(Rect::new(0.0, 0.0, 0.0, 10.0).is_degenerate());
        assert_eq!(rect.translated(-10.0, 5.0), Rect::new(0.0, 25.0, 30.0, 40.0));
    }

    #[test]
    fn test_delta_json_shape() {
        let delta = Delta::between(
            &Rect::new(0.0, 0.0, 100.0, 50.0),
            Point::new(0.0, 0.0),
            1.0,
            &Rect::new(10.0, 0.0, 200.0, 50.0),
        );
        let json = serde_json::to_value(delta).unwrap();
        assert_eq!(json["x"], 10.0);
        assert_eq!(json["scale_x"], 2.0);
        assert_eq!(json["inverse_scale_x"], 0.5);

        let parsed: Delta = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, delta);
    }
}
