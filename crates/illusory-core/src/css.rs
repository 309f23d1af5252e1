//! Small CSS value readers.
//!
//! Everything here is lenient: malformed input falls back to a documented
//! default instead of failing, because the values come from computed styles the
//! transition cannot control.

use crate::geometry::Point;

/// Transition duration used when a time string cannot be parsed.
pub const DEFAULT_DURATION_MS: f64 = 300.0;

/// One origin component before it is resolved against the box size.
#[derive(Debug, Clone, Copy, PartialEq)]
enum OriginToken {
    Left,
    Right,
    Top,
    Bottom,
    Center,
    Px(f64),
    Percent(f64),
}

impl OriginToken {
    fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "top" => Some(Self::Top),
            "bottom" => Some(Self::Bottom),
            "center" => Some(Self::Center),
            other => {
                if let Some(percent) = other.strip_suffix('%') {
                    percent.trim().parse().ok().map(Self::Percent)
                } else {
                    parse_px(other).map(Self::Px)
                }
            }
        }
    }

    fn is_vertical_keyword(self) -> bool {
        matches!(self, Self::Top | Self::Bottom)
    }

    fn is_horizontal_keyword(self) -> bool {
        matches!(self, Self::Left | Self::Right)
    }

    fn resolve_x(self, width: f64) -> Option<f64> {
        match self {
            Self::Left => Some(0.0),
            Self::Right => Some(width),
            Self::Center => Some(width * 0.5),
            Self::Px(v) => Some(v),
            Self::Percent(p) => Some(p / 100.0 * width),
            Self::Top | Self::Bottom => None,
        }
    }

    fn resolve_y(self, height: f64) -> Option<f64> {
        match self {
            Self::Top => Some(0.0),
            Self::Bottom => Some(height),
            Self::Center => Some(height * 0.5),
            Self::Px(v) => Some(v),
            Self::Percent(p) => Some(p / 100.0 * height),
            Self::Left | Self::Right => None,
        }
    }
}

/// Resolve a `<transform-origin>` value to pixels in the element's own box.
///
/// Percentages resolve against the element's own `width`/`height`. Any axis
/// that is missing or invalid falls back to the geometric center, and the z
/// component is ignored.
pub fn parse_transform_origin(value: &str, width: f64, height: f64) -> Point {
    let center = Point::new(width * 0.5, height * 0.5);
    let tokens: Vec<Option<OriginToken>> = value
        .split_whitespace()
        .take(2)
        .map(OriginToken::parse)
        .collect();

    match tokens.as_slice() {
        [] => center,
        [single] => match single {
            Some(token) if token.is_vertical_keyword() => Point::new(
                center.x,
                token.resolve_y(height).unwrap_or(center.y),
            ),
            Some(token) => Point::new(token.resolve_x(width).unwrap_or(center.x), center.y),
            None => center,
        },
        [first, second, ..] => {
            // `top left` is the same as `left top`.
            let swap = first.is_some_and(OriginToken::is_vertical_keyword)
                || second.is_some_and(OriginToken::is_horizontal_keyword);
            let (horizontal, vertical) = if swap {
                (*second, *first)
            } else {
                (*first, *second)
            };
            Point::new(
                horizontal
                    .and_then(|t| t.resolve_x(width))
                    .unwrap_or(center.x),
                vertical
                    .and_then(|t| t.resolve_y(height))
                    .unwrap_or(center.y),
            )
        }
    }
}

/// Parse a length in pixels. A bare `0` is accepted.
pub fn parse_px(value: &str) -> Option<f64> {
    let value = value.trim();
    let number = match value.strip_suffix("px") {
        Some(number) => number,
        None if value.parse::<f64>().ok() == Some(0.0) => value,
        None => return None,
    };
    number.trim().parse().ok().filter(|v: &f64| v.is_finite())
}

/// Parse a CSS `<time>` (`300ms`, `0.3s`) into milliseconds.
pub fn parse_time_ms(value: &str) -> Option<f64> {
    let value = value.trim();
    let millis = if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<f64>().ok()?
    } else if let Some(s) = value.strip_suffix('s') {
        s.trim().parse::<f64>().ok()? * 1000.0
    } else {
        return None;
    };
    (millis.is_finite() && millis >= 0.0).then_some(millis)
}

/// Like [`parse_time_ms`] but falls back to [`DEFAULT_DURATION_MS`].
pub fn duration_ms(value: &str) -> f64 {
    parse_time_ms(value).unwrap_or(DEFAULT_DURATION_MS)
}

/// Alpha channel of a CSS colour in `0.0..=1.0`, or `None` when unparseable.
pub fn parse_alpha(color: &str) -> Option<f64> {
    let color = color.trim();
    if color.is_empty() {
        return None;
    }
    csscolorparser::parse(color).ok().map(|c| c.a)
}

/// Split on `separator` while ignoring separators nested in parentheses.
pub fn split_top_level(value: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (index, ch) in value.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c == separator && depth == 0 => {
                parts.push(value[start..index].trim());
                start = index + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(value[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}

/// One entry of a `transition` shorthand.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEntry {
    pub property: String,
    pub duration_ms: f64,
    pub delay_ms: f64,
}

impl TransitionEntry {
    pub fn applies_to(&self, property: &str) -> bool {
        self.property == "all" || self.property == property
    }
}

/// Parse a `transition` shorthand such as
/// `transform 300ms ease, opacity 0.2s cubic-bezier(0.4, 0, 0.2, 1) 50ms`.
pub fn parse_transition_list(value: &str) -> Vec<TransitionEntry> {
    split_top_level(value, ',')
        .into_iter()
        .filter_map(|entry| {
            let mut property = None;
            let mut times = Vec::new();
            for token in split_top_level(entry, ' ') {
                if let Some(ms) = parse_time_ms(token) {
                    times.push(ms);
                } else if property.is_none() && !is_timing_keyword(token) {
                    property = Some(token.to_string());
                }
            }
            let property = property.unwrap_or_else(|| "all".to_string());
            (property != "none").then(|| TransitionEntry {
                property,
                duration_ms: times.first().copied().unwrap_or(0.0),
                delay_ms: times.get(1).copied().unwrap_or(0.0),
            })
        })
        .collect()
}

fn is_timing_keyword(token: &str) -> bool {
    matches!(
        token,
        "ease" | "ease-in" | "ease-out" | "ease-in-out" | "linear" | "step-start" | "step-end"
    ) || token.starts_with("cubic-bezier(")
        || token.starts_with("steps(")
        || token.starts_with("linear(")
}

/// Per-corner radii of a `border-radius` value, in CSS corner order
/// (top-left, top-right, bottom-right, bottom-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerRadii {
    pub horizontal: [f64; 4],
    pub vertical: [f64; 4],
}

impl CornerRadii {
    /// Parse pixel radii. Returns `None` for percentages or other units.
    pub fn parse(value: &str) -> Option<Self> {
        let mut halves = value.split('/');
        let horizontal = expand_corners(halves.next()?)?;
        let vertical = match halves.next() {
            Some(half) => expand_corners(half)?,
            None => horizontal,
        };
        if halves.next().is_some() {
            return None;
        }
        Some(Self {
            horizontal,
            vertical,
        })
    }

    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            horizontal: self.horizontal.map(|r| r * sx),
            vertical: self.vertical.map(|r| r * sy),
        }
    }

    pub fn to_css(&self) -> String {
        let join = |radii: &[f64; 4]| {
            radii
                .iter()
                .map(|r| format!("{r}px"))
                .collect::<Vec<_>>()
                .join(" ")
        };
        format!("{} / {}", join(&self.horizontal), join(&self.vertical))
    }
}

fn expand_corners(values: &str) -> Option<[f64; 4]> {
    let parsed = values
        .split_whitespace()
        .map(parse_px)
        .collect::<Option<Vec<f64>>>()?;
    match parsed.as_slice() {
        [a] => Some([*a, *a, *a, *a]),
        [a, b] => Some([*a, *b, *a, *b]),
        [a, b, c] => Some([*a, *b, *c, *b]),
        [a, b, c, d] => Some([*a, *b, *c, *d]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_percentages_use_own_box() {
        let p = parse_transform_origin("50% 50%", 100.0, 50.0);
        assert_eq!(p, Point::new(50.0, 25.0));

        let p = parse_transform_origin("25% 100%", 200.0, 80.0);
        assert_eq!(p, Point::new(50.0, 80.0));
    }

    #[test]
    fn test_origin_pixels() {
        let p = parse_transform_origin("20px 10px", 100.0, 50.0);
        assert_eq!(p, Point::new(20.0, 10.0));
        // z component is ignored
        let p = parse_transform_origin("20px 10px 5px", 100.0, 50.0);
        assert_eq!(p, Point::new(20.0, 10.0));
    }

    #[test]
    fn test_origin_keywords_in_any_order() {
        assert_eq!(
            parse_transform_origin("left top", 100.0, 50.0),
            Point::new(0.0, 0.0)
        );
        assert_eq!(
            parse_transform_origin("top left", 100.0, 50.0),
            Point::new(0.0, 0.0)
        );
        assert_eq!(
            parse_transform_origin("bottom right", 100.0, 50.0),
            Point::new(100.0, 50.0)
        );
        assert_eq!(
            parse_transform_origin("center bottom", 100.0, 50.0),
            Point::new(50.0, 50.0)
        );
    }

    #[test]
    fn test_origin_partial_input_falls_back_to_center() {
        assert_eq!(
            parse_transform_origin("", 100.0, 50.0),
            Point::new(50.0, 25.0)
        );
        assert_eq!(
            parse_transform_origin("10px", 100.0, 50.0),
            Point::new(10.0, 25.0)
        );
        assert_eq!(
            parse_transform_origin("top", 100.0, 50.0),
            Point::new(50.0, 0.0)
        );
        assert_eq!(
            parse_transform_origin("garbage 10px", 100.0, 50.0),
            Point::new(50.0, 10.0)
        );
        assert_eq!(
            parse_transform_origin("left right", 100.0, 50.0),
            Point::new(100.0, 25.0)
        );
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(parse_time_ms("300ms"), Some(300.0));
        assert_eq!(parse_time_ms("0.25s"), Some(250.0));
        assert_eq!(parse_time_ms("0ms"), Some(0.0));
        assert_eq!(parse_time_ms("fast"), None);
        assert_eq!(parse_time_ms("-5ms"), None);
        assert_eq!(duration_ms("nonsense"), DEFAULT_DURATION_MS);
    }

    #[test]
    fn test_parse_px() {
        assert_eq!(parse_px("12px"), Some(12.0));
        assert_eq!(parse_px(" 0 "), Some(0.0));
        assert_eq!(parse_px("12"), None);
        assert_eq!(parse_px("50%"), None);
    }

    #[test]
    fn test_parse_alpha() {
        assert_eq!(parse_alpha("transparent"), Some(0.0));
        assert_eq!(parse_alpha("rgb(10, 20, 30)"), Some(1.0));
        assert_eq!(parse_alpha("#ff000080").map(|a| (a * 100.0).round()), Some(50.0));
        assert_eq!(parse_alpha("rgba(0, 0, 0, 0.25)"), Some(0.25));
        assert_eq!(parse_alpha(""), None);
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("transform 1s cubic-bezier(0, 0, 1, 1), opacity 2s", ','),
            vec!["transform 1s cubic-bezier(0, 0, 1, 1)", "opacity 2s"]
        );
    }

    #[test]
    fn test_parse_transition_list() {
        let entries =
            parse_transition_list("transform 300ms cubic-bezier(0.4, 0, 0.2, 1), opacity 0.2s ease 50ms");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].property, "transform");
        assert_eq!(entries[0].duration_ms, 300.0);
        assert_eq!(entries[1].property, "opacity");
        assert_eq!(entries[1].duration_ms, 200.0);
        assert_eq!(entries[1].delay_ms, 50.0);
        assert!(parse_transition_list("none").is_empty());
        assert!(parse_transition_list("all 1s")[0].applies_to("border-radius"));
    }

    #[test]
    fn test_corner_radii() {
        let radii = CornerRadii::parse("10px").unwrap();
        assert_eq!(radii.horizontal, [10.0; 4]);
        assert_eq!(radii.vertical, [10.0; 4]);

        let radii = CornerRadii::parse("4px 8px / 2px").unwrap();
        assert_eq!(radii.horizontal, [4.0, 8.0, 4.0, 8.0]);
        assert_eq!(radii.vertical, [2.0; 4]);

        assert!(CornerRadii::parse("50%").is_none());
        assert_eq!(
            CornerRadii::parse("2px").unwrap().scaled(2.0, 0.5).to_css(),
            "4px 4px 4px 4px / 1px 1px 1px 1px"
        );
    }
}
