//! Shared types for the roiscan detection tools.

use serde::{Deserialize, Serialize};

/// Re-export `DynamicImage` so canvas implementations can hand images to
/// the tools without depending on `image` directly.
pub use image::DynamicImage;

/// Re-export `GrayImage`, the intensity map every tool detects on.
pub use image::GrayImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of an image.
    #[must_use]
    pub fn of(image: &DynamicImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A requested rectangle in image pixel coordinates, origin top-left.
///
/// The request may extend past the image or be entirely outside it; it
/// is only made safe to crop with by [`crate::roi::clamp`]. A rectangle
/// with a non-positive width or height is the "no ROI" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Horizontal extent.
    pub width: i32,
    /// Vertical extent.
    pub height: i32,
}

impl Rect {
    /// The "no ROI requested" sentinel.
    pub const EMPTY: Self = Self::new(0, 0, 0, 0);

    /// Create a new rectangle.
    #[must_use]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns `true` if this is the empty sentinel (`width <= 0` or
    /// `height <= 0`).
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Exclusive right edge, widened so it cannot overflow.
    #[must_use]
    pub const fn right(self) -> i64 {
        self.x as i64 + self.width as i64
    }

    /// Exclusive bottom edge, widened so it cannot overflow.
    #[must_use]
    pub const fn bottom(self) -> i64 {
        self.y as i64 + self.height as i64
    }
}

/// A clamped region of interest.
///
/// Always non-empty and fully inside the image it was clamped against:
/// `x + width <= image.width` and `y + height <= image.height`.
/// Constructed only by [`crate::roi::clamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels (> 0).
    pub width: u32,
    /// Height in pixels (> 0).
    pub height: u32,
}

impl Region {
    /// The top-left corner, i.e. the offset that maps ROI-local
    /// coordinates back to full-image coordinates.
    #[must_use]
    pub const fn offset(self) -> (u32, u32) {
        (self.x, self.y)
    }

    /// Returns `true` if the region covers the whole of `dimensions`.
    #[must_use]
    pub const fn covers(self, dimensions: Dimensions) -> bool {
        self.x == 0
            && self.y == 0
            && self.width == dimensions.width
            && self.height == dimensions.height
    }
}

impl From<Region> for Rect {
    #[allow(clippy::cast_possible_wrap)]
    fn from(region: Region) -> Self {
        Self::new(
            region.x as i32,
            region.y as i32,
            region.width as i32,
            region.height as i32,
        )
    }
}

/// A detected line segment `(x1, y1) -> (x2, y2)` in integer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSegment {
    /// Start x.
    pub x1: i32,
    /// Start y.
    pub y1: i32,
    /// End x.
    pub x2: i32,
    /// End y.
    pub y2: i32,
}

impl LineSegment {
    /// Create a new segment.
    #[must_use]
    pub const fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Euclidean length in pixels.
    #[must_use]
    pub fn length(self) -> f64 {
        let dx = f64::from(self.x2 - self.x1);
        let dy = f64::from(self.y2 - self.y1);
        dx.hypot(dy)
    }

    /// Shift both endpoints by `(dx, dy)`.
    #[must_use]
    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x1 + dx, self.y1 + dy, self.x2 + dx, self.y2 + dy)
    }
}

/// A detected corner point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f32,
    /// Vertical position (pixels from top edge).
    pub y: f32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Shift by `(dx, dy)`.
    #[must_use]
    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// A detected circle: center plus radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Center x.
    pub x: f32,
    /// Center y.
    pub y: f32,
    /// Radius in pixels.
    pub radius: f32,
}

impl Circle {
    /// Create a new circle.
    #[must_use]
    pub const fn new(x: f32, y: f32, radius: f32) -> Self {
        Self { x, y, radius }
    }

    /// The circle's center.
    #[must_use]
    pub const fn center(self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Shift the center by `(dx, dy)`; the radius is unchanged.
    #[must_use]
    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.radius)
    }
}

/// Discriminant of a [`DetectionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    /// Nothing was run.
    None,
    /// Line segments.
    Lines,
    /// Corner points.
    Points,
    /// Circles.
    Circles,
    /// A combination of the above.
    Mixed,
}

/// The output of a single tool run.
///
/// Every coordinate is in the space of the original, uncropped image,
/// never ROI-local. Each tool produces exactly one populated variant
/// matching its kind. [`Mixed`](Self::Mixed) exists for renderers that
/// overlay several runs at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "primitives", rename_all = "snake_case")]
pub enum DetectionResult {
    /// Nothing detected because nothing was run.
    None,
    /// Segments `(x1, y1, x2, y2)`.
    Lines(Vec<LineSegment>),
    /// Points `(x, y)`.
    Points(Vec<Point>),
    /// Circles `(x, y, r)`.
    Circles(Vec<Circle>),
    /// Any combination of primitives.
    Mixed {
        /// Line segments.
        lines: Vec<LineSegment>,
        /// Corner points.
        points: Vec<Point>,
        /// Circles.
        circles: Vec<Circle>,
    },
}

impl DetectionResult {
    /// An empty result of the given kind.
    #[must_use]
    pub const fn empty(kind: DetectionKind) -> Self {
        match kind {
            DetectionKind::None => Self::None,
            DetectionKind::Lines => Self::Lines(Vec::new()),
            DetectionKind::Points => Self::Points(Vec::new()),
            DetectionKind::Circles => Self::Circles(Vec::new()),
            DetectionKind::Mixed => Self::Mixed {
                lines: Vec::new(),
                points: Vec::new(),
                circles: Vec::new(),
            },
        }
    }

    /// The result's discriminant.
    #[must_use]
    pub const fn kind(&self) -> DetectionKind {
        match self {
            Self::None => DetectionKind::None,
            Self::Lines(_) => DetectionKind::Lines,
            Self::Points(_) => DetectionKind::Points,
            Self::Circles(_) => DetectionKind::Circles,
            Self::Mixed { .. } => DetectionKind::Mixed,
        }
    }

    /// Total number of primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Lines(lines) => lines.len(),
            Self::Points(points) => points.len(),
            Self::Circles(circles) => circles.len(),
            Self::Mixed {
                lines,
                points,
                circles,
            } => lines.len() + points.len() + circles.len(),
        }
    }

    /// Returns `true` if no primitives were found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Line segments, or an empty slice for other kinds.
    #[must_use]
    pub fn lines(&self) -> &[LineSegment] {
        match self {
            Self::Lines(lines) | Self::Mixed { lines, .. } => lines,
            _ => &[],
        }
    }

    /// Corner points, or an empty slice for other kinds.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        match self {
            Self::Points(points) | Self::Mixed { points, .. } => points,
            _ => &[],
        }
    }

    /// Circles, or an empty slice for other kinds.
    #[must_use]
    pub fn circles(&self) -> &[Circle] {
        match self {
            Self::Circles(circles) | Self::Mixed { circles, .. } => circles,
            _ => &[],
        }
    }

    /// Fold another result into this one.
    ///
    /// Merging two results of the same kind keeps that kind; merging
    /// different kinds produces [`Mixed`](Self::Mixed). Merging with
    /// [`None`](Self::None) is the identity.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        match (self, other) {
            (Self::None, r) | (r, Self::None) => r,
            (Self::Lines(mut a), Self::Lines(b)) => {
                a.extend(b);
                Self::Lines(a)
            }
            (Self::Points(mut a), Self::Points(b)) => {
                a.extend(b);
                Self::Points(a)
            }
            (Self::Circles(mut a), Self::Circles(b)) => {
                a.extend(b);
                Self::Circles(a)
            }
            (a, b) => {
                let mut lines = a.lines().to_vec();
                lines.extend_from_slice(b.lines());
                let mut points = a.points().to_vec();
                points.extend_from_slice(b.points());
                let mut circles = a.circles().to_vec();
                circles.extend_from_slice(b.circles());
                Self::Mixed {
                    lines,
                    points,
                    circles,
                }
            }
        }
    }
}

/// Errors raised by a tool run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DetectionError {
    /// The image has a channel count other than 1 or 3.
    #[error("unsupported image format: expected 1 or 3 channels, got {channels}")]
    InvalidImageFormat {
        /// Channel count of the rejected image.
        channels: u8,
    },

    /// A tool parameter is outside its documented range.
    #[error("invalid tool parameters: {0}")]
    InvalidParams(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Rect / Region ---

    #[test]
    fn empty_sentinel_is_empty() {
        assert!(Rect::EMPTY.is_empty());
        assert!(Rect::default().is_empty());
        assert!(Rect::new(5, 5, 0, 10).is_empty());
        assert!(Rect::new(5, 5, 10, -1).is_empty());
        assert!(!Rect::new(5, 5, 1, 1).is_empty());
    }

    #[test]
    fn rect_edges_do_not_overflow() {
        let r = Rect::new(i32::MAX, i32::MAX, i32::MAX, i32::MAX);
        assert_eq!(r.right(), 2 * i64::from(i32::MAX));
        assert_eq!(r.bottom(), 2 * i64::from(i32::MAX));
    }

    #[test]
    fn region_covers_full_image() {
        let dims = Dimensions {
            width: 40,
            height: 30,
        };
        let full = Region {
            x: 0,
            y: 0,
            width: 40,
            height: 30,
        };
        let partial = Region {
            x: 1,
            y: 0,
            width: 39,
            height: 30,
        };
        assert!(full.covers(dims));
        assert!(!partial.covers(dims));
    }

    // --- Primitives ---

    #[test]
    fn segment_length_and_translation() {
        let s = LineSegment::new(0, 0, 3, 4);
        assert!((s.length() - 5.0).abs() < f64::EPSILON);
        assert_eq!(s.translated(10, 20), LineSegment::new(10, 20, 13, 24));
    }

    #[test]
    fn circle_translation_keeps_radius() {
        let c = Circle::new(1.0, 2.0, 7.5).translated(10.0, 20.0);
        assert_eq!(c, Circle::new(11.0, 22.0, 7.5));
        assert_eq!(c.center(), Point::new(11.0, 22.0));
    }

    #[test]
    fn point_distance_squared() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f32::EPSILON);
    }

    // --- DetectionResult ---

    #[test]
    fn empty_result_matches_requested_kind() {
        for kind in [
            DetectionKind::None,
            DetectionKind::Lines,
            DetectionKind::Points,
            DetectionKind::Circles,
            DetectionKind::Mixed,
        ] {
            let r = DetectionResult::empty(kind);
            assert_eq!(r.kind(), kind);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn accessors_return_only_matching_primitives() {
        let r = DetectionResult::Points(vec![Point::new(1.0, 1.0)]);
        assert_eq!(r.len(), 1);
        assert_eq!(r.points().len(), 1);
        assert!(r.lines().is_empty());
        assert!(r.circles().is_empty());
    }

    #[test]
    fn merge_same_kind_keeps_kind() {
        let a = DetectionResult::Lines(vec![LineSegment::new(0, 0, 1, 1)]);
        let b = DetectionResult::Lines(vec![LineSegment::new(2, 2, 3, 3)]);
        let merged = a.merge(b);
        assert_eq!(merged.kind(), DetectionKind::Lines);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merge_different_kinds_is_mixed() {
        let a = DetectionResult::Lines(vec![LineSegment::new(0, 0, 1, 1)]);
        let b = DetectionResult::Circles(vec![Circle::new(5.0, 5.0, 2.0)]);
        let merged = a.merge(b).merge(DetectionResult::None);
        assert_eq!(merged.kind(), DetectionKind::Mixed);
        assert_eq!(merged.lines().len(), 1);
        assert_eq!(merged.circles().len(), 1);
        assert!(merged.points().is_empty());
    }

    #[test]
    fn merge_with_none_is_identity() {
        let a = DetectionResult::Points(vec![Point::new(1.0, 2.0)]);
        assert_eq!(DetectionResult::None.merge(a.clone()), a);
    }

    #[test]
    fn result_serializes_with_kind_tag() {
        let r = DetectionResult::Circles(vec![Circle::new(1.0, 2.0, 3.0)]);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains(r#""kind":"circles""#), "got {json}");
        let back: DetectionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }

    // --- DetectionError ---

    #[test]
    fn invalid_format_display() {
        let err = DetectionError::InvalidImageFormat { channels: 4 };
        assert_eq!(
            err.to_string(),
            "unsupported image format: expected 1 or 3 channels, got 4",
        );
    }

    #[test]
    fn invalid_params_display() {
        let err = DetectionError::InvalidParams("rho must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "invalid tool parameters: rho must be positive"
        );
    }
}
