//! Region-of-interest clamping and selection.
//!
//! [`clamp`] turns a raw, caller-supplied [`Rect`] into a [`Region`] that
//! is safe to crop with, or `None` meaning "use the full image". Every
//! tool goes through it identically.
//!
//! [`RoiSelection`] models the drag gesture that produces the raw
//! rectangle (press, move, release) without tying it to any input or
//! event framework.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, Rect, Region};

/// Intersect `requested` with the image bounds `(0, 0, W, H)`.
///
/// Returns `None` ("no ROI": run on the full image with no offset) when
/// `requested` is the empty sentinel or when the intersection is empty.
/// Otherwise the returned region satisfies `x + width <= W` and
/// `y + height <= H`.
#[must_use]
pub fn clamp(dimensions: Dimensions, requested: Rect) -> Option<Region> {
    if requested.is_empty() || dimensions.is_empty() {
        return None;
    }

    let left = i64::from(requested.x).max(0);
    let top = i64::from(requested.y).max(0);
    let right = requested.right().min(i64::from(dimensions.width));
    let bottom = requested.bottom().min(i64::from(dimensions.height));

    if right <= left || bottom <= top {
        log::debug!("ROI {requested:?} lies outside {dimensions:?}, using full image");
        return None;
    }

    // All four values are within [0, u32::MAX] after the min/max above.
    let to_u32 = |v: i64| u32::try_from(v).ok();
    Some(Region {
        x: to_u32(left)?,
        y: to_u32(top)?,
        width: to_u32(right - left)?,
        height: to_u32(bottom - top)?,
    })
}

/// A position in image (scene) coordinates, possibly fractional and
/// possibly outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenePos {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position.
    pub y: f64,
}

impl ScenePos {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Normalize two drag corners into a rectangle with non-negative extents,
/// truncating to whole pixels.
#[allow(clippy::cast_possible_truncation)]
fn rect_between(a: ScenePos, b: ScenePos) -> Rect {
    let x = a.x.min(b.x);
    let y = a.y.min(b.y);
    let width = (b.x - a.x).abs();
    let height = (b.y - a.y).abs();
    Rect::new(x as i32, y as i32, width as i32, height as i32)
}

/// Drag-to-select state machine for a single rectangular ROI.
///
/// ```text
/// Idle --press--> Dragging --release--> Committed
///  ^                 |  ^                   |
///  +-----clear-------+  +-------press-------+
/// ```
///
/// Only one ROI exists at a time: pressing while committed discards the
/// previous rectangle and starts a new drag.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum RoiSelection {
    /// No gesture in progress and no committed rectangle.
    #[default]
    Idle,
    /// A drag is in progress.
    Dragging {
        /// Where the press happened.
        start: ScenePos,
        /// The latest pointer position.
        current: ScenePos,
    },
    /// A drag finished and produced this rectangle.
    Committed(Rect),
}

impl RoiSelection {
    /// Begin a drag at `pos`.
    pub fn press(&mut self, pos: ScenePos) {
        *self = Self::Dragging {
            start: pos,
            current: pos,
        };
    }

    /// Track the pointer during a drag. Ignored in other states.
    pub fn drag(&mut self, pos: ScenePos) {
        if let Self::Dragging { current, .. } = self {
            *current = pos;
        }
    }

    /// Finish a drag at `pos`, committing the rectangle.
    ///
    /// Returns the committed rectangle, or `None` if no drag was in
    /// progress (the state is left unchanged in that case). A zero-area
    /// drag is still committed; it simply is not a valid ROI.
    pub fn release(&mut self, pos: ScenePos) -> Option<Rect> {
        let Self::Dragging { start, .. } = *self else {
            return None;
        };
        let rect = rect_between(start, pos);
        *self = Self::Committed(rect);
        Some(rect)
    }

    /// Discard any gesture or committed rectangle.
    pub fn clear(&mut self) {
        *self = Self::Idle;
    }

    /// The rectangle to display: the live rubber band while dragging, the
    /// committed rectangle afterwards, or the empty sentinel when idle.
    #[must_use]
    pub fn rect(&self) -> Rect {
        match *self {
            Self::Idle => Rect::EMPTY,
            Self::Dragging { start, current } => rect_between(start, current),
            Self::Committed(rect) => rect,
        }
    }

    /// The committed rectangle, or the empty sentinel if none.
    #[must_use]
    pub const fn committed(&self) -> Rect {
        match *self {
            Self::Committed(rect) => rect,
            _ => Rect::EMPTY,
        }
    }

    /// Returns `true` once a rectangle with positive width and height has
    /// been committed.
    #[must_use]
    pub const fn has_valid_roi(&self) -> bool {
        !self.committed().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIMS: Dimensions = Dimensions {
        width: 100,
        height: 80,
    };

    // --- clamp ---

    #[test]
    fn empty_sentinel_means_no_roi() {
        assert_eq!(clamp(DIMS, Rect::EMPTY), None);
        assert_eq!(clamp(DIMS, Rect::new(10, 10, 0, 20)), None);
        assert_eq!(clamp(DIMS, Rect::new(10, 10, 20, -3)), None);
    }

    #[test]
    fn inside_rect_is_unchanged() {
        let r = clamp(DIMS, Rect::new(10, 20, 30, 40));
        assert_eq!(
            r,
            Some(Region {
                x: 10,
                y: 20,
                width: 30,
                height: 40
            })
        );
    }

    #[test]
    fn overhanging_rect_is_trimmed() {
        let r = clamp(DIMS, Rect::new(-5, 70, 50, 50));
        assert_eq!(
            r,
            Some(Region {
                x: 0,
                y: 70,
                width: 45,
                height: 10
            })
        );
    }

    #[test]
    fn rect_larger_than_image_becomes_full_image() {
        let r = clamp(DIMS, Rect::new(-10, -10, 1000, 1000));
        assert!(r.is_some_and(|r| r.covers(DIMS)));
    }

    #[test]
    fn disjoint_rect_means_no_roi() {
        assert_eq!(clamp(DIMS, Rect::new(100, 0, 10, 10)), None);
        assert_eq!(clamp(DIMS, Rect::new(0, 80, 10, 10)), None);
        assert_eq!(clamp(DIMS, Rect::new(-20, -20, 20, 20)), None);
    }

    #[test]
    fn zero_area_image_means_no_roi() {
        let dims = Dimensions {
            width: 0,
            height: 10,
        };
        assert_eq!(clamp(dims, Rect::new(0, 0, 5, 5)), None);
    }

    #[test]
    fn extreme_coordinates_do_not_overflow() {
        let r = clamp(DIMS, Rect::new(i32::MAX, i32::MAX, i32::MAX, i32::MAX));
        assert_eq!(r, None);
        let r = clamp(DIMS, Rect::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX));
        assert_eq!(r, None);
    }

    #[test]
    fn clamped_region_is_always_inside_bounds() {
        for x in (-120..120).step_by(17) {
            for y in (-90..90).step_by(13) {
                for w in [1, 7, 50, 300] {
                    for h in [1, 9, 40, 200] {
                        if let Some(r) = clamp(DIMS, Rect::new(x, y, w, h)) {
                            assert!(r.width > 0 && r.height > 0);
                            assert!(r.x + r.width <= DIMS.width, "{r:?}");
                            assert!(r.y + r.height <= DIMS.height, "{r:?}");
                        }
                    }
                }
            }
        }
    }

    // --- RoiSelection ---

    #[test]
    fn default_is_idle_without_roi() {
        let sel = RoiSelection::default();
        assert_eq!(sel, RoiSelection::Idle);
        assert!(!sel.has_valid_roi());
        assert_eq!(sel.rect(), Rect::EMPTY);
    }

    #[test]
    fn drag_produces_normalized_rect() {
        let mut sel = RoiSelection::default();
        sel.press(ScenePos::new(50.7, 40.2));
        sel.drag(ScenePos::new(20.0, 60.0));
        assert_eq!(sel.rect(), Rect::new(20, 40, 30, 19));
        assert!(!sel.has_valid_roi(), "not committed while dragging");

        let committed = sel.release(ScenePos::new(10.0, 10.0));
        assert_eq!(committed, Some(Rect::new(10, 10, 40, 30)));
        assert!(sel.has_valid_roi());
        assert_eq!(sel.committed(), Rect::new(10, 10, 40, 30));
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut sel = RoiSelection::default();
        assert_eq!(sel.release(ScenePos::new(5.0, 5.0)), None);
        assert_eq!(sel, RoiSelection::Idle);
    }

    #[test]
    fn drag_outside_dragging_is_ignored() {
        let mut sel = RoiSelection::Committed(Rect::new(1, 2, 3, 4));
        sel.drag(ScenePos::new(50.0, 50.0));
        assert_eq!(sel.committed(), Rect::new(1, 2, 3, 4));
    }

    #[test]
    fn zero_area_release_is_committed_but_invalid() {
        let mut sel = RoiSelection::default();
        sel.press(ScenePos::new(5.0, 5.0));
        let r = sel.release(ScenePos::new(5.0, 30.0));
        assert_eq!(r, Some(Rect::new(5, 5, 0, 25)));
        assert!(!sel.has_valid_roi());
    }

    #[test]
    fn press_while_committed_starts_new_drag() {
        let mut sel = RoiSelection::Committed(Rect::new(1, 2, 3, 4));
        sel.press(ScenePos::new(9.0, 9.0));
        assert!(matches!(sel, RoiSelection::Dragging { .. }));
        assert!(!sel.has_valid_roi());
    }

    #[test]
    fn clear_returns_to_idle() {
        let mut sel = RoiSelection::Committed(Rect::new(1, 2, 3, 4));
        sel.clear();
        assert_eq!(sel, RoiSelection::Idle);
    }
}
