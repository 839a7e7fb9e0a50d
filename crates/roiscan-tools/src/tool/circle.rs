//! Circle detection with the gradient Hough transform.
//!
//! Pipeline: intensity crop, Gaussian blur ([`blur::CIRCLE_SIGMA`]),
//! Sobel gradients, Canny with `param1` as the high threshold and half of
//! it as the low one.
//!
//! Each edge pixel then votes along its gradient line, in both
//! directions, for every radius in range. Votes land in an accumulator
//! whose cells are `dp` pixels wide. Cells with more than `param2` votes
//! that beat their 4-neighbors are center candidates, visited strongest
//! first. A candidate closer than `min_dist` to an accepted center is
//! dropped. Otherwise its radius is the mean distance of the edge pixels
//! in the best-supported 3-pixel distance band, provided that band holds
//! at least `param2` pixels.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::{Tool, offset_f32, prepare};
use crate::blur;
use crate::edge::{self, Gradients};
use crate::types::{Circle, DetectionError, DetectionKind, DetectionResult, Region};

/// Parameters of the circle tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleParams {
    /// Inverse accumulator resolution: 1 gives cells of one pixel, 2
    /// gives cells of two pixels, and so on.
    pub dp: f64,
    /// Minimum distance between detected centers.
    pub min_dist: f64,
    /// High Canny threshold (the low one is half of it).
    pub param1: f64,
    /// Vote threshold for centers, and minimum edge support for radii.
    pub param2: f64,
    /// Smallest radius searched.
    pub min_radius: u32,
    /// Largest radius searched; 0 means bounded only by the image.
    pub max_radius: u32,
}

impl CircleParams {
    /// Default accumulator resolution.
    pub const DEFAULT_DP: f64 = 1.0;
    /// Default center spacing.
    pub const DEFAULT_MIN_DIST: f64 = 20.0;
    /// Default high Canny threshold.
    pub const DEFAULT_PARAM1: f64 = 100.0;
    /// Default vote threshold.
    pub const DEFAULT_PARAM2: f64 = 30.0;
    /// Default smallest radius.
    pub const DEFAULT_MIN_RADIUS: u32 = 0;
    /// Default largest radius (unbounded).
    pub const DEFAULT_MAX_RADIUS: u32 = 0;

    /// Check every field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::InvalidParams`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), DetectionError> {
        for (name, value) in [
            ("dp", self.dp),
            ("min_dist", self.min_dist),
            ("param1", self.param1),
            ("param2", self.param2),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DetectionError::InvalidParams(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }
        if self.max_radius != 0 && self.min_radius > self.max_radius {
            return Err(DetectionError::InvalidParams(format!(
                "min_radius {} exceeds max_radius {}",
                self.min_radius, self.max_radius
            )));
        }
        Ok(())
    }

    /// The inclusive radius range searched in an image of the given
    /// size, or `None` if it is empty.
    ///
    /// An explicit `max_radius` is capped at the image diagonal, the
    /// largest distance two pixels can be apart.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn radius_range(&self, width: u32, height: u32) -> Option<(u32, u32)> {
        let lo = self.min_radius.max(1);
        let hi = if self.max_radius == 0 {
            width.max(height)
        } else {
            let diagonal = f64::from(width).hypot(f64::from(height)).ceil() as u32;
            self.max_radius.min(diagonal)
        };
        (lo <= hi).then_some((lo, hi))
    }

    /// Accumulator cell size. Values below one pixel would only grow the
    /// grid past the image resolution, so they count as one.
    const fn cell_size(&self) -> f64 {
        self.dp.max(1.0)
    }
}

impl Default for CircleParams {
    fn default() -> Self {
        Self {
            dp: Self::DEFAULT_DP,
            min_dist: Self::DEFAULT_MIN_DIST,
            param1: Self::DEFAULT_PARAM1,
            param2: Self::DEFAULT_PARAM2,
            min_radius: Self::DEFAULT_MIN_RADIUS,
            max_radius: Self::DEFAULT_MAX_RADIUS,
        }
    }
}

/// Detects circles.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircleTool;

impl Tool for CircleTool {
    type Params = CircleParams;

    fn kind(&self) -> DetectionKind {
        DetectionKind::Circles
    }

    fn run(
        &self,
        image: &DynamicImage,
        roi: Option<Region>,
        params: &CircleParams,
    ) -> Result<DetectionResult, DetectionError> {
        let Some(gray) = prepare(image, roi)? else {
            return Ok(DetectionResult::empty(DetectionKind::Circles));
        };

        let blurred = blur::gaussian_blur(&gray, blur::CIRCLE_SIGMA);
        let circles = hough_circles(&blurred, params);

        let (dx, dy) = offset_f32(roi);
        log::debug!("circle tool: {} circles", circles.len());
        Ok(DetectionResult::Circles(
            circles.into_iter().map(|c| c.translated(dx, dy)).collect(),
        ))
    }
}

/// Vote accumulator with cells `dp` pixels wide.
struct Accumulator {
    dp: f64,
    cols: usize,
    rows: usize,
    votes: Vec<u32>,
}

impl Accumulator {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn new(width: u32, height: u32, dp: f64) -> Self {
        let cols = (f64::from(width) / dp).ceil() as usize + 1;
        let rows = (f64::from(height) / dp).ceil() as usize + 1;
        Self {
            dp,
            cols,
            rows,
            votes: vec![0; cols * rows],
        }
    }

    /// The cell containing image point `(x, y)`, if inside the grid.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn cell(&self, x: f64, y: f64) -> Option<usize> {
        let cx = (x / self.dp).round();
        let cy = (y / self.dp).round();
        if cx < 0.0 || cy < 0.0 {
            return None;
        }
        let (cx, cy) = (cx as usize, cy as usize);
        (cx < self.cols && cy < self.rows).then_some(cy * self.cols + cx)
    }

    /// Cast votes from `(x, y)` along unit direction `(ux, uy)` for radii
    /// `lo..=hi`.
    fn cast(&mut self, (x, y): (f64, f64), (ux, uy): (f64, f64), (lo, hi): (u32, u32)) {
        for r in lo..=hi {
            let r = f64::from(r);
            // A ray that leaves the grid never comes back.
            let Some(i) = self.cell(ux.mul_add(r, x), uy.mul_add(r, y)) else {
                break;
            };
            self.votes[i] += 1;
        }
    }

    /// Cells with more than `threshold` votes that beat their left and
    /// upper neighbors and are not beaten by their right and lower ones,
    /// strongest first, as `(votes, col, row)`.
    fn centers(&self, threshold: f64) -> Vec<(u32, usize, usize)> {
        let v = |c: usize, r: usize| self.votes[r * self.cols + c];
        let mut out = Vec::new();
        for row in 1..self.rows.saturating_sub(1) {
            for col in 1..self.cols.saturating_sub(1) {
                let here = v(col, row);
                if f64::from(here) > threshold
                    && here > v(col - 1, row)
                    && here >= v(col + 1, row)
                    && here > v(col, row - 1)
                    && here >= v(col, row + 1)
                {
                    out.push((here, col, row));
                }
            }
        }
        out.sort_by(|a, b| b.0.cmp(&a.0));
        out
    }
}

/// Run the gradient Hough stage on an already-smoothed intensity map.
///
/// Returns circles in local coordinates, strongest center first. Empty
/// when the radius range is empty or `dp` is not positive.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn hough_circles(image: &GrayImage, params: &CircleParams) -> Vec<Circle> {
    let (width, height) = image.dimensions();
    if !params.dp.is_finite() || params.dp <= 0.0 {
        return Vec::new();
    }
    let Some(radii) = params.radius_range(width, height) else {
        log::debug!(
            "circle tool: empty radius range {}..={}",
            params.min_radius,
            params.max_radius
        );
        return Vec::new();
    };

    let gradients = Gradients::sobel(image);
    let high = params.param1 as f32;
    let edges = edge::canny_from_gradients(&gradients, high / 2.0, high);
    let pixels = edge::edge_pixels(&edges);
    if pixels.is_empty() {
        return Vec::new();
    }

    let dp = params.cell_size();
    let mut acc = Accumulator::new(width, height, dp);
    for &(x, y) in &pixels {
        let (gx, gy) = gradients.at(x, y);
        let mag = gx.hypot(gy);
        if mag <= 0.0 {
            continue;
        }
        let origin = (f64::from(x), f64::from(y));
        let (ux, uy) = (f64::from(gx / mag), f64::from(gy / mag));
        acc.cast(origin, (ux, uy), radii);
        acc.cast(origin, (-ux, -uy), radii);
    }

    let min_dist_sq = params.min_dist * params.min_dist;
    let mut circles: Vec<Circle> = Vec::new();
    for (_, col, row) in acc.centers(params.param2) {
        let cx = col as f64 * dp;
        let cy = row as f64 * dp;
        let crowded = circles.iter().any(|c| {
            let dx = f64::from(c.x) - cx;
            let dy = f64::from(c.y) - cy;
            dx.mul_add(dx, dy * dy) < min_dist_sq
        });
        if crowded {
            continue;
        }
        if let Some(radius) = estimate_radius((cx, cy), &pixels, radii, params.param2) {
            circles.push(Circle::new(cx as f32, cy as f32, radius));
        }
    }
    circles
}

/// Best-supported radius around `center`.
///
/// Edge-pixel distances in `lo..=hi` are binned per whole pixel; the
/// 3-bin band with the most pixels wins, ties going to the smaller
/// radius. Returns the mean distance in that band, or `None` if it holds
/// fewer than `min_support` pixels.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn estimate_radius(
    (cx, cy): (f64, f64),
    pixels: &[(u32, u32)],
    (lo, hi): (u32, u32),
    min_support: f64,
) -> Option<f32> {
    let bins = hi as usize + 2;
    let mut counts = vec![0_u32; bins];
    let mut sums = vec![0.0_f64; bins];
    for &(x, y) in pixels {
        let d = (f64::from(x) - cx).hypot(f64::from(y) - cy);
        if d < f64::from(lo) || d > f64::from(hi) {
            continue;
        }
        let b = d.round() as usize;
        counts[b] += 1;
        sums[b] += d;
    }

    let mut best: Option<(u32, usize)> = None;
    for b in lo as usize..=hi as usize {
        let band = b.saturating_sub(1)..=(b + 1).min(bins - 1);
        let support: u32 = counts[band].iter().sum();
        if best.is_none_or(|(s, _)| support > s) {
            best = Some((support, b));
        }
    }

    let (support, b) = best?;
    if support == 0 || f64::from(support) < min_support {
        return None;
    }
    let band = b.saturating_sub(1)..=(b + 1).min(bins - 1);
    let total: f64 = sums[band].iter().sum();
    Some((total / f64::from(support)) as f32)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::Luma;

    /// Bright filled disk on a dark background.
    fn disk(size: u32, cx: i64, cy: i64, r: i64) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let dx = i64::from(x) - cx;
            let dy = i64::from(y) - cy;
            if dx * dx + dy * dy < r * r {
                Luma([240])
            } else {
                Luma([15])
            }
        })
    }

    fn near(c: &Circle, x: f32, y: f32, r: f32, tol: f32) -> bool {
        (c.x - x).abs() <= tol && (c.y - y).abs() <= tol && (c.radius - r).abs() <= tol
    }

    // --- Params ---

    #[test]
    fn defaults_match_constants() {
        let p = CircleParams::default();
        assert!((p.dp - 1.0).abs() < f64::EPSILON);
        assert!((p.min_dist - 20.0).abs() < f64::EPSILON);
        assert!((p.param1 - 100.0).abs() < f64::EPSILON);
        assert!((p.param2 - 30.0).abs() < f64::EPSILON);
        assert_eq!((p.min_radius, p.max_radius), (0, 0));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn out_of_range_params_are_rejected() {
        for p in [
            CircleParams {
                dp: 0.0,
                ..CircleParams::default()
            },
            CircleParams {
                min_dist: -1.0,
                ..CircleParams::default()
            },
            CircleParams {
                param1: f64::INFINITY,
                ..CircleParams::default()
            },
            CircleParams {
                param2: 0.0,
                ..CircleParams::default()
            },
            CircleParams {
                min_radius: 50,
                max_radius: 10,
                ..CircleParams::default()
            },
        ] {
            assert!(p.validate().is_err(), "{p:?}");
        }
    }

    #[test]
    fn radius_range_handles_unbounded_and_inverted() {
        let p = CircleParams::default();
        assert_eq!(p.radius_range(80, 120), Some((1, 120)));
        let inverted = CircleParams {
            min_radius: 40,
            max_radius: 10,
            ..CircleParams::default()
        };
        assert_eq!(inverted.radius_range(80, 120), None);
    }

    #[test]
    fn explicit_max_radius_is_capped_at_diagonal() {
        let huge = CircleParams {
            max_radius: u32::MAX,
            ..CircleParams::default()
        };
        assert!(huge.validate().is_ok());
        assert_eq!(huge.radius_range(80, 60), Some((1, 100)));
        let too_far = CircleParams {
            min_radius: 500,
            max_radius: u32::MAX,
            ..CircleParams::default()
        };
        assert_eq!(too_far.radius_range(80, 60), None);
    }

    #[test]
    fn sub_pixel_dp_uses_one_pixel_cells() {
        let fine = CircleParams {
            dp: 1e-9,
            ..CircleParams::default()
        };
        assert!(fine.validate().is_ok());
        assert!((fine.cell_size() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn huge_max_radius_still_finds_disk() {
        let img = DynamicImage::ImageLuma8(disk(64, 32, 32, 15));
        let params = CircleParams {
            param2: 10.0,
            max_radius: u32::MAX,
            ..CircleParams::default()
        };
        assert!(params.validate().is_ok());
        let r = CircleTool.run(&img, None, &params).unwrap();
        assert!(
            r.circles().iter().any(|c| near(c, 32.0, 32.0, 15.0, 3.0)),
            "{:?}",
            r.circles()
        );
    }

    // --- Detection ---

    #[test]
    fn uniform_image_has_no_circles() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([100])));
        let r = CircleTool.run(&img, None, &CircleParams::default()).unwrap();
        assert_eq!(r, DetectionResult::Circles(Vec::new()));
    }

    #[test]
    fn disk_is_found() {
        let img = DynamicImage::ImageLuma8(disk(100, 50, 50, 30));
        let params = CircleParams {
            param2: 20.0,
            min_radius: 10,
            max_radius: 40,
            ..CircleParams::default()
        };
        let r = CircleTool.run(&img, None, &params).unwrap();
        assert!(
            r.circles().iter().any(|c| near(c, 50.0, 50.0, 30.0, 3.0)),
            "{:?}",
            r.circles()
        );
    }

    #[test]
    fn coarse_accumulator_still_finds_disk() {
        let params = CircleParams {
            dp: 2.0,
            param2: 20.0,
            min_radius: 10,
            max_radius: 40,
            ..CircleParams::default()
        };
        let blurred = blur::gaussian_blur(&disk(100, 50, 50, 30), blur::CIRCLE_SIGMA);
        let circles = hough_circles(&blurred, &params);
        assert!(
            circles.iter().any(|c| near(c, 50.0, 50.0, 30.0, 3.0)),
            "{circles:?}"
        );
    }

    #[test]
    fn inverted_radius_range_is_empty() {
        let img = DynamicImage::ImageLuma8(disk(100, 50, 50, 30));
        let params = CircleParams {
            min_radius: 40,
            max_radius: 10,
            ..CircleParams::default()
        };
        let r = CircleTool.run(&img, None, &params).unwrap();
        assert_eq!(r, DetectionResult::Circles(Vec::new()));
    }

    #[test]
    fn roi_offsets_center_into_image_space() {
        let img = DynamicImage::ImageLuma8(disk(120, 60, 60, 15));
        let roi = Region {
            x: 30,
            y: 30,
            width: 60,
            height: 60,
        };
        let params = CircleParams {
            param2: 20.0,
            min_radius: 5,
            max_radius: 25,
            ..CircleParams::default()
        };
        let r = CircleTool.run(&img, Some(roi), &params).unwrap();
        assert!(
            r.circles().iter().any(|c| near(c, 60.0, 60.0, 15.0, 3.0)),
            "{:?}",
            r.circles()
        );
    }

    #[test]
    fn centers_respect_min_dist() {
        let img = GrayImage::from_fn(160, 80, |x, y| {
            let inside = |cx: i64| {
                let dx = i64::from(x) - cx;
                let dy = i64::from(y) - 40;
                dx * dx + dy * dy < 15 * 15
            };
            Luma([if inside(40) || inside(120) { 220 } else { 20 }])
        });
        let params = CircleParams {
            min_dist: 30.0,
            param2: 20.0,
            min_radius: 8,
            max_radius: 25,
            ..CircleParams::default()
        };
        let circles = hough_circles(&blur::gaussian_blur(&img, blur::CIRCLE_SIGMA), &params);
        assert!(circles.iter().any(|c| near(c, 40.0, 40.0, 15.0, 3.0)));
        assert!(circles.iter().any(|c| near(c, 120.0, 40.0, 15.0, 3.0)));
        for (i, a) in circles.iter().enumerate() {
            for b in &circles[i + 1..] {
                assert!(a.center().distance_squared(b.center()) >= 900.0);
            }
        }
    }
}
