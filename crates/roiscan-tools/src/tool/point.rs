//! Corner point detection (Shi-Tomasi "good features to track").
//!
//! The corner response of a pixel is the smaller eigenvalue of its
//! structure tensor, integrated over a small Gaussian window
//! ([`WINDOW_SIGMA`]). That window is the tool's smoothing step; the
//! intensity map itself is not blurred.
//!
//! Pixels whose response reaches `quality_level` times the strongest
//! response and that are local maxima become candidates. Candidates are
//! accepted strongest first, skipping any within `min_distance` of an
//! already accepted corner, until `max_corners` is reached.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma};
use rstar::RTree;
use serde::{Deserialize, Serialize};

use super::{Tool, offset_f32, prepare};
use crate::edge::Gradients;
use crate::types::{DetectionError, DetectionKind, DetectionResult, Point, Region};

/// Sigma of the Gaussian window the structure tensor is summed over.
pub const WINDOW_SIGMA: f32 = 1.0;

/// Parameters of the point tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointParams {
    /// Maximum number of corners returned.
    pub max_corners: u32,
    /// Minimum accepted response, relative to the strongest one.
    pub quality_level: f64,
    /// Minimum Euclidean distance between returned corners.
    pub min_distance: f64,
}

impl PointParams {
    /// Default corner cap.
    pub const DEFAULT_MAX_CORNERS: u32 = 500;
    /// Default relative quality.
    pub const DEFAULT_QUALITY_LEVEL: f64 = 0.01;
    /// Default spacing.
    pub const DEFAULT_MIN_DISTANCE: f64 = 10.0;

    /// Check every field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::InvalidParams`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.max_corners == 0 {
            return Err(DetectionError::InvalidParams(
                "max_corners must be at least 1".to_string(),
            ));
        }
        if self.quality_level.is_nan() || self.quality_level <= 0.0 || self.quality_level > 1.0 {
            return Err(DetectionError::InvalidParams(format!(
                "quality_level must be in (0, 1], got {}",
                self.quality_level
            )));
        }
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            return Err(DetectionError::InvalidParams(format!(
                "min_distance must be non-negative, got {}",
                self.min_distance
            )));
        }
        Ok(())
    }
}

impl Default for PointParams {
    fn default() -> Self {
        Self {
            max_corners: Self::DEFAULT_MAX_CORNERS,
            quality_level: Self::DEFAULT_QUALITY_LEVEL,
            min_distance: Self::DEFAULT_MIN_DISTANCE,
        }
    }
}

/// Detects corner points.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointTool;

impl Tool for PointTool {
    type Params = PointParams;

    fn kind(&self) -> DetectionKind {
        DetectionKind::Points
    }

    fn run(
        &self,
        image: &DynamicImage,
        roi: Option<Region>,
        params: &PointParams,
    ) -> Result<DetectionResult, DetectionError> {
        let Some(gray) = prepare(image, roi)? else {
            return Ok(DetectionResult::empty(DetectionKind::Points));
        };

        let corners = good_features(&gray, params);
        let (dx, dy) = offset_f32(roi);
        log::debug!("point tool: {} corners", corners.len());
        Ok(DetectionResult::Points(
            corners.into_iter().map(|p| p.translated(dx, dy)).collect(),
        ))
    }
}

/// Minimum eigenvalue of the windowed structure tensor at every pixel,
/// row-major.
fn min_eigenvalues(image: &GrayImage) -> Vec<f32> {
    let (width, height) = image.dimensions();
    let g = Gradients::sobel(image);

    let tensor = |f: fn(f32, f32) -> f32| {
        ImageBuffer::<Luma<f32>, Vec<f32>>::from_fn(width, height, |x, y| {
            let (dx, dy) = g.at(x, y);
            Luma([f(dx, dy)])
        })
    };
    let xx = imageproc::filter::gaussian_blur_f32(&tensor(|dx, _| dx * dx), WINDOW_SIGMA);
    let xy = imageproc::filter::gaussian_blur_f32(&tensor(|dx, dy| dx * dy), WINDOW_SIGMA);
    let yy = imageproc::filter::gaussian_blur_f32(&tensor(|_, dy| dy * dy), WINDOW_SIGMA);

    xx.as_raw()
        .iter()
        .zip(xy.as_raw())
        .zip(yy.as_raw())
        .map(|((&a, &b), &c)| {
            let half_trace = (a + c) * 0.5;
            let half_diff = (a - c) * 0.5;
            half_trace - half_diff.hypot(b)
        })
        .collect()
}

/// Find up to `max_corners` corners in local coordinates, strongest
/// first.
///
/// Candidates come from interior pixels only. A candidate at most
/// `min_distance` from an accepted corner is skipped.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn good_features(image: &GrayImage, params: &PointParams) -> Vec<Point> {
    let (width, height) = image.dimensions();
    if width < 3 || height < 3 || params.max_corners == 0 {
        return Vec::new();
    }

    let response = min_eigenvalues(image);
    let at = |x: u32, y: u32| response[y as usize * width as usize + x as usize];
    let strongest = response.iter().copied().fold(0.0_f32, f32::max);
    if strongest <= 0.0 {
        return Vec::new();
    }
    let cutoff = params.quality_level as f32 * strongest;

    // Row-major scan, so the stable sort below breaks ties by position.
    let mut candidates = Vec::new();
    for y in 1..height - 1 {
        for x in 1..width - 1 {
            let v = at(x, y);
            if v <= 0.0 || v < cutoff {
                continue;
            }
            let is_max = (y - 1..=y + 1)
                .flat_map(|ny| (x - 1..=x + 1).map(move |nx| (nx, ny)))
                .all(|(nx, ny)| at(nx, ny) <= v);
            if is_max {
                candidates.push((v, x, y));
            }
        }
    }
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let limit = params.max_corners as usize;
    let min_distance_sq = (params.min_distance * params.min_distance) as f32;
    let mut accepted: RTree<[f32; 2]> = RTree::new();
    let mut corners = Vec::new();
    for (_, x, y) in candidates {
        if corners.len() >= limit {
            break;
        }
        let p = [x as f32, y as f32];
        if min_distance_sq > 0.0
            && accepted
                .locate_within_distance(p, min_distance_sq)
                .next()
                .is_some()
        {
            continue;
        }
        accepted.insert(p);
        corners.push(Point::new(p[0], p[1]));
    }
    corners
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    /// 60x60 black image with a white square covering `20..40` on both
    /// axes. Its corners sit at roughly (20, 20), (39, 20), (20, 39),
    /// (39, 39).
    fn square() -> GrayImage {
        GrayImage::from_fn(60, 60, |x, y| {
            if (20..40).contains(&x) && (20..40).contains(&y) {
                Luma([255])
            } else {
                Luma([0])
            }
        })
    }

    fn checkerboard(cell: u32, cells: u32) -> GrayImage {
        GrayImage::from_fn(cell * cells, cell * cells, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Luma([230])
            } else {
                Luma([25])
            }
        })
    }

    fn near(p: Point, x: f32, y: f32, tol: f32) -> bool {
        (p.x - x).abs() <= tol && (p.y - y).abs() <= tol
    }

    // --- Params ---

    #[test]
    fn defaults_match_constants() {
        let p = PointParams::default();
        assert_eq!(p.max_corners, 500);
        assert!((p.quality_level - 0.01).abs() < f64::EPSILON);
        assert!((p.min_distance - 10.0).abs() < f64::EPSILON);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn out_of_range_params_are_rejected() {
        for p in [
            PointParams {
                max_corners: 0,
                ..PointParams::default()
            },
            PointParams {
                quality_level: 0.0,
                ..PointParams::default()
            },
            PointParams {
                quality_level: 1.5,
                ..PointParams::default()
            },
            PointParams {
                min_distance: -1.0,
                ..PointParams::default()
            },
        ] {
            assert!(p.validate().is_err(), "{p:?}");
        }
    }

    // --- Detection ---

    #[test]
    fn uniform_image_has_no_corners() {
        let img = GrayImage::from_pixel(40, 40, Luma([77]));
        assert!(good_features(&img, &PointParams::default()).is_empty());
    }

    #[test]
    fn tiny_image_has_no_corners() {
        let img = GrayImage::from_fn(2, 2, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
        assert!(good_features(&img, &PointParams::default()).is_empty());
    }

    #[test]
    fn square_corners_are_found() {
        let corners = good_features(&square(), &PointParams::default());
        let expected = [(20.0, 20.0), (39.0, 20.0), (20.0, 39.0), (39.0, 39.0)];
        for (x, y) in expected {
            assert!(
                corners.iter().any(|&p| near(p, x, y, 3.0)),
                "no corner near ({x}, {y}): {corners:?}"
            );
        }
        for p in &corners {
            assert!(
                expected.iter().any(|&(x, y)| near(*p, x, y, 3.0)),
                "unexpected corner {p:?}"
            );
        }
    }

    #[test]
    fn max_corners_caps_output() {
        let img = checkerboard(8, 8);
        let params = PointParams {
            max_corners: 5,
            min_distance: 1.0,
            ..PointParams::default()
        };
        assert_eq!(good_features(&img, &params).len(), 5);
    }

    #[test]
    fn accepted_corners_respect_min_distance() {
        let img = checkerboard(6, 10);
        let params = PointParams {
            min_distance: 9.0,
            ..PointParams::default()
        };
        let corners = good_features(&img, &params);
        assert!(corners.len() > 1);
        for (i, a) in corners.iter().enumerate() {
            for b in &corners[i + 1..] {
                assert!(a.distance_squared(*b) > 81.0, "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn roi_offsets_corners_into_image_space() {
        let img = DynamicImage::ImageLuma8(square());
        let roi = Region {
            x: 30,
            y: 30,
            width: 20,
            height: 20,
        };
        let r = PointTool.run(&img, Some(roi), &PointParams::default()).unwrap();
        assert!(!r.points().is_empty());
        assert!(
            r.points().iter().any(|&p| near(p, 39.0, 39.0, 3.0)),
            "{:?}",
            r.points()
        );
        for p in r.points() {
            assert!((30.0..50.0).contains(&p.x) && (30.0..50.0).contains(&p.y));
        }
    }
}
