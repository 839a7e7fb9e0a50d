//! Line segment detection.
//!
//! Pipeline: intensity crop, Gaussian blur ([`blur::LINE_SIGMA`]), Canny
//! with fixed thresholds ([`edge::LINE_CANNY_LOW`] /
//! [`edge::LINE_CANNY_HIGH`]), then a progressive probabilistic Hough
//! transform over the edge pixels.
//!
//! # Hough stage
//!
//! Every edge pixel votes once per angle bin in a `(theta, rho)`
//! accumulator. Bins that are local maxima with at least `threshold`
//! votes become candidates, visited strongest first. For each candidate
//! the not-yet-claimed edge pixels lying on its line are ordered along
//! the line direction and split wherever consecutive pixels are more than
//! `max_line_gap` apart. Runs at least `min_line_length` long become
//! segments, and their pixels are claimed so weaker candidates cannot
//! report the same evidence again.
//!
//! Candidate order depends only on the accumulator, so raising
//! `threshold` only ever drops candidates from the tail: the segments
//! found at a higher threshold are a prefix of those found at a lower
//! one.

use std::cmp::Ordering;
use std::f64::consts::{FRAC_PI_2, PI};

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

use super::{Tool, offset, prepare};
use crate::blur;
use crate::edge;
use crate::types::{DetectionError, DetectionKind, DetectionResult, LineSegment, Region};

/// Parameters of the line tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineParams {
    /// Distance resolution of the accumulator, in pixels.
    pub rho: f64,
    /// Angle resolution of the accumulator, in radians.
    pub theta: f64,
    /// Minimum accumulator votes for a candidate line.
    pub threshold: u32,
    /// Minimum segment length, in pixels.
    pub min_line_length: f64,
    /// Maximum gap between collinear pixels joined into one segment.
    pub max_line_gap: f64,
}

impl LineParams {
    /// Default distance resolution.
    pub const DEFAULT_RHO: f64 = 1.0;
    /// Default angle resolution (one degree).
    pub const DEFAULT_THETA: f64 = PI / 180.0;
    /// Default vote threshold.
    pub const DEFAULT_THRESHOLD: u32 = 50;
    /// Default minimum segment length.
    pub const DEFAULT_MIN_LINE_LENGTH: f64 = 20.0;
    /// Default maximum gap.
    pub const DEFAULT_MAX_LINE_GAP: f64 = 10.0;
    /// Finest accepted distance resolution.
    pub const MIN_RHO: f64 = 0.01;
    /// Finest accepted angle resolution (a twentieth of a degree).
    pub const MIN_THETA: f64 = PI / 3600.0;

    /// Check every field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::InvalidParams`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), DetectionError> {
        if !self.rho.is_finite() || self.rho < Self::MIN_RHO {
            return Err(invalid(format!(
                "rho must be at least {}, got {}",
                Self::MIN_RHO,
                self.rho
            )));
        }
        if self.theta.is_nan() || self.theta < Self::MIN_THETA || self.theta > FRAC_PI_2 {
            return Err(invalid(format!(
                "theta must be in [{}, pi/2], got {}",
                Self::MIN_THETA,
                self.theta
            )));
        }
        if self.threshold == 0 {
            return Err(invalid("threshold must be at least 1".to_string()));
        }
        if self.min_line_length.is_nan() || self.min_line_length < 0.0 {
            return Err(invalid(format!(
                "min_line_length must be non-negative, got {}",
                self.min_line_length
            )));
        }
        if self.max_line_gap.is_nan() || self.max_line_gap < 0.0 {
            return Err(invalid(format!(
                "max_line_gap must be non-negative, got {}",
                self.max_line_gap
            )));
        }
        Ok(())
    }
}

impl Default for LineParams {
    fn default() -> Self {
        Self {
            rho: Self::DEFAULT_RHO,
            theta: Self::DEFAULT_THETA,
            threshold: Self::DEFAULT_THRESHOLD,
            min_line_length: Self::DEFAULT_MIN_LINE_LENGTH,
            max_line_gap: Self::DEFAULT_MAX_LINE_GAP,
        }
    }
}

fn invalid(msg: String) -> DetectionError {
    DetectionError::InvalidParams(msg)
}

/// Detects straight line segments.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineTool;

impl Tool for LineTool {
    type Params = LineParams;

    fn kind(&self) -> DetectionKind {
        DetectionKind::Lines
    }

    fn run(
        &self,
        image: &DynamicImage,
        roi: Option<Region>,
        params: &LineParams,
    ) -> Result<DetectionResult, DetectionError> {
        let Some(gray) = prepare(image, roi)? else {
            return Ok(DetectionResult::empty(DetectionKind::Lines));
        };
        let (width, height) = gray.dimensions();
        if accumulator_shape(width, height, params.rho, params.theta).is_none() {
            return Err(invalid(format!(
                "rho {} and theta {} need more than {MAX_ACCUMULATOR_BINS} accumulator bins \
                 for a {width}x{height} image",
                params.rho, params.theta
            )));
        }

        let blurred = blur::gaussian_blur(&gray, blur::LINE_SIGMA);
        let edges = edge::canny(&blurred, edge::LINE_CANNY_LOW, edge::LINE_CANNY_HIGH);
        let segments = hough_segments(&edges, params);

        let (dx, dy) = offset(roi);
        log::debug!(
            "line tool: {} segments in {}x{} (offset {dx},{dy})",
            segments.len(),
            gray.width(),
            gray.height(),
        );
        Ok(DetectionResult::Lines(
            segments.into_iter().map(|s| s.translated(dx, dy)).collect(),
        ))
    }
}

/// Trig lookup for one angle bin, pre-divided by `rho`.
#[derive(Debug, Clone, Copy)]
struct AngleBin {
    cos: f64,
    sin: f64,
}

/// Largest `(theta, rho)` accumulator the line tool allocates.
pub const MAX_ACCUMULATOR_BINS: usize = 1 << 26;

/// `(num_angle, num_rho)` of the accumulator for an image of the given
/// size, or `None` when it would exceed [`MAX_ACCUMULATOR_BINS`].
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn accumulator_shape(width: u32, height: u32, rho: f64, theta: f64) -> Option<(usize, usize)> {
    let num_angle = ((PI / theta).round() as usize).max(1);
    let num_rho = (((f64::from(width) + f64::from(height)) * 2.0 + 1.0) / rho).round() as usize;
    let num_rho = num_rho.max(1);
    num_angle
        .checked_mul(num_rho)
        .filter(|&bins| bins <= MAX_ACCUMULATOR_BINS)
        .map(|_| (num_angle, num_rho))
}

/// The `(theta, rho)` vote accumulator.
struct Accumulator {
    angles: Vec<AngleBin>,
    num_rho: usize,
    rho_offset: f64,
    votes: Vec<u32>,
}

impl Accumulator {
    #[allow(clippy::cast_precision_loss)]
    fn new(width: u32, height: u32, rho: f64, theta: f64) -> Option<Self> {
        let (num_angle, num_rho) = accumulator_shape(width, height, rho, theta)?;
        let angles = (0..num_angle)
            .map(|n| {
                let angle = n as f64 * theta;
                AngleBin {
                    cos: angle.cos() / rho,
                    sin: angle.sin() / rho,
                }
            })
            .collect::<Vec<_>>();
        Some(Self {
            votes: vec![0; num_angle * num_rho],
            angles,
            num_rho,
            rho_offset: ((num_rho - 1) / 2) as f64,
        })
    }

    /// Fractional rho bin of pixel `(x, y)` at angle bin `n`.
    fn rho_of(&self, n: usize, (x, y): (u32, u32)) -> f64 {
        let a = self.angles[n];
        f64::from(x).mul_add(a.cos, f64::from(y) * a.sin) + self.rho_offset
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn vote(&mut self, pixel: (u32, u32)) {
        for n in 0..self.angles.len() {
            let r = self.rho_of(n, pixel).round();
            if r >= 0.0 && (r as usize) < self.num_rho {
                self.votes[n * self.num_rho + r as usize] += 1;
            }
        }
    }

    /// Indices of local-maximum bins with at least `threshold` votes,
    /// strongest first. Ties go to the lower index.
    fn candidates(&self, threshold: u32) -> Vec<usize> {
        let num_angle = self.angles.len();
        let mut out: Vec<usize> = (0..self.votes.len())
            .filter(|&i| self.votes[i] >= threshold && self.is_peak(i, num_angle))
            .collect();
        out.sort_by(|&a, &b| self.votes[b].cmp(&self.votes[a]).then(a.cmp(&b)));
        out
    }

    /// `true` if bin `i` beats every 8-neighbor in the accumulator grid,
    /// comparing `(votes, -index)` so plateaus keep exactly one bin.
    fn is_peak(&self, i: usize, num_angle: usize) -> bool {
        let v = self.votes[i];
        let (n, r) = (i / self.num_rho, i % self.num_rho);
        for dn in -1_isize..=1 {
            for dr in -1_isize..=1 {
                if dn == 0 && dr == 0 {
                    continue;
                }
                let (Some(nn), Some(rr)) = (n.checked_add_signed(dn), r.checked_add_signed(dr))
                else {
                    continue;
                };
                if nn >= num_angle || rr >= self.num_rho {
                    continue;
                }
                let j = nn * self.num_rho + rr;
                match self.votes[j].cmp(&v) {
                    Ordering::Greater => return false,
                    Ordering::Equal if j < i => return false,
                    _ => {}
                }
            }
        }
        true
    }
}

/// Run the probabilistic Hough stage over a binary edge map.
///
/// Returns segments in local (edge map) coordinates. Degenerate
/// resolutions (`rho` or `theta` not positive) and resolutions needing
/// more than [`MAX_ACCUMULATOR_BINS`] bins return nothing.
#[must_use]
pub fn hough_segments(edges: &GrayImage, params: &LineParams) -> Vec<LineSegment> {
    if !params.rho.is_finite()
        || params.rho <= 0.0
        || !params.theta.is_finite()
        || params.theta <= 0.0
    {
        return Vec::new();
    }
    let pixels = edge::edge_pixels(edges);
    if pixels.is_empty() {
        return Vec::new();
    }

    let (width, height) = edges.dimensions();
    let Some(mut acc) = Accumulator::new(width, height, params.rho, params.theta) else {
        log::warn!(
            "line tool: accumulator for rho {} theta {} exceeds {MAX_ACCUMULATOR_BINS} bins",
            params.rho,
            params.theta
        );
        return Vec::new();
    };
    for &p in &pixels {
        acc.vote(p);
    }

    let threshold = params.threshold.max(1);
    let mut claimed = vec![false; pixels.len()];
    let mut segments = Vec::new();

    for bin in acc.candidates(threshold) {
        let n = bin / acc.num_rho;
        #[allow(clippy::cast_precision_loss)]
        let r = (bin % acc.num_rho) as f64;
        let a = acc.angles[n];

        // Unclaimed pixels within one bin of the candidate line, keyed by
        // their position along it.
        let mut on_line: Vec<(f64, usize)> = pixels
            .iter()
            .enumerate()
            .filter(|&(i, &p)| !claimed[i] && (acc.rho_of(n, p) - r).abs() <= 1.0)
            .map(|(i, &(x, y))| (f64::from(y).mul_add(a.cos, -f64::from(x) * a.sin) * params.rho, i))
            .collect();
        on_line.sort_by(|p, q| p.0.total_cmp(&q.0).then(p.1.cmp(&q.1)));

        for run in split_runs(&on_line, params.max_line_gap) {
            let (Some(&(_, first)), Some(&(_, last))) = (run.first(), run.last()) else {
                continue;
            };
            let segment = to_segment(pixels[first], pixels[last]);
            if segment.length() < params.min_line_length {
                continue;
            }
            for &(_, i) in run {
                claimed[i] = true;
            }
            segments.push(segment);
        }
    }
    segments
}

/// Split pixels sorted by position into runs whose consecutive spacing
/// leaves at most `max_gap` empty pixels.
fn split_runs(sorted: &[(f64, usize)], max_gap: f64) -> Vec<&[(f64, usize)]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for (i, pair) in sorted.windows(2).enumerate() {
        if pair[1].0 - pair[0].0 > max_gap + 1.0 {
            runs.push(&sorted[start..=i]);
            start = i + 1;
        }
    }
    if start < sorted.len() {
        runs.push(&sorted[start..]);
    }
    runs
}

#[allow(clippy::cast_possible_wrap)]
const fn to_segment((x1, y1): (u32, u32), (x2, y2): (u32, u32)) -> LineSegment {
    LineSegment::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32)
}
