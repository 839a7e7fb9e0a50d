//! Detection tools: line segments, corner points, circles.
//!
//! This module defines the [`Tool`] trait every detector implements and
//! the [`ToolKind`] enum for selecting one at runtime.
//!
//! # Strategy pattern
//!
//! The set of tools is closed, so selection is an enum rather than a
//! trait object: [`ToolKind`] implements [`Tool`] by matching on the
//! variant and forwarding to the concrete tool with the matching
//! parameter struct out of [`ToolParams`]. Tools hold no state between
//! runs.
//!
//! Every tool follows the same shape:
//!
//! 1. crop to the clamped ROI (or use the whole image) and convert to
//!    intensity ([`crate::grayscale::crop_to_intensity`]),
//! 2. apply its fixed smoothing step,
//! 3. detect with the caller's parameters,
//! 4. shift every coordinate by the ROI's top-left corner,
//! 5. package the primitives as a [`DetectionResult`] of its kind.

pub mod circle;
pub mod line;
pub mod point;

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

pub use circle::{CircleParams, CircleTool};
pub use line::{LineParams, LineTool};
pub use point::{PointParams, PointTool};

use crate::grayscale;
use crate::types::{DetectionError, DetectionKind, DetectionResult, Region};

/// Common capability of the detection tools.
pub trait Tool {
    /// Parameter struct consumed by [`run`](Self::run).
    type Params;

    /// The kind of result this tool produces.
    fn kind(&self) -> DetectionKind;

    /// Detect primitives in `image`, restricted to `roi` when given.
    ///
    /// `roi` must come from [`crate::roi::clamp`] against this image;
    /// `None` means the whole image. Returned coordinates are in
    /// full-image space. A zero-area image yields an empty result of
    /// [`kind`](Self::kind).
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::InvalidImageFormat`] if the image is not
    /// 1 or 3 channels.
    fn run(
        &self,
        image: &DynamicImage,
        roi: Option<Region>,
        params: &Self::Params,
    ) -> Result<DetectionResult, DetectionError>;
}

/// Selects which tool to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Probabilistic Hough line segments.
    Line,
    /// Shi-Tomasi corners.
    Point,
    /// Gradient Hough circles.
    Circle,
}

impl ToolKind {
    /// All tools, in menu order.
    pub const ALL: [Self; 3] = [Self::Line, Self::Point, Self::Circle];

    /// The kind of result the selected tool produces.
    #[must_use]
    pub const fn detection_kind(self) -> DetectionKind {
        match self {
            Self::Line => DetectionKind::Lines,
            Self::Point => DetectionKind::Points,
            Self::Circle => DetectionKind::Circles,
        }
    }

    /// Short human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Point => "point",
            Self::Circle => "circle",
        }
    }

    /// Validate only the parameter struct this tool uses.
    ///
    /// # Errors
    ///
    /// Returns [`DetectionError::InvalidParams`] naming the offending field.
    pub fn validate(self, params: &ToolParams) -> Result<(), DetectionError> {
        match self {
            Self::Line => params.line.validate(),
            Self::Point => params.point.validate(),
            Self::Circle => params.circle.validate(),
        }
    }
}

impl Tool for ToolKind {
    type Params = ToolParams;

    fn kind(&self) -> DetectionKind {
        self.detection_kind()
    }

    fn run(
        &self,
        image: &DynamicImage,
        roi: Option<Region>,
        params: &ToolParams,
    ) -> Result<DetectionResult, DetectionError> {
        match self {
            Self::Line => LineTool.run(image, roi, &params.line),
            Self::Point => PointTool.run(image, roi, &params.point),
            Self::Circle => CircleTool.run(image, roi, &params.circle),
        }
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One parameter struct per tool, each independently settable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolParams {
    /// Line tool parameters.
    pub line: LineParams,
    /// Point tool parameters.
    pub point: PointParams,
    /// Circle tool parameters.
    pub circle: CircleParams,
}

/// Shared first stage: channel check, crop, intensity conversion.
///
/// Returns `Ok(None)` for zero-area input so the caller can return an
/// empty result of its kind.
pub(crate) fn prepare(
    image: &DynamicImage,
    roi: Option<Region>,
) -> Result<Option<GrayImage>, DetectionError> {
    if image.width() == 0 || image.height() == 0 {
        grayscale::check_channels(image)?;
        return Ok(None);
    }
    grayscale::crop_to_intensity(image, roi).map(Some)
}

/// The integer offset restoring full-image coordinates.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn offset(roi: Option<Region>) -> (i32, i32) {
    roi.map_or((0, 0), |r| (r.x as i32, r.y as i32))
}

/// [`offset`] as floats, for sub-pixel primitives.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn offset_f32(roi: Option<Region>) -> (f32, f32) {
    roi.map_or((0.0, 0.0), |r| (r.x as f32, r.y as f32))
}
