//! roiscan-tools: ROI-restricted feature detection (sans-IO).
//!
//! Finds line segments, corner points and circles in an image,
//! optionally restricted to a rectangular region of interest:
//! clamp ROI -> crop -> intensity -> smooth -> detect -> remap.
//!
//! Results are always reported in the coordinates of the full,
//! uncropped image.
//!
//! This crate has **no I/O dependencies**. It takes decoded
//! [`image::DynamicImage`]s and returns structured data. Decoding files
//! and drawing results live in `roiscan` and `roiscan-export`.

pub mod blur;
pub mod dispatch;
pub mod edge;
pub mod grayscale;
pub mod roi;
pub mod tool;
pub mod types;
pub mod worker;

pub use dispatch::{Canvas, DispatchError, Renderer, ToolContext, execute, run_tool};
pub use roi::{RoiSelection, ScenePos, clamp};
pub use tool::{
    CircleParams, CircleTool, LineParams, LineTool, PointParams, PointTool, Tool, ToolKind,
    ToolParams,
};
pub use types::{
    Circle, DetectionError, DetectionKind, DetectionResult, Dimensions, LineSegment, Point, Rect,
    Region,
};
pub use worker::{DetectionWorker, WorkerResponse};
