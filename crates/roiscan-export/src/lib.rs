//! roiscan-export: Renderers for detection results (sans-IO)
//!
//! Turns a [`roiscan_tools::DetectionResult`] into something a person can
//! look at: an SVG document, a raster overlay on the source image, or a
//! one-line count summary. All three draw the same primitives the same
//! way (see [`style`]).

pub mod overlay;
pub mod style;
pub mod summary;
pub mod svg;

pub use overlay::{ExportError, render_overlay};
pub use summary::{SummaryRenderer, summary};
pub use svg::{SvgMetadata, to_svg};
