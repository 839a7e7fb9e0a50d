//! Raster overlay: detection results drawn onto the source image.
//!
//! Primitives are rasterized with `tiny-skia` (anti-aliased, sub-pixel
//! positions) into a transparent layer, which is then alpha-composited
//! over a copy of the base image.

use image::{Rgba, RgbaImage};
use roiscan_tools::{DetectionResult, Region};
use tiny_skia::{
    Color, FillRule, LineCap, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform,
};

use crate::style;

/// Errors from the export renderers.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// The drawing surface could not be created.
    #[error("cannot allocate a {width}x{height} drawing surface")]
    Surface {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Draw `result` (and the ROI outline, if any) over a copy of `base`.
///
/// A zero-area base is returned unchanged.
///
/// # Errors
///
/// Returns [`ExportError::Surface`] if the drawing surface cannot be
/// allocated (e.g. the image is too large for `tiny-skia`).
pub fn render_overlay(
    base: &RgbaImage,
    result: &DetectionResult,
    roi: Option<Region>,
) -> Result<RgbaImage, ExportError> {
    let (width, height) = base.dimensions();
    if width == 0 || height == 0 {
        return Ok(base.clone());
    }
    let mut pixmap = Pixmap::new(width, height).ok_or(ExportError::Surface { width, height })?;

    if let Some(path) = roi.and_then(roi_path) {
        stroke(&mut pixmap, &path, style::ROI_COLOR, style::ROI_WIDTH);
    }

    let mut lines = PathBuilder::new();
    for s in result.lines() {
        lines.move_to(coord(s.x1), coord(s.y1));
        lines.line_to(coord(s.x2), coord(s.y2));
    }
    if let Some(path) = lines.finish() {
        stroke(&mut pixmap, &path, style::LINE_COLOR, style::LINE_WIDTH);
    }

    for c in result.circles() {
        if let Some(path) = PathBuilder::from_circle(c.x, c.y, c.radius) {
            stroke(&mut pixmap, &path, style::CIRCLE_COLOR, style::CIRCLE_WIDTH);
        }
    }

    for p in result.points() {
        if let Some(path) = PathBuilder::from_circle(p.x, p.y, style::POINT_RADIUS) {
            pixmap.fill_path(
                &path,
                &paint(style::POINT_COLOR),
                FillRule::Winding,
                Transform::identity(),
                None,
            );
        }
    }

    let layer = unpremultiply(&pixmap);
    let mut out = base.clone();
    image::imageops::overlay(&mut out, &layer, 0, 0);
    log::debug!("overlay: drew {} primitives", result.len());
    Ok(out)
}

#[allow(clippy::cast_precision_loss)]
fn coord(v: i32) -> f32 {
    v as f32
}

#[allow(clippy::cast_precision_loss)]
fn roi_path(r: Region) -> Option<Path> {
    let rect = Rect::from_xywh(r.x as f32, r.y as f32, r.width as f32, r.height as f32)?;
    Some(PathBuilder::from_rect(rect))
}

fn paint(color: style::Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(color.r, color.g, color.b, 255));
    paint.anti_alias = true;
    paint
}

fn stroke(pixmap: &mut Pixmap, path: &Path, color: style::Color, width: f32) {
    let stroke = Stroke {
        width,
        line_cap: LineCap::Round,
        ..Stroke::default()
    };
    pixmap.stroke_path(path, &paint(color), &stroke, Transform::identity(), None);
}

/// Convert a premultiplied pixmap into a straight-alpha image.
fn unpremultiply(pixmap: &Pixmap) -> RgbaImage {
    let mut img = RgbaImage::new(pixmap.width(), pixmap.height());
    for (pixel, src) in img.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        *pixel = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
    }
    img
}
