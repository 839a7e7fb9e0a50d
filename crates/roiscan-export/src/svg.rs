//! SVG export.
//!
//! Draws a [`DetectionResult`] as an SVG document in image pixel
//! coordinates, so it can be laid over the source image at 1:1. Each
//! primitive kind goes into its own `<g>`: `lines` as `<line>`, `points`
//! as filled `<circle>` markers, `circles` as stroked `<circle>`
//! outlines. The ROI, when given, is an outlined `<rect>` in `roi`.
//!
//! Document construction and escaping are done by the [`svg`] crate.
//! This is a pure function with no I/O: it returns a `String`.

use svg::Document;
use svg::node::element::{Circle, Description, Element, Group, Line, Rectangle, Title};
use svg::node::{Node, Text};

use roiscan_tools::{DetectionResult, Dimensions, Region};

use crate::style;

/// Metadata to embed in the SVG document.
///
/// Every field is optional; present fields are emitted right after the
/// opening `<svg>` tag. Text is XML-escaped by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Emitted as `<title>`, typically the source file name.
    pub title: Option<&'a str>,

    /// Emitted as `<desc>`, typically the tool and a result summary.
    pub description: Option<&'a str>,

    /// Tool parameters as JSON, emitted inside
    /// `<metadata><roiscan:params>` so files record how they were made.
    pub params_json: Option<&'a str>,
}

/// Serialize a detection result into an SVG document string.
///
/// The `viewBox` is `0 0 width height` of the source image.
#[must_use]
pub fn to_svg(
    result: &DetectionResult,
    dimensions: Dimensions,
    roi: Option<Region>,
    metadata: &SvgMetadata<'_>,
) -> String {
    let (w, h) = (dimensions.width, dimensions.height);
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(params_json) = metadata.params_json {
        let mut params_el = Element::new("roiscan:params");
        params_el.assign("xmlns:roiscan", "https://roiscan.dev/ns/1");
        params_el.append(Text::new(params_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(params_el);
        doc = doc.add(metadata_el);
    }

    if let Some(r) = roi {
        let rect = Rectangle::new()
            .set("x", r.x)
            .set("y", r.y)
            .set("width", r.width)
            .set("height", r.height)
            .set("fill", "none")
            .set("stroke", style::ROI_COLOR.hex())
            .set("stroke-width", style::ROI_WIDTH);
        doc = doc.add(Group::new().set("id", "roi").add(rect));
    }

    if !result.lines().is_empty() {
        let mut group = Group::new()
            .set("id", "lines")
            .set("stroke", style::LINE_COLOR.hex())
            .set("stroke-width", style::LINE_WIDTH);
        for s in result.lines() {
            group = group.add(
                Line::new()
                    .set("x1", s.x1)
                    .set("y1", s.y1)
                    .set("x2", s.x2)
                    .set("y2", s.y2),
            );
        }
        doc = doc.add(group);
    }

    if !result.points().is_empty() {
        let mut group = Group::new()
            .set("id", "points")
            .set("fill", style::POINT_COLOR.hex());
        for p in result.points() {
            group = group.add(
                Circle::new()
                    .set("cx", p.x)
                    .set("cy", p.y)
                    .set("r", style::POINT_RADIUS),
            );
        }
        doc = doc.add(group);
    }

    if !result.circles().is_empty() {
        let mut group = Group::new()
            .set("id", "circles")
            .set("fill", "none")
            .set("stroke", style::CIRCLE_COLOR.hex())
            .set("stroke-width", style::CIRCLE_WIDTH);
        for c in result.circles() {
            group = group.add(
                Circle::new()
                    .set("cx", c.x)
                    .set("cy", c.y)
                    .set("r", c.radius),
            );
        }
        doc = doc.add(group);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}
