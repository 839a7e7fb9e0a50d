//! Colors and sizes shared by the SVG and raster renderers.

/// An opaque sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
}

impl Color {
    /// Create a color from its components.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS hex notation, e.g. `#00ff00`.
    #[must_use]
    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Stroke color of line segments.
pub const LINE_COLOR: Color = Color::rgb(0, 255, 0);
/// Stroke width of line segments.
pub const LINE_WIDTH: f32 = 2.0;

/// Fill color of point markers.
pub const POINT_COLOR: Color = Color::rgb(255, 0, 0);
/// Radius of point markers.
pub const POINT_RADIUS: f32 = 3.0;

/// Stroke color of circle outlines.
pub const CIRCLE_COLOR: Color = Color::rgb(255, 255, 0);
/// Stroke width of circle outlines.
pub const CIRCLE_WIDTH: f32 = 1.0;

/// Stroke color of the ROI rectangle.
pub const ROI_COLOR: Color = Color::rgb(255, 0, 0);
/// Stroke width of the ROI rectangle.
pub const ROI_WIDTH: f32 = 2.0;
