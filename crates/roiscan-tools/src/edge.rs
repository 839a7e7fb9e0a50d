//! Sobel gradients and Canny edge detection.
//!
//! Produces the binary edge maps the line and circle tools vote on.
//! Unlike [`imageproc::edges::canny`] this does not blur internally
//! (each tool applies its own fixed smoothing first), and the hysteresis
//! walk is bounds-checked so edges touching the crop border are safe.

use image::{GrayImage, Luma};

/// Minimum allowed Canny threshold.
///
/// A zero low threshold turns every pixel with any gradient into a
/// potential edge, which floods the Hough accumulators.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Fixed low Canny threshold of the line tool.
pub const LINE_CANNY_LOW: f32 = 50.0;

/// Fixed high Canny threshold of the line tool.
pub const LINE_CANNY_HIGH: f32 = 150.0;

/// Value of an edge pixel in a binary edge map.
pub const EDGE: u8 = 255;

/// Per-pixel Sobel derivatives of an intensity map, stored row-major.
#[derive(Debug, Clone)]
pub struct Gradients {
    width: u32,
    height: u32,
    gx: Vec<f32>,
    gy: Vec<f32>,
    magnitude: Vec<f32>,
}

impl Gradients {
    /// Compute 3x3 Sobel derivatives (unnormalized, clamped borders).
    #[must_use]
    pub fn sobel(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Self {
                width,
                height,
                gx: Vec::new(),
                gy: Vec::new(),
                magnitude: Vec::new(),
            };
        }

        let gx: Vec<f32> = imageproc::gradients::horizontal_sobel(image)
            .pixels()
            .map(|p| f32::from(p.0[0]))
            .collect();
        let gy: Vec<f32> = imageproc::gradients::vertical_sobel(image)
            .pixels()
            .map(|p| f32::from(p.0[0]))
            .collect();
        let magnitude = gx.iter().zip(&gy).map(|(h, v)| h.hypot(*v)).collect();

        Self {
            width,
            height,
            gx,
            gy,
            magnitude,
        }
    }

    /// Width of the underlying image.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the underlying image.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// `(dx, dy)` at a pixel.
    #[must_use]
    pub fn at(&self, x: u32, y: u32) -> (f32, f32) {
        let i = self.index(x, y);
        (self.gx[i], self.gy[i])
    }

    /// Gradient magnitude at a pixel.
    #[must_use]
    pub fn magnitude(&self, x: u32, y: u32) -> f32 {
        self.magnitude[self.index(x, y)]
    }
}

/// Detect edges with the Canny algorithm on an already-smoothed image.
///
/// Returns a binary image: [`EDGE`] for edge pixels, 0 otherwise.
/// Thresholds are clamped to at least [`MIN_THRESHOLD`] and `low` is
/// clamped to at most `high`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    canny_from_gradients(&Gradients::sobel(image), low_threshold, high_threshold)
}

/// Canny from precomputed gradients, so callers that also need the
/// gradient directions (the circle tool) compute them once.
#[must_use = "returns the binary edge map"]
pub fn canny_from_gradients(
    gradients: &Gradients,
    low_threshold: f32,
    high_threshold: f32,
) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    let thinned = non_maximum_suppression(gradients);
    hysteresis(gradients.width, gradients.height, &thinned, low, high)
}

/// Keep only pixels whose magnitude is a local maximum across the edge.
///
/// Border pixels are always suppressed.
fn non_maximum_suppression(g: &Gradients) -> Vec<f32> {
    let (w, h) = (g.width, g.height);
    let mut out = vec![0.0; g.magnitude.len()];
    for y in 1..h.saturating_sub(1) {
        for x in 1..w.saturating_sub(1) {
            let mag = g.magnitude(x, y);
            if mag <= 0.0 {
                continue;
            }
            let (dx, dy) = g.at(x, y);
            let mut angle = dy.atan2(dx).to_degrees();
            if angle < 0.0 {
                angle += 180.0;
            }
            let (a, b) = if (22.5..67.5).contains(&angle) {
                (g.magnitude(x + 1, y + 1), g.magnitude(x - 1, y - 1))
            } else if (67.5..112.5).contains(&angle) {
                (g.magnitude(x, y - 1), g.magnitude(x, y + 1))
            } else if (112.5..157.5).contains(&angle) {
                (g.magnitude(x - 1, y + 1), g.magnitude(x + 1, y - 1))
            } else {
                (g.magnitude(x - 1, y), g.magnitude(x + 1, y))
            };
            if mag >= a && mag >= b {
                out[g.index(x, y)] = mag;
            }
        }
    }
    out
}

/// Promote strong pixels to edges and grow them through weak neighbors.
fn hysteresis(width: u32, height: u32, thinned: &[f32], low: f32, high: f32) -> GrayImage {
    let mut out = GrayImage::new(width, height);
    let at = |x: u32, y: u32| thinned[y as usize * width as usize + x as usize];
    let mut stack = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if at(x, y) < high || out.get_pixel(x, y).0[0] == EDGE {
                continue;
            }
            out.put_pixel(x, y, Luma([EDGE]));
            stack.push((x, y));
            while let Some((cx, cy)) = stack.pop() {
                for (nx, ny) in neighbors(cx, cy, width, height) {
                    if at(nx, ny) >= low && out.get_pixel(nx, ny).0[0] != EDGE {
                        out.put_pixel(nx, ny, Luma([EDGE]));
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }
    out
}

/// The in-bounds 8-neighbors of `(x, y)`.
fn neighbors(x: u32, y: u32, width: u32, height: u32) -> impl Iterator<Item = (u32, u32)> {
    const OFFSETS: [(i64, i64); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];
    OFFSETS.into_iter().filter_map(move |(dx, dy)| {
        let nx = u32::try_from(i64::from(x) + dx).ok()?;
        let ny = u32::try_from(i64::from(y) + dy).ok()?;
        (nx < width && ny < height).then_some((nx, ny))
    })
}

/// Coordinates of every edge pixel, in row-major order.
#[must_use]
pub fn edge_pixels(edges: &GrayImage) -> Vec<(u32, u32)> {
    edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] == EDGE)
        .map(|(x, y, _)| (x, y))
        .collect()
}
