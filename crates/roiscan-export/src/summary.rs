//! One-line text summaries of detection results.

use std::io::Write;

use roiscan_tools::{DetectionResult, Renderer};

fn count(n: usize, singular: &str, plural: &str) -> String {
    match n {
        0 => format!("no {plural}"),
        1 => format!("1 {singular}"),
        _ => format!("{n} {plural}"),
    }
}

/// Describe how many primitives `result` holds, zero included.
///
/// ```
/// use roiscan_tools::{DetectionResult, LineSegment};
/// use roiscan_export::summary;
///
/// assert_eq!(summary(&DetectionResult::Lines(vec![])), "No lines found.");
/// let one = DetectionResult::Lines(vec![LineSegment::new(0, 0, 9, 9)]);
/// assert_eq!(summary(&one), "Found 1 line.");
/// ```
#[must_use]
pub fn summary(result: &DetectionResult) -> String {
    let found = |n: usize, singular: &str, plural: &str| {
        if n == 0 {
            format!("No {plural} found.")
        } else {
            format!("Found {}.", count(n, singular, plural))
        }
    };
    match result {
        DetectionResult::None => "Nothing detected.".to_string(),
        DetectionResult::Lines(lines) => found(lines.len(), "line", "lines"),
        DetectionResult::Points(points) => found(points.len(), "point", "points"),
        DetectionResult::Circles(circles) => found(circles.len(), "circle", "circles"),
        DetectionResult::Mixed {
            lines,
            points,
            circles,
        } => format!(
            "Found {}, {}, {}.",
            count(lines.len(), "line", "lines"),
            count(points.len(), "point", "points"),
            count(circles.len(), "circle", "circles"),
        ),
    }
}

/// A [`Renderer`] that writes [`summary`] lines to a writer.
///
/// Write failures are logged, not propagated, since rendering cannot
/// fail.
#[derive(Debug)]
pub struct SummaryRenderer<W> {
    out: W,
}

impl<W: Write> SummaryRenderer<W> {
    /// Write summaries to `out`.
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for SummaryRenderer<W> {
    fn render(&mut self, result: &DetectionResult) {
        if let Err(e) = writeln!(self.out, "{}", summary(result)) {
            log::warn!("failed to write summary: {e}");
        }
    }
}
