//! Tool dispatch: canvas in, detection out, renderer notified.
//!
//! [`execute`] is the synchronous entry point. It pulls the image and
//! raw ROI from a [`Canvas`], clamps the ROI, runs the tool selected in
//! the [`ToolContext`] and hands the result to a [`Renderer`].
//! Preconditions (an image is loaded, a tool is selected, its parameters
//! are in range) are checked here so the tools themselves only deal with
//! the channel layout.

use image::DynamicImage;

use crate::roi;
use crate::tool::{Tool, ToolKind, ToolParams};
use crate::types::{DetectionError, DetectionResult, Dimensions, Rect};

/// Source of the image and the user's ROI.
pub trait Canvas {
    /// The loaded image, if any.
    fn image(&self) -> Option<&DynamicImage>;

    /// The raw ROI in image coordinates; [`Rect::EMPTY`] when none.
    fn roi(&self) -> Rect;

    /// Returns `true` if [`roi`](Self::roi) has positive width and height.
    fn has_valid_roi(&self) -> bool {
        !self.roi().is_empty()
    }
}

/// Sink for detection results.
///
/// Called once per successful [`execute`], including when nothing was
/// found, so implementations can report a zero count.
pub trait Renderer {
    /// Draw or report `result`.
    fn render(&mut self, result: &DetectionResult);
}

/// The selected tool plus one parameter set per tool.
///
/// Changing [`current_tool`](Self::current_tool) keeps every parameter
/// set; the new selection takes effect on the next [`execute`].
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ToolContext {
    /// The tool [`execute`] runs, or `None` before one is chosen.
    pub current_tool: Option<ToolKind>,
    /// Parameters for each tool.
    pub params: ToolParams,
}

impl ToolContext {
    /// A context with `tool` selected and default parameters.
    #[must_use]
    pub fn with_tool(tool: ToolKind) -> Self {
        Self {
            current_tool: Some(tool),
            params: ToolParams::default(),
        }
    }

    /// Select `tool` for the next run.
    pub const fn select(&mut self, tool: ToolKind) {
        self.current_tool = Some(tool);
    }
}

/// Why [`execute`] did not produce a result.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The canvas has no image.
    #[error("no image loaded")]
    NoImageLoaded,

    /// No tool has been selected.
    #[error("no tool selected")]
    NoToolSelected,

    /// The background worker thread has exited.
    #[error("detection worker has stopped")]
    WorkerStopped,

    /// The tool rejected its input or parameters.
    #[error(transparent)]
    Detection(#[from] DetectionError),
}

/// Run the selected tool on the canvas image and render the result.
///
/// On success the renderer has been called exactly once and the same
/// result is returned. On any error the renderer is not called.
///
/// # Errors
///
/// - [`DispatchError::NoImageLoaded`] if the canvas has no image.
/// - [`DispatchError::NoToolSelected`] if `ctx.current_tool` is `None`.
/// - [`DispatchError::Detection`] if the selected parameters are out of
///   range or the image is not 1 or 3 channels.
pub fn execute<C, R>(
    canvas: &C,
    ctx: &ToolContext,
    renderer: &mut R,
) -> Result<DetectionResult, DispatchError>
where
    C: Canvas + ?Sized,
    R: Renderer + ?Sized,
{
    let Some(image) = canvas.image() else {
        log::warn!("no image loaded, nothing to detect");
        return Err(DispatchError::NoImageLoaded);
    };
    let Some(tool) = ctx.current_tool else {
        log::warn!("no tool selected");
        return Err(DispatchError::NoToolSelected);
    };

    let result = run_tool(image, canvas.roi(), tool, &ctx.params).inspect_err(|e| {
        log::warn!("{tool} tool failed: {e}");
    })?;
    renderer.render(&result);
    Ok(result)
}

/// Validate, clamp and run without any collaborators.
///
/// Shared by [`execute`] and the background worker.
///
/// # Errors
///
/// Returns [`DetectionError`] for out-of-range parameters or an
/// unsupported channel layout.
pub fn run_tool(
    image: &DynamicImage,
    requested: Rect,
    tool: ToolKind,
    params: &ToolParams,
) -> Result<DetectionResult, DetectionError> {
    tool.validate(params)?;
    let region = roi::clamp(Dimensions::of(image), requested);
    log::debug!("running {tool} tool, requested ROI {requested:?}, clamped {region:?}");
    let result = tool.run(image, region, params)?;
    if result.is_empty() {
        log::info!("{tool} tool: no primitives found");
    } else {
        log::info!("{tool} tool: {} primitives found", result.len());
    }
    Ok(result)
}
