//! roiscan: run one detection tool on an image file, optionally inside a
//! rectangular region of interest.
//!
//! The image file plays the canvas, the subcommand picks the tool and its
//! flags fill the tool's parameters. The result summary goes to stdout
//! (or the full result as JSON with `--json`), and `--svg` / `--png`
//! write overlays of what was found.
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin roiscan -- [OPTIONS] <IMAGE_PATH> <line|point|circle> [TOOL OPTIONS]
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use image::DynamicImage;
use roiscan_export::{SummaryRenderer, SvgMetadata, render_overlay, summary, to_svg};
use roiscan_tools::{
    Canvas, CircleParams, DetectionResult, Dimensions, LineParams, PointParams, Rect, Renderer,
    ToolContext, ToolKind, clamp, execute,
};

/// Detect line segments, corners or circles inside a region of an image.
#[derive(Parser)]
#[command(name = "roiscan", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image_path: PathBuf,

    /// Region of interest as `X,Y,W,H` in pixels. Out-of-bounds parts
    /// are clipped; an empty or disjoint region means the whole image.
    #[arg(long, global = true, value_parser = parse_roi, allow_hyphen_values = true)]
    roi: Option<Rect>,

    /// Full parameter set for the chosen tool as a JSON string.
    ///
    /// When provided, the tool's individual parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long, global = true)]
    params_json: Option<String>,

    /// Print the detection result as JSON instead of a summary line.
    #[arg(long, global = true)]
    json: bool,

    /// Write an SVG overlay to this file.
    #[arg(long, global = true)]
    svg: Option<PathBuf>,

    /// Write the image with the results drawn on it to this file.
    #[arg(long, global = true)]
    png: Option<PathBuf>,

    /// Log per-stage details (same as `RUST_LOG=debug`).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    tool: ToolCommand,
}

#[derive(Subcommand)]
enum ToolCommand {
    /// Probabilistic Hough line segments.
    Line(LineArgs),
    /// Shi-Tomasi corner points.
    Point(PointArgs),
    /// Hough-gradient circles.
    Circle(CircleArgs),
}

#[derive(Args)]
struct LineArgs {
    /// Distance resolution of the accumulator in pixels.
    #[arg(long, default_value_t = LineParams::DEFAULT_RHO)]
    rho: f64,

    /// Angle resolution of the accumulator in radians.
    #[arg(long, default_value_t = LineParams::DEFAULT_THETA)]
    theta: f64,

    /// Minimum accumulator votes for a line.
    #[arg(long, default_value_t = LineParams::DEFAULT_THRESHOLD)]
    threshold: u32,

    /// Shortest segment reported, in pixels.
    #[arg(long, default_value_t = LineParams::DEFAULT_MIN_LINE_LENGTH)]
    min_line_length: f64,

    /// Largest gap bridged between collinear pixels.
    #[arg(long, default_value_t = LineParams::DEFAULT_MAX_LINE_GAP)]
    max_line_gap: f64,
}

#[derive(Args)]
struct PointArgs {
    /// Maximum number of corners reported.
    #[arg(long, default_value_t = PointParams::DEFAULT_MAX_CORNERS)]
    max_corners: u32,

    /// Minimum corner strength as a fraction of the strongest corner.
    #[arg(long, default_value_t = PointParams::DEFAULT_QUALITY_LEVEL)]
    quality_level: f64,

    /// Minimum distance between reported corners.
    #[arg(long, default_value_t = PointParams::DEFAULT_MIN_DISTANCE)]
    min_distance: f64,
}

#[derive(Args)]
struct CircleArgs {
    /// Inverse accumulator resolution (2 = half the image resolution).
    #[arg(long, default_value_t = CircleParams::DEFAULT_DP)]
    dp: f64,

    /// Minimum distance between circle centers.
    #[arg(long, default_value_t = CircleParams::DEFAULT_MIN_DIST)]
    min_dist: f64,

    /// Upper Canny threshold (the lower one is half of it).
    #[arg(long, default_value_t = CircleParams::DEFAULT_PARAM1)]
    param1: f64,

    /// Accumulator threshold for circle centers.
    #[arg(long, default_value_t = CircleParams::DEFAULT_PARAM2)]
    param2: f64,

    /// Smallest radius searched.
    #[arg(long, default_value_t = CircleParams::DEFAULT_MIN_RADIUS)]
    min_radius: u32,

    /// Largest radius searched; 0 means the image size.
    #[arg(long, default_value_t = CircleParams::DEFAULT_MAX_RADIUS)]
    max_radius: u32,
}

/// Parse `X,Y,W,H` into a [`Rect`].
fn parse_roi(s: &str) -> Result<Rect, String> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<i32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid ROI {s:?}: {e}"))?;
    match parts[..] {
        [x, y, width, height] => Ok(Rect::new(x, y, width, height)),
        _ => Err(format!(
            "invalid ROI {s:?}: expected X,Y,W,H, got {} values",
            parts.len()
        )),
    }
}

/// Build the [`ToolContext`] from the subcommand and `--params-json`.
fn context_from_cli(cli: &Cli) -> Result<ToolContext, String> {
    let json = cli.params_json.as_deref();
    let parse_err = |e: serde_json::Error| format!("Error parsing --params-json: {e}");
    let mut ctx = ToolContext::default();
    match &cli.tool {
        ToolCommand::Line(args) => {
            ctx.select(ToolKind::Line);
            ctx.params.line = match json {
                Some(json) => serde_json::from_str(json).map_err(parse_err)?,
                None => LineParams {
                    rho: args.rho,
                    theta: args.theta,
                    threshold: args.threshold,
                    min_line_length: args.min_line_length,
                    max_line_gap: args.max_line_gap,
                },
            };
        }
        ToolCommand::Point(args) => {
            ctx.select(ToolKind::Point);
            ctx.params.point = match json {
                Some(json) => serde_json::from_str(json).map_err(parse_err)?,
                None => PointParams {
                    max_corners: args.max_corners,
                    quality_level: args.quality_level,
                    min_distance: args.min_distance,
                },
            };
        }
        ToolCommand::Circle(args) => {
            ctx.select(ToolKind::Circle);
            ctx.params.circle = match json {
                Some(json) => serde_json::from_str(json).map_err(parse_err)?,
                None => CircleParams {
                    dp: args.dp,
                    min_dist: args.min_dist,
                    param1: args.param1,
                    param2: args.param2,
                    min_radius: args.min_radius,
                    max_radius: args.max_radius,
                },
            };
        }
    }
    Ok(ctx)
}

/// An image file and the ROI drawn on it.
struct ImageCanvas {
    image: Option<DynamicImage>,
    roi: Rect,
}

impl ImageCanvas {
    /// Wrap a decoded image, reducing it to a layout the tools accept.
    ///
    /// Alpha is dropped and every bit depth is brought down to 8 bits,
    /// so gray stays gray and everything else becomes RGB.
    fn new(image: DynamicImage, roi: Rect) -> Self {
        let image = match image {
            DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
            DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA16(_) => {
                log::debug!("converting {:?} to 8-bit gray", image.color());
                DynamicImage::ImageLuma8(image.to_luma8())
            }
            other => {
                log::debug!("converting {:?} to 8-bit RGB", other.color());
                DynamicImage::ImageRgb8(other.to_rgb8())
            }
        };
        Self {
            image: Some(image),
            roi,
        }
    }
}

impl Canvas for ImageCanvas {
    fn image(&self) -> Option<&DynamicImage> {
        self.image.as_ref()
    }

    fn roi(&self) -> Rect {
        self.roi
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let ctx = match context_from_cli(&cli) {
        Ok(ctx) => ctx,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let image = match image::open(&cli.image_path) {
        Ok(image) => image,
        Err(e) => {
            eprintln!("Error reading {}: {e}", cli.image_path.display());
            return ExitCode::FAILURE;
        }
    };
    let canvas = ImageCanvas::new(image, cli.roi.unwrap_or(Rect::EMPTY));

    // With --json the summary moves to stderr so stdout stays parseable.
    let mut stdout_renderer = SummaryRenderer::new(std::io::stdout());
    let mut stderr_renderer = SummaryRenderer::new(std::io::stderr());
    let renderer: &mut dyn Renderer = if cli.json {
        &mut stderr_renderer
    } else {
        &mut stdout_renderer
    };

    let result = match execute(&canvas, &ctx, renderer) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Detection failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing result: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    let Some(image) = canvas.image() else {
        return ExitCode::SUCCESS;
    };
    let mut status = ExitCode::SUCCESS;
    if let Some(ref svg_path) = cli.svg
        && let Err(msg) = write_svg(svg_path, &cli, &ctx, image, canvas.roi, &result)
    {
        eprintln!("{msg}");
        status = ExitCode::FAILURE;
    }
    if let Some(ref png_path) = cli.png
        && let Err(msg) = write_png(png_path, image, canvas.roi, &result)
    {
        eprintln!("{msg}");
        status = ExitCode::FAILURE;
    }
    status
}

fn write_svg(
    path: &Path,
    cli: &Cli,
    ctx: &ToolContext,
    image: &DynamicImage,
    roi: Rect,
    result: &DetectionResult,
) -> Result<(), String> {
    let dimensions = Dimensions::of(image);
    let title = cli
        .image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("roiscan");
    let tool = ctx.current_tool.map_or("none", ToolKind::label);
    let description = format!("{tool}: {}", summary(result));
    let params_json = match ctx.current_tool {
        Some(ToolKind::Line) => serde_json::to_string(&ctx.params.line),
        Some(ToolKind::Point) => serde_json::to_string(&ctx.params.point),
        Some(ToolKind::Circle) => serde_json::to_string(&ctx.params.circle),
        None => serde_json::to_string(&ctx.params),
    }
    .map_err(|e| format!("Error serializing parameters: {e}"))?;
    let metadata = SvgMetadata {
        title: Some(title),
        description: Some(&description),
        params_json: Some(&params_json),
    };
    let svg = to_svg(result, dimensions, clamp(dimensions, roi), &metadata);
    std::fs::write(path, &svg)
        .map_err(|e| format!("Error writing SVG to {}: {e}", path.display()))?;
    log::info!("SVG written to {} ({} bytes)", path.display(), svg.len());
    Ok(())
}

fn write_png(
    path: &Path,
    image: &DynamicImage,
    roi: Rect,
    result: &DetectionResult,
) -> Result<(), String> {
    let region = clamp(Dimensions::of(image), roi);
    let overlay = render_overlay(&image.to_rgba8(), result, region)
        .map_err(|e| format!("Error rendering overlay: {e}"))?;
    overlay
        .save(path)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    log::info!("overlay written to {}", path.display());
    Ok(())
}
