mod config;

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use pixelart_render::{
    BlendMode, CellShape, ConvertOptions, CornerRadius, CustomPath, ExportFormat, GridLineStyle,
    LayeredRenderer, LayoutPolicy, PixelArtConverter, PixelGrid, RasterBackend, Rgb,
    VectorBackend, VisibleRange, DEFAULT_ALPHA_THRESHOLD,
};
use walkdir::WalkDir;

use crate::config::RenderConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "Convert images to pixel-art grids and render them")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// TOML render configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a truecolor block preview to stdout
    Preview(PreviewArgs),
    /// Convert an image and write a grid (.json) or a rendered frame (.png, .jpg, .svg)
    Convert(ConvertArgs),
    /// Render a grid JSON file to PNG, JPEG or SVG
    Render(RenderArgs),
    /// Convert every image below a directory
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct PreviewArgs {
    /// Input image path
    input: PathBuf,
    #[command(flatten)]
    layout: LayoutArgs,
    #[command(flatten)]
    quantize: QuantizeArgs,
}

#[derive(Parser, Debug)]
struct ConvertArgs {
    /// Input image path
    input: PathBuf,
    /// Output file path; the extension picks the format
    #[arg(short, long)]
    output: PathBuf,
    #[command(flatten)]
    layout: LayoutArgs,
    #[command(flatten)]
    quantize: QuantizeArgs,
    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Grid JSON produced by `convert`
    input: PathBuf,
    /// Output file path; the extension picks the format
    #[arg(short, long)]
    output: PathBuf,
    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Directory searched recursively for images
    input: PathBuf,
    /// Output directory; the input tree is mirrored below it
    #[arg(short, long)]
    out_dir: PathBuf,
    /// Output format for every file
    #[arg(long, value_enum, default_value = "png")]
    format: OutputKind,
    #[command(flatten)]
    layout: LayoutArgs,
    #[command(flatten)]
    quantize: QuantizeArgs,
    #[command(flatten)]
    style: StyleArgs,
}

#[derive(Parser, Debug, Clone, Copy)]
struct LayoutArgs {
    /// Target column count
    #[arg(long, default_value_t = 64)]
    width: u32,
    /// Target row count; rows follow the image aspect ratio when omitted
    #[arg(long)]
    rows: Option<u32>,
    /// Shrink to fit inside `width` x `rows` instead of stretching
    #[arg(long, requires = "rows")]
    fit: bool,
}

#[derive(Parser, Debug, Clone, Copy)]
struct QuantizeArgs {
    /// Maximum palette size (2..256)
    #[arg(long, default_value_t = 16)]
    colors: usize,
    /// Pixels with alpha at or below this value become empty cells
    #[arg(long, default_value_t = DEFAULT_ALPHA_THRESHOLD)]
    alpha_threshold: u8,
}

/// Overrides for values from the render configuration.
#[derive(Parser, Debug, Clone, Default)]
struct StyleArgs {
    /// Cell side in local units
    #[arg(long)]
    cell_size: Option<f64>,
    /// Space between neighbouring shapes
    #[arg(long)]
    gap: Option<f64>,
    /// Cell shape
    #[arg(long, value_enum)]
    shape: Option<ShapeChoice>,
    /// Uniform corner rounding for rectangles, in percent of the cell
    #[arg(long)]
    corner_radius: Option<f32>,
    /// SVG path data for a custom shape; implies `--shape custom`
    #[arg(long)]
    path: Option<String>,
    /// Background color, e.g. "#202020"
    #[arg(long)]
    background: Option<Rgb>,
    /// Draw grid lines with the configured or default style
    #[arg(long, default_value_t = false)]
    grid_lines: bool,
    /// Enable the glow layer with this blur size
    #[arg(long)]
    glow: Option<f32>,
    /// Blend mode for the glow layer
    #[arg(long, value_enum)]
    glow_blend: Option<BlendChoice>,
    /// Enable the bulb highlight layer
    #[arg(long, default_value_t = false)]
    bulb: bool,
    /// Device pixels per local unit for raster output
    #[arg(long)]
    scale: Option<f32>,
    /// JPEG quality (1..100)
    #[arg(long)]
    quality: Option<u8>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ShapeChoice {
    Rectangle,
    Circle,
    Diamond,
    Triangle,
    Hexagon,
    Custom,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum BlendChoice {
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputKind {
    Png,
    Jpeg,
    Svg,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = RenderConfig::load_or_default(cli.config.as_deref())?;
    match cli.command {
        Commands::Preview(args) => preview(args),
        Commands::Convert(args) => convert(args, config),
        Commands::Render(args) => render(args, config),
        Commands::Batch(args) => batch(args, config),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn preview(args: PreviewArgs) -> Result<()> {
    let output = PixelArtConverter
        .convert_path(&args.input, args.layout.policy(), args.quantize.options())
        .with_context(|| format!("failed to convert {:?}", args.input))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in preview_lines(&output.grid) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

/// Two block characters per cell, so cells come out roughly square.
fn preview_lines(grid: &PixelGrid) -> Vec<String> {
    grid.rows()
        .map(|row| {
            let mut line = String::new();
            for cell in row {
                match cell {
                    Some(Rgb { r, g, b }) => line.push_str(&format!("\x1b[38;2;{r};{g};{b}m██")),
                    None => line.push_str("\x1b[0m  "),
                }
            }
            line.push_str("\x1b[0m");
            line
        })
        .collect()
}

fn convert(args: ConvertArgs, mut config: RenderConfig) -> Result<()> {
    args.style.apply(&mut config);

    let output = PixelArtConverter
        .convert_path(&args.input, args.layout.policy(), args.quantize.options())
        .with_context(|| format!("failed to convert {:?}", args.input))?;
    info!(
        "{:?}: {}x{} grid, {} colors",
        args.input,
        output.grid.width(),
        output.grid.height(),
        output.palette.len()
    );

    write_output(&args.output, &output.grid, &config)
}

fn render(args: RenderArgs, mut config: RenderConfig) -> Result<()> {
    args.style.apply(&mut config);

    let file =
        File::open(&args.input).with_context(|| format!("failed to open {:?}", args.input))?;
    let grid: PixelGrid = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse grid {:?}", args.input))?;

    if has_extension(&args.output, "json") {
        anyhow::bail!("render writes images; use png, jpg or svg for {:?}", args.output);
    }
    write_output(&args.output, &grid, &config)
}

fn batch(args: BatchArgs, mut config: RenderConfig) -> Result<()> {
    args.style.apply(&mut config);

    let inputs = collect_images(&args.input)?;
    if inputs.is_empty() {
        anyhow::bail!("no image files found in {:?}", args.input);
    }

    let progress = ProgressBar::new(inputs.len() as u64);
    progress.set_style(
        ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images",
        )
        .context("invalid progress template")?
        .progress_chars("=> "),
    );

    let mut failed = 0;
    for input in &inputs {
        let target = batch_target(&args.input, input, &args.out_dir, args.format);
        let result = convert_one(input, &target, &args, &config);
        if let Err(err) = result {
            failed += 1;
            progress.suspend(|| warn!("{err:#}"));
        }
        progress.inc(1);
    }

    progress.finish_with_message(format!(
        "{} of {} images written to {:?}",
        inputs.len() - failed,
        inputs.len(),
        args.out_dir
    ));
    if failed > 0 {
        anyhow::bail!("{failed} of {} images failed", inputs.len());
    }
    Ok(())
}

fn convert_one(input: &Path, target: &Path, args: &BatchArgs, config: &RenderConfig) -> Result<()> {
    let output = PixelArtConverter
        .convert_path(input, args.layout.policy(), args.quantize.options())
        .with_context(|| format!("failed to convert {:?}", input))?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {:?}", parent))?;
    }
    write_output(target, &output.grid, config)
}

fn collect_images(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        anyhow::bail!("{:?} is not a directory", root);
    }

    let mut entries: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| ImageFormat::from_path(path).is_ok())
        .collect();
    entries.sort();
    Ok(entries)
}

/// Mirrors `input`'s position below `root` into `out_dir`, swapping the extension.
fn batch_target(root: &Path, input: &Path, out_dir: &Path, format: OutputKind) -> PathBuf {
    let relative = input.strip_prefix(root).unwrap_or(input);
    out_dir.join(relative).with_extension(format.extension())
}

/// Writes `grid` as JSON or renders it, depending on the extension of `path`.
fn write_output(path: &Path, grid: &PixelGrid, config: &RenderConfig) -> Result<()> {
    if has_extension(path, "json") {
        let file = File::create(path).with_context(|| format!("failed to create {:?}", path))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, grid)
            .with_context(|| format!("failed to write grid {:?}", path))?;
        writer.flush()?;
        return Ok(());
    }

    let format = ExportFormat::from_path(path)
        .with_context(|| format!("unsupported output format for {:?}", path))?;
    let bytes = render_grid(grid, config, config.export_format(format))?;
    fs::write(path, bytes).with_context(|| format!("failed to write {:?}", path))
}

fn render_grid(grid: &PixelGrid, config: &RenderConfig, format: ExportFormat) -> Result<Vec<u8>> {
    let settings = config.settings();
    let range = VisibleRange::full(grid.width(), grid.height());
    let mut renderer = LayeredRenderer::default();

    let frame = if format.is_vector() {
        renderer.render(&VectorBackend, grid, range, &settings)
    } else {
        renderer.render(&RasterBackend::new(config.export.scale), grid, range, &settings)
    }
    .context("failed to render frame")?;

    frame.encode(format).with_context(|| format!("failed to encode {}", format.name()))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
}

impl LayoutArgs {
    fn policy(self) -> LayoutPolicy {
        match self.rows {
            Some(rows) if self.fit => LayoutPolicy::FitWithin { columns: self.width, rows },
            Some(rows) => LayoutPolicy::Exact { columns: self.width, rows },
            None => LayoutPolicy::FixedColumns(self.width),
        }
    }
}

impl QuantizeArgs {
    fn options(self) -> ConvertOptions {
        ConvertOptions { colors: self.colors, alpha_threshold: self.alpha_threshold }
    }
}

impl StyleArgs {
    fn apply(&self, config: &mut RenderConfig) {
        if let Some(cell_size) = self.cell_size {
            config.render.cell_size = cell_size;
        }
        if let Some(gap) = self.gap {
            config.render.gap = gap;
        }
        if let Some(background) = self.background {
            config.render.background = Some(background);
        }
        if self.grid_lines && config.render.grid_lines.is_none() {
            config.render.grid_lines = Some(GridLineStyle::default());
        }

        if let Some(shape) = self.shape {
            config.shape.shape = shape.to_shape();
        }
        if let Some(radius) = self.corner_radius {
            config.shape.corner_radius = CornerRadius::uniform(radius);
        }
        if let Some(path) = &self.path {
            config.shape.shape = CellShape::Custom;
            config.shape.custom_path = Some(CustomPath::new(path.as_str(), ""));
        }

        if let Some(size) = self.glow {
            config.effects.glow.enabled = true;
            config.effects.glow.size = size;
        }
        if let Some(blend) = self.glow_blend {
            config.effects.glow.blend_mode = blend.to_mode();
        }
        if self.bulb {
            config.effects.bulb.enabled = true;
        }

        if let Some(scale) = self.scale {
            config.export.scale = scale;
        }
        if let Some(quality) = self.quality {
            config.export.jpeg_quality = quality.clamp(1, 100);
        }
    }
}

impl ShapeChoice {
    fn to_shape(self) -> CellShape {
        match self {
            ShapeChoice::Rectangle => CellShape::Rectangle,
            ShapeChoice::Circle => CellShape::Circle,
            ShapeChoice::Diamond => CellShape::Diamond,
            ShapeChoice::Triangle => CellShape::Triangle,
            ShapeChoice::Hexagon => CellShape::Hexagon,
            ShapeChoice::Custom => CellShape::Custom,
        }
    }
}

impl BlendChoice {
    fn to_mode(self) -> BlendMode {
        match self {
            BlendChoice::Normal => BlendMode::Normal,
            BlendChoice::Multiply => BlendMode::Multiply,
            BlendChoice::Screen => BlendMode::Screen,
            BlendChoice::Overlay => BlendMode::Overlay,
            BlendChoice::Darken => BlendMode::Darken,
            BlendChoice::Lighten => BlendMode::Lighten,
            BlendChoice::ColorDodge => BlendMode::ColorDodge,
            BlendChoice::ColorBurn => BlendMode::ColorBurn,
            BlendChoice::HardLight => BlendMode::HardLight,
            BlendChoice::SoftLight => BlendMode::SoftLight,
            BlendChoice::Difference => BlendMode::Difference,
            BlendChoice::Exclusion => BlendMode::Exclusion,
        }
    }
}

impl OutputKind {
    fn extension(self) -> &'static str {
        match self {
            OutputKind::Png => "png",
            OutputKind::Jpeg => "jpg",
            OutputKind::Svg => "svg",
            OutputKind::Json => "json",
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "pixelart",
            "-vv",
            "render",
            "grid.json",
            "-o",
            "out.jpg",
            "--cell-size",
            "6",
            "--shape",
            "circle",
            "--background",
            "#123456",
            "--glow",
            "4",
            "--glow-blend",
            "color-dodge",
            "--quality",
            "150",
        ]);
        assert_eq!(cli.verbose, 2);

        let Commands::Render(args) = cli.command else {
            panic!("expected render command");
        };
        let mut config = RenderConfig::default();
        args.style.apply(&mut config);

        let settings = config.settings();
        assert_eq!(settings.cell_size, 6.0);
        assert_eq!(settings.shape.shape, CellShape::Circle);
        assert_eq!(settings.background, Some(Rgb::new(0x12, 0x34, 0x56)));
        assert!(settings.effects.glow.enabled);
        assert_eq!(settings.effects.glow.size, 4.0);
        assert_eq!(settings.effects.glow.blend_mode, BlendMode::ColorDodge);
        assert!(!settings.effects.bulb.enabled);
        assert_eq!(config.export.jpeg_quality, 100);
    }

    #[test]
    fn unset_flags_keep_config_values() {
        let mut config = RenderConfig::default();
        config.render.gap = 2.0;
        config.render.grid_lines = Some(GridLineStyle { width: 3.0, ..GridLineStyle::default() });

        StyleArgs { grid_lines: true, ..StyleArgs::default() }.apply(&mut config);

        assert_eq!(config.render.gap, 2.0);
        assert_eq!(config.render.grid_lines.map(|style| style.width), Some(3.0));
    }

    #[test]
    fn custom_path_flag_selects_custom_shape() {
        let mut config = RenderConfig::default();
        let style = StyleArgs { path: Some("M0 0 L4 0 L4 4 Z".into()), ..StyleArgs::default() };

        style.apply(&mut config);

        let settings = config.settings();
        assert_eq!(settings.shape.shape, CellShape::Custom);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn layout_flags_pick_policy() {
        let fixed = LayoutArgs { width: 32, rows: None, fit: false };
        let exact = LayoutArgs { width: 32, rows: Some(8), fit: false };
        let fit = LayoutArgs { width: 32, rows: Some(8), fit: true };

        assert_eq!(fixed.policy(), LayoutPolicy::FixedColumns(32));
        assert_eq!(exact.policy(), LayoutPolicy::Exact { columns: 32, rows: 8 });
        assert_eq!(fit.policy(), LayoutPolicy::FitWithin { columns: 32, rows: 8 });
    }

    #[test]
    fn preview_uses_truecolor_blocks() {
        let grid = PixelGrid::from_rows(vec![vec![Some(Rgb::new(1, 2, 3)), None]]).unwrap();

        let lines = preview_lines(&grid);

        assert_eq!(lines, vec!["\x1b[38;2;1;2;3m██\x1b[0m  \x1b[0m".to_string()]);
    }

    #[test]
    fn batch_mirrors_input_tree() {
        let target = batch_target(
            Path::new("in"),
            Path::new("in/sprites/hero.gif"),
            Path::new("out"),
            OutputKind::Svg,
        );

        assert_eq!(target, PathBuf::from("out/sprites/hero.svg"));
    }

    #[test]
    fn rendered_grid_encodes_by_format() {
        let grid = PixelGrid::from_rows(vec![vec![Some(Rgb::WHITE), Some(Rgb::BLACK)]]).unwrap();
        let config = RenderConfig::default();

        let png = render_grid(&grid, &config, ExportFormat::Png).unwrap();
        let svg = render_grid(&grid, &config, ExportFormat::Svg).unwrap();

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
        assert!(String::from_utf8(svg).unwrap().starts_with("<svg"));
    }
}
