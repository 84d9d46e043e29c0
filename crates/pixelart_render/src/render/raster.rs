use std::io::Cursor;

use image::{DynamicImage, ImageOutputFormat, Rgb as ImageRgb, RgbImage, Rgba, RgbaImage};
use kurbo::{BezPath, PathEl};
use log::{debug, warn};
use tiny_skia::{
    Color, FillRule, FilterQuality, GradientStop, LineCap, LineJoin, Paint, PathBuilder, Pixmap,
    PixmapPaint, Point, RadialGradient, SpreadMode, Stroke, Transform,
};

use super::blur;
use super::effects::{BlendMode, BulbConfig, GlowConfig};
use super::layers::{GridLines, LayerPass, LayerStack};
use super::{ExportFormat, FrameBackend, FrameOutput};
use crate::grid::Rgb;
use crate::PixelArtError;

impl From<BlendMode> for tiny_skia::BlendMode {
    fn from(mode: BlendMode) -> Self {
        match mode {
            BlendMode::Normal => tiny_skia::BlendMode::SourceOver,
            BlendMode::Multiply => tiny_skia::BlendMode::Multiply,
            BlendMode::Screen => tiny_skia::BlendMode::Screen,
            BlendMode::Overlay => tiny_skia::BlendMode::Overlay,
            BlendMode::Darken => tiny_skia::BlendMode::Darken,
            BlendMode::Lighten => tiny_skia::BlendMode::Lighten,
            BlendMode::ColorDodge => tiny_skia::BlendMode::ColorDodge,
            BlendMode::ColorBurn => tiny_skia::BlendMode::ColorBurn,
            BlendMode::HardLight => tiny_skia::BlendMode::HardLight,
            BlendMode::SoftLight => tiny_skia::BlendMode::SoftLight,
            BlendMode::Difference => tiny_skia::BlendMode::Difference,
            BlendMode::Exclusion => tiny_skia::BlendMode::Exclusion,
        }
    }
}

/// Immediate-mode backend drawing into a `tiny-skia` pixmap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterBackend {
    /// Device pixels per local unit.
    pub scale: f32,
}

impl Default for RasterBackend {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl RasterBackend {
    pub fn new(scale: f32) -> Self {
        Self { scale: if scale.is_finite() && scale > 0.0 { scale } else { 1.0 } }
    }

    pub fn rasterize(&self, stack: &LayerStack) -> Result<RasterFrame, PixelArtError> {
        let width = ((stack.bounds.width() * self.scale as f64).ceil() as u32).max(1);
        let height = ((stack.bounds.height() * self.scale as f64).ceil() as u32).max(1);
        let mut pixmap = new_pixmap(width, height)?;

        let base = Transform::from_scale(self.scale, self.scale)
            .pre_translate(-stack.bounds.x0 as f32, -stack.bounds.y0 as f32);

        if let Some(background) = stack.background {
            pixmap.fill(Color::from_rgba8(background.r, background.g, background.b, 255));
        }

        let mut skipped = 0;
        let mut cells = Vec::with_capacity(stack.cells.len());
        for cell in &stack.cells {
            match cell.path.to_bez_path().and_then(|path| to_skia_path(&path)) {
                Some(path) => {
                    cells.push(SkiaCell { color: cell.color, bounds: cell.path.bounds(), path })
                },
                None => {
                    debug!("skipping cell ({}, {}): outline cannot be drawn", cell.x, cell.y);
                    skipped += 1;
                },
            }
        }
        if skipped > 0 {
            warn!("skipped {skipped} cells with undrawable outlines");
        }

        for pass in &stack.passes {
            match pass {
                LayerPass::Glow(glow) => self.draw_glow(&mut pixmap, &cells, glow, base)?,
                LayerPass::Fill => draw_fill(&mut pixmap, &cells, base),
                LayerPass::Highlight(bulb) => draw_highlight(&mut pixmap, &cells, bulb, base)?,
            }
        }

        if let Some(grid_lines) = &stack.grid_lines {
            draw_grid_lines(&mut pixmap, grid_lines, base);
        }

        Ok(RasterFrame { pixmap, background: stack.background })
    }

    fn draw_glow(
        &self,
        target: &mut Pixmap,
        cells: &[SkiaCell],
        glow: &GlowConfig,
        base: Transform,
    ) -> Result<(), PixelArtError> {
        let mut layer = new_pixmap(target.width(), target.height())?;
        let transform = base.pre_translate(glow.offset_x, glow.offset_y);
        // Mitered stroke dilates with a square kernel, like `feMorphology`.
        let spread = glow.spread();
        let stroke =
            Stroke { width: spread * 2.0, line_join: LineJoin::Miter, ..Stroke::default() };

        for cell in cells {
            let paint = solid_paint(cell.color, true);
            layer.fill_path(&cell.path, &paint, FillRule::Winding, transform, None);
            if spread > 0.0 {
                layer.stroke_path(&cell.path, &paint, &stroke, transform, None);
            }
        }

        let (width, height) = (layer.width() as usize, layer.height() as usize);
        blur::gaussian_blur(layer.data_mut(), width, height, glow.blur_sigma() * self.scale);
        scale_alpha(layer.data_mut(), glow.alpha_slope());

        let paint = PixmapPaint {
            opacity: glow.layer_opacity(),
            blend_mode: glow.blend_mode.into(),
            quality: FilterQuality::Nearest,
        };
        target.draw_pixmap(0, 0, layer.as_ref(), &paint, Transform::identity(), None);
        Ok(())
    }
}

impl FrameBackend for RasterBackend {
    fn draw(&self, stack: &LayerStack) -> Result<FrameOutput, PixelArtError> {
        self.rasterize(stack).map(FrameOutput::Raster)
    }
}

struct SkiaCell {
    color: Rgb,
    bounds: kurbo::Rect,
    path: tiny_skia::Path,
}

fn new_pixmap(width: u32, height: u32) -> Result<Pixmap, PixelArtError> {
    Pixmap::new(width, height).ok_or(PixelArtError::Surface { width, height })
}

fn solid_paint(color: Rgb, anti_alias: bool) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, 255);
    paint.anti_alias = anti_alias;
    paint
}

/// `None` for paths that collapse to nothing.
fn to_skia_path(path: &BezPath) -> Option<tiny_skia::Path> {
    let mut builder = PathBuilder::new();
    for element in path.elements() {
        match *element {
            PathEl::MoveTo(p) => builder.move_to(p.x as f32, p.y as f32),
            PathEl::LineTo(p) => builder.line_to(p.x as f32, p.y as f32),
            PathEl::QuadTo(p1, p2) => {
                builder.quad_to(p1.x as f32, p1.y as f32, p2.x as f32, p2.y as f32)
            },
            PathEl::CurveTo(p1, p2, p3) => builder.cubic_to(
                p1.x as f32,
                p1.y as f32,
                p2.x as f32,
                p2.y as f32,
                p3.x as f32,
                p3.y as f32,
            ),
            PathEl::ClosePath => builder.close(),
        }
    }
    builder.finish()
}

fn draw_fill(target: &mut Pixmap, cells: &[SkiaCell], base: Transform) {
    for cell in cells {
        let paint = solid_paint(cell.color, false);
        target.fill_path(&cell.path, &paint, FillRule::Winding, base, None);
    }
}

fn draw_highlight(
    target: &mut Pixmap,
    cells: &[SkiaCell],
    bulb: &BulbConfig,
    base: Transform,
) -> Result<(), PixelArtError> {
    let mut layer = new_pixmap(target.width(), target.height())?;
    let (cx, cy, radius) = bulb.unit_geometry();
    let center = Point::from_xy(cx, cy);
    let alpha = (bulb.inner_alpha() * 255.0).round() as u8;
    let Rgb { r, g, b } = bulb.color;

    for cell in cells {
        // Gradient space is the unit square mapped onto the shape's bounds.
        let bounds = cell.bounds;
        let unit_to_bounds = Transform::from_row(
            bounds.width() as f32,
            0.0,
            0.0,
            bounds.height() as f32,
            bounds.x0 as f32,
            bounds.y0 as f32,
        );
        let stops = vec![
            GradientStop::new(0.0, Color::from_rgba8(r, g, b, alpha)),
            GradientStop::new(1.0, Color::from_rgba8(r, g, b, 0)),
        ];
        let Some(shader) =
            RadialGradient::new(center, center, radius, stops, SpreadMode::Pad, unit_to_bounds)
        else {
            continue;
        };

        let paint = Paint { shader, anti_alias: true, ..Paint::default() };
        layer.fill_path(&cell.path, &paint, FillRule::Winding, base, None);
    }

    let paint = PixmapPaint {
        opacity: 1.0,
        blend_mode: bulb.blend_mode.into(),
        quality: FilterQuality::Nearest,
    };
    target.draw_pixmap(0, 0, layer.as_ref(), &paint, Transform::identity(), None);
    Ok(())
}

fn draw_grid_lines(target: &mut Pixmap, grid_lines: &GridLines, base: Transform) {
    let mut builder = PathBuilder::new();
    for line in &grid_lines.lines {
        builder.move_to(line.p0.x as f32, line.p0.y as f32);
        builder.line_to(line.p1.x as f32, line.p1.y as f32);
    }
    let Some(path) = builder.finish() else { return };

    let paint = solid_paint(grid_lines.style.color, false);
    let stroke = Stroke {
        width: grid_lines.style.width.max(0.0),
        line_cap: LineCap::Square,
        ..Stroke::default()
    };
    target.stroke_path(&path, &paint, &stroke, base, None);
}

/// Multiplies premultiplied alpha by `slope`, saturating at opaque.
fn scale_alpha(data: &mut [u8], slope: f32) {
    if slope == 1.0 {
        return;
    }

    for pixel in data.chunks_exact_mut(4) {
        let alpha = pixel[3];
        if alpha == 0 {
            continue;
        }
        let scaled = (alpha as f32 * slope).min(255.0).round();
        let factor = scaled / alpha as f32;
        for channel in &mut pixel[..3] {
            *channel = (*channel as f32 * factor).round().min(scaled) as u8;
        }
        pixel[3] = scaled as u8;
    }
}

/// A rendered frame. Pixels are premultiplied internally; accessors return
/// straight alpha.
#[derive(Clone, Debug)]
pub struct RasterFrame {
    pixmap: Pixmap,
    background: Option<Rgb>,
}

impl RasterFrame {
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        let color = self.pixmap.pixel(x, y)?.demultiply();
        Some([color.red(), color.green(), color.blue(), color.alpha()])
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        let pixels = self.pixmap.pixels();
        let width = self.width();
        RgbaImage::from_fn(width, self.height(), |x, y| {
            let color = pixels[(y * width + x) as usize].demultiply();
            Rgba([color.red(), color.green(), color.blue(), color.alpha()])
        })
    }

    /// Composites onto the frame background (white when there is none).
    pub fn to_rgb_image(&self) -> RgbImage {
        let matte = self.background.unwrap_or(Rgb::WHITE).to_array();
        let rgba = self.to_rgba_image();
        RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
            let Rgba([r, g, b, a]) = *rgba.get_pixel(x, y);
            let over = |source: u8, matte: u8| {
                ((source as u32 * a as u32 + matte as u32 * (255 - a as u32) + 127) / 255) as u8
            };
            ImageRgb([over(r, matte[0]), over(g, matte[1]), over(b, matte[2])])
        })
    }

    pub fn encode(&self, format: ExportFormat) -> Result<Vec<u8>, PixelArtError> {
        let mut bytes = Cursor::new(Vec::new());
        match format {
            ExportFormat::Png => {
                DynamicImage::ImageRgba8(self.to_rgba_image())
                    .write_to(&mut bytes, ImageOutputFormat::Png)?;
            },
            ExportFormat::Jpeg { quality } => {
                DynamicImage::ImageRgb8(self.to_rgb_image())
                    .write_to(&mut bytes, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))?;
            },
            ExportFormat::Svg => {
                return Err(PixelArtError::UnsupportedExport { format: "SVG", backend: "raster" });
            },
        }
        Ok(bytes.into_inner())
    }
}
