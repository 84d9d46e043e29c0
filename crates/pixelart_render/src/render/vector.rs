use std::fmt::Write as _;
use std::io;

use kurbo::Rect;
use log::{debug, warn};

use super::effects::{BlendMode, BulbConfig, GlowConfig};
use super::layers::{CellPaint, GridLines, LayerPass, LayerStack};
use super::{FrameBackend, FrameOutput};
use crate::geometry::shape::Outline;
use crate::PixelArtError;

const GLOW_FILTER_ID: &str = "pixelart-glow";
const BULB_GRADIENT_ID: &str = "pixelart-bulb";

/// Retained-mode backend producing a standalone SVG document.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VectorBackend;

impl FrameBackend for VectorBackend {
    fn draw(&self, stack: &LayerStack) -> Result<FrameOutput, PixelArtError> {
        self.document(stack).map(FrameOutput::Vector)
    }
}

impl VectorBackend {
    pub fn document(&self, stack: &LayerStack) -> Result<VectorDocument, PixelArtError> {
        let shapes = cell_elements(&stack.cells);
        let bounds = stack.bounds;
        let mut svg = String::new();

        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}" viewBox="{} {} {} {}">"#,
            bounds.width(),
            bounds.height(),
            bounds.x0,
            bounds.y0,
            bounds.width(),
            bounds.height()
        )?;

        write_defs(&mut svg, stack)?;

        if let Some(background) = stack.background {
            writeln!(
                svg,
                r#"<rect x="{}" y="{}" width="{}" height="{}" fill="{background}"/>"#,
                bounds.x0,
                bounds.y0,
                bounds.width(),
                bounds.height()
            )?;
        }

        for pass in &stack.passes {
            match pass {
                LayerPass::Glow(glow) => write_glow(&mut svg, &shapes, glow)?,
                LayerPass::Fill => write_fill(&mut svg, &shapes)?,
                LayerPass::Highlight(bulb) => write_highlight(&mut svg, &shapes, bulb)?,
            }
        }

        if let Some(grid_lines) = &stack.grid_lines {
            write_grid_lines(&mut svg, grid_lines)?;
        }

        svg.push_str("</svg>\n");
        Ok(VectorDocument { svg })
    }
}

/// Path element for one cell, without fill.
struct ShapeElement {
    color: String,
    markup: String,
}

fn cell_elements(cells: &[CellPaint]) -> Vec<ShapeElement> {
    let mut skipped = 0;
    let mut elements = Vec::with_capacity(cells.len());

    for cell in cells {
        let markup = match cell.path.outline() {
            Outline::Path(path) => format!(r#"d="{}""#, path.to_svg()),
            // Custom data is emitted verbatim, but only if it would also draw on
            // the raster backend.
            Outline::Custom(custom) if cell.path.to_bez_path().is_some() => {
                let origin = cell.path.origin();
                format!(
                    r#"transform="translate({} {})" d="{}""#,
                    origin.x,
                    origin.y,
                    xml_escape(custom.path.trim())
                )
            },
            Outline::Custom(_) => {
                debug!("skipping cell ({}, {}): custom path does not parse", cell.x, cell.y);
                skipped += 1;
                continue;
            },
        };
        elements.push(ShapeElement { color: cell.color.to_hex(), markup });
    }

    if skipped > 0 {
        warn!("skipped {skipped} cells with undrawable outlines");
    }
    elements
}

fn write_defs(svg: &mut String, stack: &LayerStack) -> std::fmt::Result {
    let glow = stack.passes.iter().find_map(|pass| match pass {
        LayerPass::Glow(glow) => Some(glow),
        _ => None,
    });
    let bulb = stack.passes.iter().find_map(|pass| match pass {
        LayerPass::Highlight(bulb) => Some(bulb),
        _ => None,
    });
    if glow.is_none() && bulb.is_none() {
        return Ok(());
    }

    svg.push_str("<defs>\n");
    if let Some(glow) = glow {
        write_glow_filter(svg, glow, stack.bounds)?;
    }
    if let Some(bulb) = bulb {
        write_bulb_gradient(svg, bulb)?;
    }
    svg.push_str("</defs>\n");
    Ok(())
}

/// Dilate by `spread`, shift, blur, then scale alpha by the intensity. The
/// filter region is the frame itself, matching the raster layer's extent.
fn write_glow_filter(svg: &mut String, glow: &GlowConfig, region: Rect) -> std::fmt::Result {
    writeln!(
        svg,
        r#"<filter id="{GLOW_FILTER_ID}" filterUnits="userSpaceOnUse" x="{}" y="{}" width="{}" height="{}" color-interpolation-filters="sRGB">"#,
        region.x0,
        region.y0,
        region.width(),
        region.height()
    )?;

    let mut input = "SourceGraphic";
    if glow.spread() > 0.0 {
        writeln!(
            svg,
            r#"<feMorphology in="{input}" operator="dilate" radius="{}" result="spread"/>"#,
            glow.spread()
        )?;
        input = "spread";
    }
    writeln!(
        svg,
        r#"<feOffset in="{input}" dx="{}" dy="{}" result="offset"/>"#,
        glow.offset_x, glow.offset_y
    )?;
    writeln!(
        svg,
        r#"<feGaussianBlur in="offset" stdDeviation="{}" result="blur"/>"#,
        glow.blur_sigma()
    )?;
    writeln!(
        svg,
        r#"<feComponentTransfer in="blur"><feFuncA type="linear" slope="{}"/></feComponentTransfer>"#,
        glow.alpha_slope()
    )?;
    svg.push_str("</filter>\n");
    Ok(())
}

fn write_bulb_gradient(svg: &mut String, bulb: &BulbConfig) -> std::fmt::Result {
    let (cx, cy, r) = bulb.unit_geometry();
    writeln!(
        svg,
        r#"<radialGradient id="{BULB_GRADIENT_ID}" gradientUnits="objectBoundingBox" cx="{cx}" cy="{cy}" fx="{cx}" fy="{cy}" r="{r}">"#
    )?;
    writeln!(
        svg,
        r#"<stop offset="0" stop-color="{}" stop-opacity="{}"/>"#,
        bulb.color,
        bulb.inner_alpha()
    )?;
    writeln!(svg, r#"<stop offset="1" stop-color="{}" stop-opacity="0"/>"#, bulb.color)?;
    svg.push_str("</radialGradient>\n");
    Ok(())
}

fn blend_style(mode: BlendMode) -> String {
    match mode {
        BlendMode::Normal => String::new(),
        mode => format!(r#" style="mix-blend-mode:{}""#, mode.css_name()),
    }
}

fn write_glow(svg: &mut String, shapes: &[ShapeElement], glow: &GlowConfig) -> std::fmt::Result {
    writeln!(
        svg,
        r#"<g class="glow" filter="url(#{GLOW_FILTER_ID})" opacity="{}"{}>"#,
        glow.layer_opacity(),
        blend_style(glow.blend_mode)
    )?;
    for shape in shapes {
        writeln!(svg, r#"<path {} fill="{}"/>"#, shape.markup, shape.color)?;
    }
    svg.push_str("</g>\n");
    Ok(())
}

fn write_fill(svg: &mut String, shapes: &[ShapeElement]) -> std::fmt::Result {
    svg.push_str("<g class=\"fill\" shape-rendering=\"crispEdges\">\n");
    for shape in shapes {
        writeln!(svg, r#"<path {} fill="{}"/>"#, shape.markup, shape.color)?;
    }
    svg.push_str("</g>\n");
    Ok(())
}

fn write_highlight(
    svg: &mut String,
    shapes: &[ShapeElement],
    bulb: &BulbConfig,
) -> std::fmt::Result {
    writeln!(
        svg,
        r#"<g class="highlight" fill="url(#{BULB_GRADIENT_ID})"{}>"#,
        blend_style(bulb.blend_mode)
    )?;
    for shape in shapes {
        writeln!(svg, "<path {}/>", shape.markup)?;
    }
    svg.push_str("</g>\n");
    Ok(())
}

fn write_grid_lines(svg: &mut String, grid_lines: &GridLines) -> std::fmt::Result {
    if grid_lines.lines.is_empty() {
        return Ok(());
    }

    let mut d = String::new();
    for line in &grid_lines.lines {
        write!(d, "M{} {}L{} {}", line.p0.x, line.p0.y, line.p1.x, line.p1.y)?;
    }
    writeln!(
        svg,
        r#"<path class="grid-lines" d="{d}" fill="none" stroke="{}" stroke-width="{}" stroke-linecap="square" shape-rendering="crispEdges"/>"#,
        grid_lines.style.color,
        grid_lines.style.width.max(0.0)
    )
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// A standalone SVG document with its filter and gradient definitions inline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VectorDocument {
    svg: String,
}

impl VectorDocument {
    pub fn as_str(&self) -> &str {
        &self.svg
    }

    pub fn into_string(self) -> String {
        self.svg
    }

    pub fn write_to<W: io::Write>(&self, mut writer: W) -> Result<(), PixelArtError> {
        writer.write_all(self.svg.as_bytes())?;
        Ok(())
    }
}
