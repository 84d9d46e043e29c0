use std::sync::Arc;

use kurbo::{Line, Point, Rect};
use log::debug;

use super::effects::{BulbConfig, GlowConfig};
use super::{FrameBackend, FrameOutput, GridLineStyle, RenderSettings};
use crate::geometry::engine::ShapeGeometryEngine;
use crate::geometry::shape::ShapePath;
use crate::grid::{PixelGrid, Rgb};
use crate::viewport::VisibleRange;
use crate::PixelArtError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    Glow,
    Fill,
    Highlight,
}

/// One compositing pass over every painted cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayerPass {
    Glow(GlowConfig),
    Fill,
    Highlight(BulbConfig),
}

impl LayerPass {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerPass::Glow(_) => LayerKind::Glow,
            LayerPass::Fill => LayerKind::Fill,
            LayerPass::Highlight(_) => LayerKind::Highlight,
        }
    }
}

/// A non-empty cell and its outline.
#[derive(Clone, Debug)]
pub struct CellPaint {
    pub x: u32,
    pub y: u32,
    pub color: Rgb,
    pub path: Arc<ShapePath>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GridLines {
    pub style: GridLineStyle,
    pub lines: Vec<Line>,
}

/// Backend-neutral description of a frame.
///
/// `passes` are composited bottom to top, each over all of `cells`, and grid
/// lines go on top of everything.
#[derive(Clone, Debug)]
pub struct LayerStack {
    pub bounds: Rect,
    pub background: Option<Rgb>,
    pub cells: Vec<CellPaint>,
    pub passes: Vec<LayerPass>,
    pub grid_lines: Option<GridLines>,
}

impl LayerStack {
    pub fn kinds(&self) -> Vec<LayerKind> {
        self.passes.iter().map(LayerPass::kind).collect()
    }
}

/// Composes grids into [`LayerStack`]s and hands them to a backend. Owns the
/// shape cache, so outlines survive across frames.
#[derive(Debug, Default)]
pub struct LayeredRenderer {
    geometry: ShapeGeometryEngine,
}

impl LayeredRenderer {
    pub fn new(geometry: ShapeGeometryEngine) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &ShapeGeometryEngine {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut ShapeGeometryEngine {
        &mut self.geometry
    }

    pub fn compose(
        &mut self,
        grid: &PixelGrid,
        range: VisibleRange,
        settings: &RenderSettings,
    ) -> Result<LayerStack, PixelArtError> {
        settings.validate()?;

        let range = VisibleRange {
            start_x: range.start_x.min(grid.width()),
            end_x: range.end_x.min(grid.width()),
            start_y: range.start_y.min(grid.height()),
            end_y: range.end_y.min(grid.height()),
        };

        let cell_size = settings.cell_size;
        let inset = settings.gap / 2.0;
        let shape_size = settings.shape_size();

        let mut cells = Vec::new();
        for (x, y) in range.cells() {
            let Some(color) = grid.get(x, y) else { continue };
            let path = self.geometry.path_for(
                x as f64 * cell_size + inset,
                y as f64 * cell_size + inset,
                shape_size,
                &settings.shape,
            )?;
            cells.push(CellPaint { x, y, color, path });
        }

        let mut passes = Vec::with_capacity(3);
        if let Some(glow) = settings.effects.glow() {
            passes.push(LayerPass::Glow(*glow));
        }
        passes.push(LayerPass::Fill);
        if let Some(bulb) = settings.effects.bulb() {
            passes.push(LayerPass::Highlight(*bulb));
        }

        let grid_lines = settings
            .grid_lines
            .map(|style| GridLines { style, lines: grid_line_segments(range, cell_size) });

        debug!(
            "composed {} of {} cells into {} passes",
            cells.len(),
            range.cell_count(),
            passes.len()
        );

        Ok(LayerStack {
            bounds: Rect::new(
                range.start_x as f64 * cell_size,
                range.start_y as f64 * cell_size,
                range.end_x as f64 * cell_size,
                range.end_y as f64 * cell_size,
            ),
            background: settings.background,
            cells,
            passes,
            grid_lines,
        })
    }

    pub fn render(
        &mut self,
        backend: &dyn FrameBackend,
        grid: &PixelGrid,
        range: VisibleRange,
        settings: &RenderSettings,
    ) -> Result<FrameOutput, PixelArtError> {
        let stack = self.compose(grid, range, settings)?;
        backend.draw(&stack)
    }
}

/// Cell boundaries inside `range` only.
fn grid_line_segments(range: VisibleRange, cell_size: f64) -> Vec<Line> {
    if range.is_empty() {
        return Vec::new();
    }

    let left = range.start_x as f64 * cell_size;
    let right = range.end_x as f64 * cell_size;
    let top = range.start_y as f64 * cell_size;
    let bottom = range.end_y as f64 * cell_size;

    let vertical = (range.start_x..=range.end_x).map(|x| {
        let x = x as f64 * cell_size;
        Line::new(Point::new(x, top), Point::new(x, bottom))
    });
    let horizontal = (range.start_y..=range.end_y).map(|y| {
        let y = y as f64 * cell_size;
        Line::new(Point::new(left, y), Point::new(right, y))
    });

    vertical.chain(horizontal).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::effects::EffectConfig;

    fn checkerboard(size: u32) -> PixelGrid {
        let mut grid = PixelGrid::blank(size, size).unwrap();
        for y in 0..size {
            for x in 0..size {
                if (x + y) % 2 == 0 {
                    grid.set(x, y, Some(Rgb::new(200, 40, 40)));
                }
            }
        }
        grid
    }

    fn all_effects() -> RenderSettings {
        RenderSettings {
            effects: EffectConfig {
                glow: GlowConfig { enabled: true, size: 4.0, ..GlowConfig::default() },
                bulb: BulbConfig { enabled: true, ..BulbConfig::default() },
            },
            ..RenderSettings::default()
        }
    }

    #[test]
    fn passes_are_ordered_glow_fill_highlight() {
        let grid = checkerboard(6);
        let mut renderer = LayeredRenderer::default();

        let full = renderer.compose(&grid, VisibleRange::full(6, 6), &all_effects()).unwrap();
        assert_eq!(full.kinds(), vec![LayerKind::Glow, LayerKind::Fill, LayerKind::Highlight]);

        let partial = VisibleRange { start_x: 3, end_x: 6, start_y: 2, end_y: 5 };
        let windowed = renderer.compose(&grid, partial, &all_effects()).unwrap();
        assert_eq!(windowed.kinds(), full.kinds());
    }

    #[test]
    fn disabled_effects_leave_only_fill() {
        let grid = checkerboard(2);
        let stack = LayeredRenderer::default()
            .compose(&grid, VisibleRange::full(2, 2), &RenderSettings::default())
            .unwrap();

        assert_eq!(stack.kinds(), vec![LayerKind::Fill]);
    }

    #[test]
    fn empty_cells_are_skipped() {
        let grid = checkerboard(4);
        let stack = LayeredRenderer::default()
            .compose(&grid, VisibleRange::full(4, 4), &RenderSettings::default())
            .unwrap();

        assert_eq!(stack.cells.len(), 8);
        assert!(stack.cells.iter().all(|cell| (cell.x + cell.y) % 2 == 0));
    }

    #[test]
    fn gap_insets_each_shape() {
        let mut grid = PixelGrid::blank(3, 3).unwrap();
        grid.set(2, 1, Some(Rgb::WHITE));
        let settings = RenderSettings { cell_size: 10.0, gap: 2.0, ..RenderSettings::default() };

        let stack = LayeredRenderer::default()
            .compose(&grid, VisibleRange::full(3, 3), &settings)
            .unwrap();

        assert_eq!(stack.cells[0].path.bounds(), Rect::new(21.0, 11.0, 29.0, 19.0));
    }

    #[test]
    fn bounds_cover_the_range() {
        let grid = checkerboard(10);
        let range = VisibleRange { start_x: 2, end_x: 5, start_y: 1, end_y: 3 };

        let stack =
            LayeredRenderer::default().compose(&grid, range, &RenderSettings::default()).unwrap();

        assert_eq!(stack.bounds, Rect::new(20.0, 10.0, 50.0, 30.0));
        assert!(stack.cells.iter().all(|cell| range.contains(cell.x, cell.y)));
    }

    #[test]
    fn range_past_the_grid_is_clamped() {
        let grid = checkerboard(2);
        let range = VisibleRange { start_x: 0, end_x: 40, start_y: 1, end_y: 40 };

        let stack =
            LayeredRenderer::default().compose(&grid, range, &RenderSettings::default()).unwrap();

        assert_eq!(stack.bounds, Rect::new(0.0, 10.0, 20.0, 20.0));
        assert_eq!(stack.cells.len(), 1);
    }

    #[test]
    fn grid_lines_cover_visible_boundaries_only() {
        let grid = checkerboard(10);
        let settings = RenderSettings {
            grid_lines: Some(GridLineStyle::default()),
            ..RenderSettings::default()
        };
        let range = VisibleRange { start_x: 1, end_x: 3, start_y: 0, end_y: 1 };

        let stack = LayeredRenderer::default().compose(&grid, range, &settings).unwrap();
        let lines = stack.grid_lines.unwrap().lines;

        // Three vertical boundaries plus two horizontal ones.
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], Line::new((10.0, 0.0), (10.0, 10.0)));
        assert_eq!(lines[4], Line::new((10.0, 10.0), (30.0, 10.0)));
    }

    #[test]
    fn repeated_frames_reuse_cached_outlines() {
        let grid = checkerboard(4);
        let mut renderer = LayeredRenderer::default();

        renderer.compose(&grid, VisibleRange::full(4, 4), &RenderSettings::default()).unwrap();
        renderer.compose(&grid, VisibleRange::full(4, 4), &RenderSettings::default()).unwrap();

        let stats = renderer.geometry().stats();
        assert_eq!(stats.misses, 8);
        assert_eq!(stats.hits, 8);
    }
}
