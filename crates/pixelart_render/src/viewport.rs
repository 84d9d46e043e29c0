use serde::{Deserialize, Serialize};

/// Extra cells rendered beyond each viewport edge to hide pop-in while panning.
pub const CULL_BUFFER_CELLS: u32 = 5;

/// Visible window in grid-local units. `scale` is the zoom factor between
/// local and screen units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub scale: f64,
}

impl Viewport {
    pub fn new(left: f64, top: f64, width: f64, height: f64, scale: f64) -> Self {
        debug_assert!(scale > 0.0, "viewport scale must be positive");
        Self { left, top, width: width.max(0.0), height: height.max(0.0), scale }
    }

    /// Converts a scrolled container, measured in screen pixels, into local units.
    pub fn from_container(
        scroll_left: f64,
        scroll_top: f64,
        client_width: f64,
        client_height: f64,
        scale: f64,
    ) -> Self {
        let scale = if scale > 0.0 { scale } else { 1.0 };
        Self::new(
            scroll_left / scale,
            scroll_top / scale,
            client_width / scale,
            client_height / scale,
            scale,
        )
    }
}

/// Half-open cell window: columns `start_x..end_x`, rows `start_y..end_y`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VisibleRange {
    pub start_x: u32,
    pub end_x: u32,
    pub start_y: u32,
    pub end_y: u32,
}

impl VisibleRange {
    /// Every cell of a `grid_width × grid_height` grid, as used for export.
    pub fn full(grid_width: u32, grid_height: u32) -> Self {
        Self { start_x: 0, end_x: grid_width, start_y: 0, end_y: grid_height }
    }

    pub fn columns(&self) -> u32 {
        self.end_x.saturating_sub(self.start_x)
    }

    pub fn rows(&self) -> u32 {
        self.end_y.saturating_sub(self.start_y)
    }

    pub fn is_empty(&self) -> bool {
        self.columns() == 0 || self.rows() == 0
    }

    pub fn cell_count(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.start_x..self.end_x).contains(&x) && (self.start_y..self.end_y).contains(&y)
    }

    /// Cells in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32)> {
        let (start_x, end_x) = (self.start_x, self.end_x);
        (self.start_y..self.end_y).flat_map(move |y| (start_x..end_x).map(move |x| (x, y)))
    }
}

/// Cell window covering `viewport` plus a buffer of [`CULL_BUFFER_CELLS`],
/// clamped to the grid. Stateless: every call recomputes from scratch.
pub fn visible_range(
    viewport: &Viewport,
    cell_size: f64,
    grid_width: u32,
    grid_height: u32,
) -> VisibleRange {
    if cell_size.is_nan() || cell_size <= 0.0 {
        return VisibleRange::default();
    }

    let buffer = CULL_BUFFER_CELLS as f64;
    let span = |start: f64, length: f64, limit: u32| {
        let first = (start / cell_size).floor() - buffer;
        let last = ((start + length.max(0.0)) / cell_size).ceil() + buffer;
        let clamp = |value: f64| value.clamp(0.0, limit as f64) as u32;
        (clamp(first), clamp(last))
    };

    let (start_x, end_x) = span(viewport.left, viewport.width, grid_width);
    let (start_y, end_y) = span(viewport.top, viewport.height, grid_height);

    VisibleRange { start_x, end_x, start_y, end_y }
}
