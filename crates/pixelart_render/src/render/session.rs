use log::debug;

use super::layers::LayeredRenderer;
use super::memo::{FrameScheduler, Memo};
use super::{FrameBackend, FrameOutput, RenderSettings};
use crate::grid::PixelGrid;
use crate::viewport::{visible_range, Viewport, VisibleRange};
use crate::PixelArtError;

/// Everything a frame depends on. `viewport: None` renders the whole grid.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameRequest {
    pub grid: PixelGrid,
    pub viewport: Option<Viewport>,
    pub settings: RenderSettings,
}

impl FrameRequest {
    pub fn new(grid: PixelGrid, settings: RenderSettings) -> Self {
        Self { grid, viewport: None, settings }
    }

    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self
    }
}

/// Inputs of the culling step.
#[derive(Clone, Copy, Debug, PartialEq)]
struct RangeKey {
    viewport: Viewport,
    cell_size: f64,
    grid_width: u32,
    grid_height: u32,
}

#[derive(Clone, Debug, PartialEq)]
struct FrameKey {
    grid: PixelGrid,
    range: VisibleRange,
    settings: RenderSettings,
}

/// Interactive rendering loop for a host UI.
///
/// The host calls [`RenderSession::request`] on every state change and
/// [`RenderSession::tick`] from its frame callback. Requests between two
/// ticks collapse into the latest one, and a tick whose grid, visible range
/// and settings match the previous frame reuses it.
pub struct RenderSession<B> {
    renderer: LayeredRenderer,
    backend: B,
    scheduler: FrameScheduler<FrameRequest>,
    range: Memo<RangeKey, VisibleRange>,
    frame: Memo<FrameKey, FrameOutput>,
}

impl<B: FrameBackend> RenderSession<B> {
    pub fn new(backend: B) -> Self {
        Self::with_renderer(LayeredRenderer::default(), backend)
    }

    pub fn with_renderer(renderer: LayeredRenderer, backend: B) -> Self {
        Self {
            renderer,
            backend,
            scheduler: FrameScheduler::new(),
            range: Memo::new(),
            frame: Memo::new(),
        }
    }

    /// Queues `request`, replacing any request not yet drawn. Returns `true`
    /// when the host needs to schedule a tick.
    pub fn request(&mut self, request: FrameRequest) -> bool {
        self.scheduler.invalidate(request)
    }

    pub fn is_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Draws the latest pending request. Returns `None` when nothing was
    /// pending.
    pub fn tick(&mut self) -> Result<Option<&FrameOutput>, PixelArtError> {
        let Some(request) = self.scheduler.tick() else {
            return Ok(None);
        };

        let (grid_width, grid_height) = (request.grid.width(), request.grid.height());
        let range = match request.viewport {
            Some(viewport) => {
                let cell_size = request.settings.cell_size;
                let key = RangeKey { viewport, cell_size, grid_width, grid_height };
                *self.range.get_or_compute(key, |key| {
                    visible_range(&key.viewport, key.cell_size, key.grid_width, key.grid_height)
                })
            },
            None => VisibleRange::full(grid_width, grid_height),
        };
        let key = FrameKey { grid: request.grid, range, settings: request.settings };
        let Self { renderer, backend, frame, .. } = self;
        let output = frame.get_or_try_compute(key, |key| {
            debug!(
                "drawing cells {}..{} x {}..{}",
                key.range.start_x, key.range.end_x, key.range.start_y, key.range.end_y
            );
            renderer.render(&*backend, &key.grid, key.range, &key.settings)
        })?;
        Ok(Some(output))
    }

    /// The most recently drawn frame.
    pub fn last_frame(&self) -> Option<&FrameOutput> {
        self.frame.get()
    }

    /// Number of frames actually drawn, as opposed to reused.
    pub fn frames_drawn(&self) -> u64 {
        self.frame.recomputations()
    }

    /// Number of times the visible range was culled from a viewport.
    pub fn ranges_computed(&self) -> u64 {
        self.range.recomputations()
    }

    pub fn renderer(&self) -> &LayeredRenderer {
        &self.renderer
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::shape::{CellShape, CellShapeConfig};
    use crate::grid::Rgb;
    use crate::render::raster::RasterBackend;
    use crate::render::vector::VectorBackend;

    fn grid() -> PixelGrid {
        let mut grid = PixelGrid::blank(40, 40).unwrap();
        grid.set(0, 0, Some(Rgb::new(9, 9, 9)));
        grid.set(39, 39, Some(Rgb::new(200, 200, 200)));
        grid
    }

    #[test]
    fn nothing_pending_draws_nothing() {
        let mut session = RenderSession::new(VectorBackend);
        assert!(session.tick().unwrap().is_none());
        assert_eq!(session.frames_drawn(), 0);
    }

    #[test]
    fn burst_of_requests_draws_only_the_latest() {
        let mut session = RenderSession::new(RasterBackend::default());

        let first = FrameRequest::new(grid(), RenderSettings::default());
        let mut last = first.clone();
        last.settings.shape = CellShapeConfig::new(CellShape::Circle);

        assert!(session.request(first));
        assert!(!session.request(last));
        session.tick().unwrap();

        assert_eq!(session.frames_drawn(), 1);
        assert!(!session.is_pending());
        // Only circle outlines were ever built.
        assert_eq!(session.renderer().geometry().len(), 2);
    }

    #[test]
    fn unchanged_state_reuses_the_frame() {
        let mut session = RenderSession::new(VectorBackend);
        let request = FrameRequest::new(grid(), RenderSettings::default());

        session.request(request.clone());
        session.tick().unwrap();
        session.request(request);
        session.tick().unwrap();

        assert_eq!(session.frames_drawn(), 1);
    }

    #[test]
    fn small_scroll_inside_the_buffer_reuses_the_frame() {
        let mut session = RenderSession::new(VectorBackend);
        let base = FrameRequest::new(grid(), RenderSettings::default());

        // Both viewports cull to the same range once the buffer is applied.
        session.request(base.clone().with_viewport(Viewport::new(100.0, 100.0, 50.0, 50.0, 1.0)));
        session.tick().unwrap();
        session.request(base.clone().with_viewport(Viewport::new(101.0, 102.0, 48.0, 48.0, 1.0)));
        session.tick().unwrap();
        assert_eq!(session.frames_drawn(), 1);

        session.request(base.with_viewport(Viewport::new(200.0, 100.0, 50.0, 50.0, 1.0)));
        session.tick().unwrap();
        assert_eq!(session.frames_drawn(), 2);
    }

    #[test]
    fn settings_change_reuses_the_visible_range() {
        let mut session = RenderSession::new(VectorBackend);
        let base = FrameRequest::new(grid(), RenderSettings::default())
            .with_viewport(Viewport::new(100.0, 100.0, 50.0, 50.0, 1.0));
        let mut recolored = base.clone();
        recolored.settings.background = Some(Rgb::BLACK);
        let mut zoomed = base.clone();
        zoomed.settings.cell_size = 5.0;

        for request in [base, recolored, zoomed] {
            session.request(request);
            session.tick().unwrap();
        }

        assert_eq!(session.frames_drawn(), 3);
        assert_eq!(session.ranges_computed(), 2);
    }

    #[test]
    fn failed_frame_keeps_the_previous_one() {
        let mut session = RenderSession::new(VectorBackend);
        let good = FrameRequest::new(grid(), RenderSettings::default());
        let mut bad = good.clone();
        bad.settings.cell_size = -1.0;

        session.request(good);
        session.tick().unwrap();
        session.request(bad);
        assert!(session.tick().is_err());

        assert!(session.last_frame().is_some());
        assert_eq!(session.frames_drawn(), 1);
    }
}
