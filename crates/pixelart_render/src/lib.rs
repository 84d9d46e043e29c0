pub mod geometry;
pub mod grid;
pub mod image_pipeline;
pub mod quantize;
pub mod render;
pub mod viewport;

use std::path::Path;

use image::{DynamicImage, GenericImageView};
use log::debug;

pub use geometry::engine::{CacheStats, ShapeGeometryEngine, DEFAULT_CACHE_CAPACITY};
pub use geometry::shape::{CellShape, CellShapeConfig, CornerRadius, CustomPath, Outline, ShapePath};
pub use grid::{PixelGrid, Rgb};
pub use image_pipeline::resize::{LayoutPolicy, TargetGeometry};
pub use image_pipeline::sample::{import_sample, DEFAULT_ALPHA_THRESHOLD};
pub use quantize::palette::{build_grid, palette};
pub use quantize::{quantize, Cluster, SampledPixel, MAX_CLUSTERS, MIN_CLUSTERS};
pub use render::effects::{BlendMode, BulbConfig, EffectConfig, GlowConfig};
pub use render::layers::{LayerKind, LayerStack, LayeredRenderer};
pub use render::memo::{FrameScheduler, Memo};
pub use render::raster::{RasterBackend, RasterFrame};
pub use render::session::{FrameRequest, RenderSession};
pub use render::vector::{VectorBackend, VectorDocument};
pub use render::{ExportFormat, FrameBackend, FrameOutput, GridLineStyle, RenderSettings};
pub use viewport::{visible_range, Viewport, VisibleRange, CULL_BUFFER_CELLS};

#[derive(Debug, thiserror::Error)]
pub enum PixelArtError {
    #[error("failed to load image: {0}")]
    Image(#[from] image::ImageError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported layout dimensions")]
    InvalidLayout,
    #[error("cluster count {0} is outside {MIN_CLUSTERS}..={MAX_CLUSTERS}")]
    InvalidClusterCount(usize),
    #[error("grid must have at least one row and one column")]
    EmptyGrid,
    #[error("expected {expected} cells, found {found}")]
    CellCountMismatch { expected: usize, found: usize },
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },
    #[error("invalid color literal {0:?}")]
    InvalidColor(String),
    #[error("custom shape requires path data")]
    MissingCustomPath,
    #[error("cell size must be positive and larger than the gap (size {size}, gap {gap})")]
    InvalidCellSize { size: f64, gap: f64 },
    #[error("cannot allocate a {width}x{height} raster surface")]
    Surface { width: u32, height: u32 },
    #[error("{format} export is not available for {backend} frames")]
    UnsupportedExport { format: &'static str, backend: &'static str },
    #[error("failed to write vector document")]
    Vector(#[from] std::fmt::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Upper bound on palette size, in `[MIN_CLUSTERS, MAX_CLUSTERS]`.
    pub colors: usize,
    /// Pixels with alpha at or below this become empty cells.
    pub alpha_threshold: u8,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { colors: 16, alpha_threshold: DEFAULT_ALPHA_THRESHOLD }
    }
}

impl ConvertOptions {
    pub fn validate(&self) -> Result<(), PixelArtError> {
        if !(MIN_CLUSTERS..=MAX_CLUSTERS).contains(&self.colors) {
            return Err(PixelArtError::InvalidClusterCount(self.colors));
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct ConversionOutput {
    pub grid: PixelGrid,
    pub clusters: Vec<Cluster>,
    /// Distinct cluster colors, most used first.
    pub palette: Vec<Rgb>,
    pub geometry: TargetGeometry,
}

/// Image to pixel-art grid conversion: resample, quantize, rebuild the grid.
#[derive(Default)]
pub struct PixelArtConverter;

impl PixelArtConverter {
    pub fn convert_path<P: AsRef<Path>>(
        &self,
        path: P,
        layout: LayoutPolicy,
        options: ConvertOptions,
    ) -> Result<ConversionOutput, PixelArtError> {
        let image = image::open(path)?;
        self.convert_image(&image, layout, options)
    }

    pub fn convert_image(
        &self,
        image: &DynamicImage,
        layout: LayoutPolicy,
        options: ConvertOptions,
    ) -> Result<ConversionOutput, PixelArtError> {
        options.validate()?;

        let (width, height) = image.dimensions();
        let geometry = layout.derive(width, height).ok_or(PixelArtError::InvalidLayout)?;

        let pixels = import_sample(image, geometry, options.alpha_threshold);
        let clusters = quantize(&pixels, options.colors);
        let grid = build_grid(&clusters, geometry.columns, geometry.rows)?;
        let palette = palette(&clusters);

        debug!(
            "converted {width}x{height} image to {}x{} grid: {} of {} cells opaque, {} colors",
            geometry.columns,
            geometry.rows,
            pixels.len(),
            geometry.cell_count(),
            palette.len()
        );

        Ok(ConversionOutput { grid, clusters, palette, geometry })
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    fn two_tone(width: u32, height: u32) -> DynamicImage {
        let image = RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([250, 10, 10, 255])
            } else {
                Rgba([10, 10, 250, 255])
            }
        });
        DynamicImage::ImageRgba8(image)
    }

    #[test]
    fn converts_two_tone_image() {
        let output = PixelArtConverter
            .convert_image(&two_tone(8, 4), LayoutPolicy::FixedColumns(8), ConvertOptions {
                colors: 2,
                ..ConvertOptions::default()
            })
            .unwrap();

        assert_eq!(output.geometry, TargetGeometry { columns: 8, rows: 4 });
        assert_eq!(output.grid.filled_count(), 32);
        assert_eq!(output.grid.get(0, 0), Some(Rgb::new(250, 10, 10)));
        assert_eq!(output.grid.get(7, 3), Some(Rgb::new(10, 10, 250)));
        assert_eq!(output.palette.len(), 2);
    }

    #[test]
    fn transparent_pixels_become_empty_cells() {
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([30, 60, 90, 255]));
        image.put_pixel(2, 1, Rgba([0, 0, 0, 0]));

        let output = PixelArtConverter
            .convert_image(
                &DynamicImage::ImageRgba8(image),
                LayoutPolicy::Exact { columns: 4, rows: 4 },
                ConvertOptions::default(),
            )
            .unwrap();

        assert_eq!(output.grid.get(2, 1), None);
        assert_eq!(output.grid.filled_count(), 15);
        assert_eq!(output.palette, vec![Rgb::new(30, 60, 90)]);
    }

    #[test]
    fn rejects_out_of_range_color_count() {
        for colors in [0, 1, 257] {
            let result = PixelArtConverter.convert_image(
                &two_tone(4, 4),
                LayoutPolicy::FixedColumns(4),
                ConvertOptions { colors, ..ConvertOptions::default() },
            );
            assert!(matches!(result, Err(PixelArtError::InvalidClusterCount(n)) if n == colors));
        }
    }

    #[test]
    fn fully_transparent_image_yields_blank_grid() {
        let image = RgbaImage::from_pixel(3, 3, Rgba([255, 255, 255, 0]));

        let output = PixelArtConverter
            .convert_image(
                &DynamicImage::ImageRgba8(image),
                LayoutPolicy::FixedColumns(3),
                ConvertOptions::default(),
            )
            .unwrap();

        assert!(output.clusters.is_empty());
        assert_eq!(output.grid.filled_count(), 0);
    }
}
