//! Multi-pass compositing of a pixel grid onto interchangeable backends.

mod blur;
pub mod effects;
pub mod layers;
pub mod memo;
pub mod raster;
pub mod session;
pub mod vector;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::geometry::shape::CellShapeConfig;
use crate::grid::Rgb;
use crate::PixelArtError;

use effects::EffectConfig;
use layers::LayerStack;
use raster::RasterFrame;
use vector::VectorDocument;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridLineStyle {
    pub color: Rgb,
    pub width: f32,
}

impl Default for GridLineStyle {
    fn default() -> Self {
        Self { color: Rgb::new(0xcc, 0xcc, 0xcc), width: 1.0 }
    }
}

/// Everything besides the grid itself that affects a rendered frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Side of one grid cell, in local units.
    pub cell_size: f64,
    /// Empty space between neighbouring shapes; split evenly around each cell.
    pub gap: f64,
    pub background: Option<Rgb>,
    pub grid_lines: Option<GridLineStyle>,
    pub shape: CellShapeConfig,
    pub effects: EffectConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            cell_size: 10.0,
            gap: 0.0,
            background: None,
            grid_lines: None,
            shape: CellShapeConfig::default(),
            effects: EffectConfig::default(),
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<(), PixelArtError> {
        let size_ok = self.cell_size.is_finite() && self.cell_size > 0.0;
        let gap_ok = self.gap.is_finite() && self.gap >= 0.0 && self.gap < self.cell_size;
        if !size_ok || !gap_ok {
            return Err(PixelArtError::InvalidCellSize { size: self.cell_size, gap: self.gap });
        }
        self.shape.validate()
    }

    /// Side of the drawn shape inside each cell.
    pub fn shape_size(&self) -> f64 {
        self.cell_size - self.gap
    }
}

/// One composited frame, as produced by a [`FrameBackend`].
#[derive(Clone, Debug)]
pub enum FrameOutput {
    Raster(RasterFrame),
    Vector(VectorDocument),
}

impl FrameOutput {
    fn backend_name(&self) -> &'static str {
        match self {
            FrameOutput::Raster(_) => "raster",
            FrameOutput::Vector(_) => "vector",
        }
    }

    pub fn encode(&self, format: ExportFormat) -> Result<Vec<u8>, PixelArtError> {
        match (self, format) {
            (FrameOutput::Raster(frame), ExportFormat::Png | ExportFormat::Jpeg { .. }) => {
                frame.encode(format)
            },
            (FrameOutput::Vector(document), ExportFormat::Svg) => {
                Ok(document.as_str().as_bytes().to_vec())
            },
            _ => Err(PixelArtError::UnsupportedExport {
                format: format.name(),
                backend: self.backend_name(),
            }),
        }
    }
}

/// A rendering target. The compositor builds one [`LayerStack`] and hands it
/// to whichever backend the caller picked.
pub trait FrameBackend {
    fn draw(&self, stack: &LayerStack) -> Result<FrameOutput, PixelArtError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg { quality: u8 },
    Svg,
}

impl ExportFormat {
    pub const DEFAULT_JPEG_QUALITY: u8 = 90;

    /// Picks a format from the file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg { quality: Self::DEFAULT_JPEG_QUALITY }),
            "svg" => Some(ExportFormat::Svg),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ExportFormat::Png => "PNG",
            ExportFormat::Jpeg { .. } => "JPEG",
            ExportFormat::Svg => "SVG",
        }
    }

    pub fn is_vector(self) -> bool {
        matches!(self, ExportFormat::Svg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::shape::CellShape;

    #[test]
    fn rejects_non_positive_cell_size() {
        let settings = RenderSettings { cell_size: 0.0, ..RenderSettings::default() };
        assert!(matches!(settings.validate(), Err(PixelArtError::InvalidCellSize { .. })));

        let settings = RenderSettings { cell_size: f64::NAN, ..RenderSettings::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn gap_must_leave_room_for_the_shape() {
        let settings = RenderSettings { cell_size: 10.0, gap: 10.0, ..RenderSettings::default() };
        assert!(settings.validate().is_err());

        let settings = RenderSettings { cell_size: 10.0, gap: 2.0, ..RenderSettings::default() };
        assert!(settings.validate().is_ok());
        assert_eq!(settings.shape_size(), 8.0);
    }

    #[test]
    fn custom_shape_without_path_is_rejected() {
        let settings = RenderSettings {
            shape: CellShapeConfig::new(CellShape::Custom),
            ..RenderSettings::default()
        };
        assert!(matches!(settings.validate(), Err(PixelArtError::MissingCustomPath)));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(ExportFormat::from_path(Path::new("out.PNG")), Some(ExportFormat::Png));
        assert_eq!(
            ExportFormat::from_path(Path::new("out.jpeg")),
            Some(ExportFormat::Jpeg { quality: ExportFormat::DEFAULT_JPEG_QUALITY })
        );
        assert_eq!(ExportFormat::from_path(Path::new("out.svg")), Some(ExportFormat::Svg));
        assert_eq!(ExportFormat::from_path(Path::new("out.gif")), None);
        assert_eq!(ExportFormat::from_path(Path::new("out")), None);
    }

    #[test]
    fn partial_settings_fill_from_defaults() {
        let settings: RenderSettings =
            serde_json::from_str(r##"{ "cell_size": 16, "background": "#000000" }"##).unwrap();

        assert_eq!(settings.cell_size, 16.0);
        assert_eq!(settings.gap, 0.0);
        assert_eq!(settings.background, Some(Rgb::BLACK));
        assert_eq!(settings.shape, CellShapeConfig::default());
    }
}
