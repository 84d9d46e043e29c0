use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use pixelart_render::{
    CellShapeConfig, EffectConfig, ExportFormat, GridLineStyle, RenderSettings, Rgb,
};
use serde::Deserialize;

/// Render configuration file, e.g. `render.toml`:
///
/// ```toml
/// [render]
/// cell_size = 12
/// background = "#101010"
///
/// [shape]
/// shape = "rectangle"
/// corner_radius = { enabled = true, top_left = 30, top_right = 30 }
///
/// [effects.glow]
/// enabled = true
/// size = 8
///
/// [export]
/// scale = 2
/// ```
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    pub render: RenderSection,
    pub shape: CellShapeConfig,
    pub effects: EffectConfig,
    pub export: ExportSection,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    pub cell_size: f64,
    pub gap: f64,
    pub background: Option<Rgb>,
    pub grid_lines: Option<GridLineStyle>,
}

impl Default for RenderSection {
    fn default() -> Self {
        let settings = RenderSettings::default();
        Self {
            cell_size: settings.cell_size,
            gap: settings.gap,
            background: settings.background,
            grid_lines: settings.grid_lines,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportSection {
    /// Device pixels per local unit for raster output.
    pub scale: f32,
    pub jpeg_quality: u8,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self { scale: 1.0, jpeg_quality: ExportFormat::DEFAULT_JPEG_QUALITY }
    }
}

impl RenderConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {:?}", path))?;
        toml::from_str(&text).with_context(|| format!("failed to parse config {:?}", path))
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn settings(&self) -> RenderSettings {
        RenderSettings {
            cell_size: self.render.cell_size,
            gap: self.render.gap,
            background: self.render.background,
            grid_lines: self.render.grid_lines,
            shape: self.shape.clone(),
            effects: self.effects,
        }
    }

    /// Applies the configured JPEG quality to a format picked from a file name.
    pub fn export_format(&self, format: ExportFormat) -> ExportFormat {
        match format {
            ExportFormat::Jpeg { .. } => ExportFormat::Jpeg { quality: self.export.jpeg_quality },
            format => format,
        }
    }
}

#[cfg(test)]
mod tests {
    use pixelart_render::{BlendMode, CellShape};

    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config: RenderConfig = toml::from_str("").unwrap();
        assert_eq!(config, RenderConfig::default());
        assert_eq!(config.settings(), RenderSettings::default());
    }

    #[test]
    fn sections_fill_from_defaults() {
        let config: RenderConfig = toml::from_str(
            r##"
            [render]
            cell_size = 12.0
            background = "#101010"
            grid_lines = { color = "#333" }

            [shape]
            shape = "hexagon"

            [effects.glow]
            enabled = true
            size = 8.0
            blend_mode = "screen"

            [effects.bulb]
            enabled = true
            color = "#ffee00"

            [export]
            scale = 2.0
            "##,
        )
        .unwrap();

        let settings = config.settings();
        assert_eq!(settings.cell_size, 12.0);
        assert_eq!(settings.background, Some(Rgb::new(0x10, 0x10, 0x10)));
        assert_eq!(settings.grid_lines.unwrap().width, 1.0);
        assert_eq!(settings.shape.shape, CellShape::Hexagon);
        assert_eq!(settings.effects.glow.blend_mode, BlendMode::Screen);
        assert_eq!(settings.effects.glow.opacity, 50.0);
        assert_eq!(settings.effects.bulb.color, Rgb::new(0xff, 0xee, 0x00));
        assert_eq!(settings.effects.bulb.radius, 50.0);
        assert_eq!(config.export.scale, 2.0);
        assert_eq!(config.export.jpeg_quality, 90);
    }

    #[test]
    fn unknown_sections_are_rejected() {
        assert!(toml::from_str::<RenderConfig>("[rendr]\ncell_size = 3.0").is_err());
    }

    #[test]
    fn bad_colors_are_rejected() {
        assert!(toml::from_str::<RenderConfig>("[render]\nbackground = \"teal\"").is_err());
    }

    #[test]
    fn jpeg_quality_comes_from_config() {
        let config = RenderConfig {
            export: ExportSection { jpeg_quality: 70, ..ExportSection::default() },
            ..RenderConfig::default()
        };

        assert_eq!(config.export_format(ExportFormat::Jpeg { quality: 90 }), ExportFormat::Jpeg {
            quality: 70
        });
        assert_eq!(config.export_format(ExportFormat::Png), ExportFormat::Png);
    }
}
