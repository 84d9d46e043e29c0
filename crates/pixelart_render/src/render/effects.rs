use serde::{Deserialize, Serialize};

use crate::grid::Rgb;

/// Compositing mode for an effect layer, named after CSS `mix-blend-mode`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlendMode {
    #[default]
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

impl BlendMode {
    pub fn css_name(self) -> &'static str {
        match self {
            BlendMode::Normal => "normal",
            BlendMode::Multiply => "multiply",
            BlendMode::Screen => "screen",
            BlendMode::Overlay => "overlay",
            BlendMode::Darken => "darken",
            BlendMode::Lighten => "lighten",
            BlendMode::ColorDodge => "color-dodge",
            BlendMode::ColorBurn => "color-burn",
            BlendMode::HardLight => "hard-light",
            BlendMode::SoftLight => "soft-light",
            BlendMode::Difference => "difference",
            BlendMode::Exclusion => "exclusion",
        }
    }
}

fn percent(value: f32, max: f32) -> f32 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, max) / 100.0
}

/// Soft halo drawn beneath the cell fills.
///
/// `size` and `spread` are in local units; `intensity` (0–200) amplifies the
/// halo alpha, `opacity` (0–100) scales the whole layer.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlowConfig {
    pub enabled: bool,
    pub size: f32,
    pub intensity: f32,
    pub spread: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub opacity: f32,
    pub blend_mode: BlendMode,
}

impl Default for GlowConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            size: 0.0,
            intensity: 50.0,
            spread: 0.0,
            offset_x: 0.0,
            offset_y: 0.0,
            opacity: 50.0,
            blend_mode: BlendMode::Normal,
        }
    }
}

impl GlowConfig {
    /// Standard deviation of the Gaussian blur, in local units.
    pub fn blur_sigma(&self) -> f32 {
        self.size.max(0.0) / 2.0
    }

    pub fn spread(&self) -> f32 {
        self.spread.max(0.0)
    }

    /// Multiplier applied to the blurred halo alpha.
    pub fn alpha_slope(&self) -> f32 {
        percent(self.intensity, 200.0)
    }

    pub fn layer_opacity(&self) -> f32 {
        percent(self.opacity, 100.0)
    }
}

/// Radial highlight drawn above the cell fills.
///
/// Position and radius are percentages of the shape's bounding box, so
/// non-square shapes get an elliptical gradient.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulbConfig {
    pub enabled: bool,
    pub intensity: f32,
    pub radius: f32,
    pub position_x: f32,
    pub position_y: f32,
    pub color: Rgb,
    pub blend_mode: BlendMode,
}

impl Default for BulbConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 50.0,
            radius: 50.0,
            position_x: 50.0,
            position_y: 50.0,
            color: Rgb::WHITE,
            blend_mode: BlendMode::Normal,
        }
    }
}

impl BulbConfig {
    /// Opacity of the gradient's inner stop.
    pub fn inner_alpha(&self) -> f32 {
        percent(self.intensity, 100.0)
    }

    /// Gradient center and radius as fractions of a unit bounding box.
    pub fn unit_geometry(&self) -> (f32, f32, f32) {
        (
            percent(self.position_x, 100.0),
            percent(self.position_y, 100.0),
            self.radius.max(0.0) / 100.0,
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectConfig {
    pub glow: GlowConfig,
    pub bulb: BulbConfig,
}

impl EffectConfig {
    pub fn glow(&self) -> Option<&GlowConfig> {
        self.glow.enabled.then_some(&self.glow)
    }

    pub fn bulb(&self) -> Option<&BulbConfig> {
        self.bulb.enabled.then_some(&self.bulb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_take_defaults() {
        let glow: GlowConfig = serde_json::from_str(r#"{ "enabled": true, "size": 8 }"#).unwrap();

        assert!(glow.enabled);
        assert_eq!(glow.size, 8.0);
        assert_eq!(glow.intensity, 50.0);
        assert_eq!(glow.opacity, 50.0);
        assert_eq!(glow.spread, 0.0);
        assert_eq!(glow.blend_mode, BlendMode::Normal);
    }

    #[test]
    fn blend_modes_use_css_names() {
        let mode: BlendMode = serde_json::from_str(r#""color-dodge""#).unwrap();
        assert_eq!(mode, BlendMode::ColorDodge);
        assert_eq!(mode.css_name(), "color-dodge");
    }

    #[test]
    fn percentages_are_clamped() {
        let glow = GlowConfig { intensity: 500.0, opacity: -3.0, ..GlowConfig::default() };
        assert_eq!(glow.alpha_slope(), 2.0);
        assert_eq!(glow.layer_opacity(), 0.0);
    }

    #[test]
    fn bulb_geometry_is_fractional() {
        let bulb = BulbConfig {
            position_x: 25.0,
            position_y: 130.0,
            radius: 80.0,
            ..BulbConfig::default()
        };
        assert_eq!(bulb.unit_geometry(), (0.25, 1.0, 0.8));
    }

    #[test]
    fn disabled_effects_are_hidden() {
        let effects = EffectConfig::default();
        assert!(effects.glow().is_none());
        assert!(effects.bulb().is_none());
    }
}
