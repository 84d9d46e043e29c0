use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use super::resize::TargetGeometry;
use crate::quantize::SampledPixel;

/// Pixels with alpha at or below this value are treated as empty cells.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

/// Resamples `image` to the target grid with nearest-neighbour filtering and
/// returns every pixel whose alpha exceeds `alpha_threshold`, tagged with its
/// row-major index in the target grid.
pub fn import_sample(
    image: &DynamicImage,
    geometry: TargetGeometry,
    alpha_threshold: u8,
) -> Vec<SampledPixel> {
    let resized = if image.dimensions() == (geometry.columns, geometry.rows) {
        image.to_rgba8()
    } else {
        image.resize_exact(geometry.columns, geometry.rows, FilterType::Nearest).to_rgba8()
    };

    resized
        .pixels()
        .enumerate()
        .filter(|(_, pixel)| pixel.0[3] > alpha_threshold)
        .map(|(index, pixel)| {
            let [r, g, b, _] = pixel.0;
            SampledPixel { r, g, b, index }
        })
        .collect()
}
