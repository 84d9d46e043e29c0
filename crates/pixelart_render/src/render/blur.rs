//! Gaussian blur approximated by three successive box blurs.
//!
//! Works on premultiplied RGBA bytes; pixels outside the buffer count as
//! transparent.

const PASSES: usize = 3;

/// Box widths whose successive application approximates a Gaussian with the
/// given standard deviation.
fn box_sizes(sigma: f32) -> [usize; PASSES] {
    let n = PASSES as f32;
    let ideal = (12.0 * sigma * sigma / n + 1.0).sqrt();
    let mut lower = ideal.floor() as i64;
    if lower % 2 == 0 {
        lower -= 1;
    }
    let lower = lower.max(1);
    let upper = lower + 2;

    let lower_f = lower as f32;
    let m = ((12.0 * sigma * sigma - n * lower_f * lower_f - 4.0 * n * lower_f - 3.0 * n)
        / (-4.0 * lower_f - 4.0))
        .round() as i64;

    let mut sizes = [0; PASSES];
    for (pass, size) in sizes.iter_mut().enumerate() {
        *size = (if (pass as i64) < m { lower } else { upper }) as usize;
    }
    sizes
}

pub(crate) fn gaussian_blur(data: &mut [u8], width: usize, height: usize, sigma: f32) {
    if sigma.is_nan() || sigma < 0.5 || width == 0 || height == 0 {
        return;
    }
    debug_assert_eq!(data.len(), width * height * 4);

    let mut scratch = vec![0u8; data.len()];
    for size in box_sizes(sigma) {
        let radius = (size - 1) / 2;
        if radius == 0 {
            continue;
        }
        box_blur(data, &mut scratch, width, height, radius, Direction::Horizontal);
        box_blur(&scratch, data, width, height, radius, Direction::Vertical);
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Horizontal,
    Vertical,
}

fn box_blur(
    src: &[u8],
    dst: &mut [u8],
    width: usize,
    height: usize,
    radius: usize,
    direction: Direction,
) {
    let (lines, length, step, stride) = match direction {
        Direction::Horizontal => (height, width, 4, width * 4),
        Direction::Vertical => (width, height, width * 4, 4),
    };
    let diameter = (2 * radius + 1) as u32;

    for line in 0..lines {
        let base = line * stride;
        for channel in 0..4 {
            let at = |i: usize| base + i * step + channel;

            let mut sum: u32 = (0..=radius.min(length - 1)).map(|i| src[at(i)] as u32).sum();
            for i in 0..length {
                dst[at(i)] = ((sum + diameter / 2) / diameter) as u8;

                if i + radius + 1 < length {
                    sum += src[at(i + radius + 1)] as u32;
                }
                if i >= radius {
                    sum -= src[at(i - radius)] as u32;
                }
            }
        }
    }
}
