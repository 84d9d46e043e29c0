//! K-means color quantization in RGB space.
//!
//! Seeding is deterministic (evenly spaced samples), so identical input and
//! `k` always produce identical clusters.

pub mod palette;

use log::debug;

use crate::grid::Rgb;

pub const MIN_CLUSTERS: usize = 2;
pub const MAX_CLUSTERS: usize = 256;

/// Upper bound on assign/update rounds before giving up on convergence.
pub const MAX_ITERATIONS: usize = 20;

/// One opaque source pixel, tagged with its row-major index in the target grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SampledPixel {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub index: usize,
}

impl SampledPixel {
    pub fn color(&self) -> Rgb {
        Rgb::new(self.r, self.g, self.b)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cluster {
    pub center: Rgb,
    pub members: Vec<SampledPixel>,
}

/// Clusters `pixels` into at most `k` groups.
///
/// `k` must lie in `[MIN_CLUSTERS, MAX_CLUSTERS]`; callers validate this at
/// their boundary. Clusters that end up without members are not returned, and
/// inputs with fewer distinct colors than `k` may yield clusters sharing a
/// center.
pub fn quantize(pixels: &[SampledPixel], k: usize) -> Vec<Cluster> {
    debug_assert!((MIN_CLUSTERS..=MAX_CLUSTERS).contains(&k), "cluster count {k} out of range");

    if pixels.is_empty() {
        return Vec::new();
    }

    let n = pixels.len();
    let mut centroids: Vec<[u8; 3]> =
        (0..k).map(|i| channels(&pixels[i * n / k])).collect();
    let mut assignments = vec![usize::MAX; n];
    let mut iterations = 0;

    loop {
        let changed = assign(pixels, &centroids, &mut assignments);
        iterations += 1;
        if !changed || iterations >= MAX_ITERATIONS {
            break;
        }

        let counts = update_centroids(pixels, &assignments, &mut centroids);
        reseed_empty(pixels, &assignments, &counts, &mut centroids);
    }

    debug!("k-means over {n} pixels with k={k} stopped after {iterations} iterations");

    collect_clusters(pixels, &assignments, k)
}

fn channels(pixel: &SampledPixel) -> [u8; 3] {
    [pixel.r, pixel.g, pixel.b]
}

fn distance_squared(pixel: &SampledPixel, centroid: &[u8; 3]) -> u32 {
    let dr = pixel.r as i32 - centroid[0] as i32;
    let dg = pixel.g as i32 - centroid[1] as i32;
    let db = pixel.b as i32 - centroid[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

/// Index of the nearest centroid; ties go to the lowest index.
fn nearest(pixel: &SampledPixel, centroids: &[[u8; 3]]) -> usize {
    let mut best = 0;
    let mut best_distance = u32::MAX;
    for (index, centroid) in centroids.iter().enumerate() {
        let distance = distance_squared(pixel, centroid);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }
    best
}

/// Reassigns every pixel, returning whether any assignment changed.
fn assign(pixels: &[SampledPixel], centroids: &[[u8; 3]], assignments: &mut [usize]) -> bool {
    let mut changed = false;
    for (pixel, slot) in pixels.iter().zip(assignments.iter_mut()) {
        let cluster = nearest(pixel, centroids);
        if *slot != cluster {
            *slot = cluster;
            changed = true;
        }
    }
    changed
}

/// Integer mean with halves rounded up.
fn rounded_mean(sum: u64, count: u64) -> u8 {
    ((sum + count / 2) / count) as u8
}

/// Moves each centroid to the rounded mean of its members and returns the
/// member count per cluster. Empty clusters keep their old centroid.
fn update_centroids(
    pixels: &[SampledPixel],
    assignments: &[usize],
    centroids: &mut [[u8; 3]],
) -> Vec<u64> {
    let mut sums = vec![[0u64; 3]; centroids.len()];
    let mut counts = vec![0u64; centroids.len()];

    for (pixel, &cluster) in pixels.iter().zip(assignments) {
        sums[cluster][0] += pixel.r as u64;
        sums[cluster][1] += pixel.g as u64;
        sums[cluster][2] += pixel.b as u64;
        counts[cluster] += 1;
    }

    for ((centroid, sum), &count) in centroids.iter_mut().zip(&sums).zip(&counts) {
        if count > 0 {
            *centroid = [
                rounded_mean(sum[0], count),
                rounded_mean(sum[1], count),
                rounded_mean(sum[2], count),
            ];
        }
    }

    counts
}

/// Moves every empty centroid onto the pixel lying farthest from its own
/// centroid. Each donor pixel is used at most once per round; ties go to the
/// lowest pixel position.
fn reseed_empty(
    pixels: &[SampledPixel],
    assignments: &[usize],
    counts: &[u64],
    centroids: &mut [[u8; 3]],
) {
    let empty: Vec<usize> = (0..counts.len()).filter(|&cluster| counts[cluster] == 0).collect();
    if empty.is_empty() {
        return;
    }

    let mut distances: Vec<i64> = pixels
        .iter()
        .zip(assignments)
        .map(|(pixel, &cluster)| distance_squared(pixel, &centroids[cluster]) as i64)
        .collect();

    for cluster in empty {
        let mut donor = 0;
        for (position, &distance) in distances.iter().enumerate() {
            if distance > distances[donor] {
                donor = position;
            }
        }

        centroids[cluster] = channels(&pixels[donor]);
        distances[donor] = -1;
    }
}

fn collect_clusters(pixels: &[SampledPixel], assignments: &[usize], k: usize) -> Vec<Cluster> {
    let mut members: Vec<Vec<SampledPixel>> = vec![Vec::new(); k];
    for (pixel, &cluster) in pixels.iter().zip(assignments) {
        members[cluster].push(*pixel);
    }

    members
        .into_iter()
        .filter(|members| !members.is_empty())
        .map(|members| {
            let count = members.len() as u64;
            let mut sum = [0u64; 3];
            for pixel in &members {
                sum[0] += pixel.r as u64;
                sum[1] += pixel.g as u64;
                sum[2] += pixel.b as u64;
            }
            let center = Rgb::new(
                rounded_mean(sum[0], count),
                rounded_mean(sum[1], count),
                rounded_mean(sum[2], count),
            );
            Cluster { center, members }
        })
        .collect()
}
