use super::Cluster;
use crate::grid::{PixelGrid, Rgb};
use crate::PixelArtError;

/// Builds a `width × height` grid where every clustered pixel takes its
/// cluster's center color. Cells that were never sampled stay empty.
pub fn build_grid(
    clusters: &[Cluster],
    width: u32,
    height: u32,
) -> Result<PixelGrid, PixelArtError> {
    let mut grid = PixelGrid::blank(width, height)?;
    let cell_count = width as usize * height as usize;

    for cluster in clusters {
        for member in &cluster.members {
            if member.index >= cell_count {
                return Err(PixelArtError::CellCountMismatch {
                    expected: cell_count,
                    found: member.index + 1,
                });
            }
            let x = (member.index % width as usize) as u32;
            let y = (member.index / width as usize) as u32;
            grid.set(x, y, Some(cluster.center));
        }
    }

    Ok(grid)
}

/// Distinct cluster centers, most populated first. Equal populations keep
/// cluster order.
pub fn palette(clusters: &[Cluster]) -> Vec<Rgb> {
    let mut counts: Vec<(Rgb, usize)> = Vec::with_capacity(clusters.len());
    for cluster in clusters {
        match counts.iter_mut().find(|(color, _)| *color == cluster.center) {
            Some((_, count)) => *count += cluster.members.len(),
            None => counts.push((cluster.center, cluster.members.len())),
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().map(|(color, _)| color).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quantize::SampledPixel;

    fn member(index: usize) -> SampledPixel {
        SampledPixel { r: 0, g: 0, b: 0, index }
    }

    #[test]
    fn maps_members_to_center_and_leaves_gaps_empty() {
        let red = Rgb::new(255, 0, 0);
        let blue = Rgb::new(0, 0, 255);
        let clusters = vec![
            Cluster { center: red, members: vec![member(0), member(3)] },
            Cluster { center: blue, members: vec![member(1)] },
        ];

        let grid = build_grid(&clusters, 2, 2).unwrap();

        assert_eq!(grid.get(0, 0), Some(red));
        assert_eq!(grid.get(1, 0), Some(blue));
        assert_eq!(grid.get(0, 1), None);
        assert_eq!(grid.get(1, 1), Some(red));
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let clusters = vec![Cluster { center: Rgb::BLACK, members: vec![member(4)] }];
        assert!(build_grid(&clusters, 2, 2).is_err());
    }

    #[test]
    fn palette_merges_duplicates_and_orders_by_population() {
        let grey = Rgb::new(40, 40, 40);
        let white = Rgb::WHITE;
        let clusters = vec![
            Cluster { center: white, members: vec![member(0), member(1)] },
            Cluster { center: grey, members: vec![member(2), member(3)] },
            Cluster { center: grey, members: vec![member(4)] },
        ];

        assert_eq!(palette(&clusters), vec![grey, white]);
    }
}
