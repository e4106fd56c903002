// THEORY:
// The region extractor is the spatial grouping layer. It turns the per-pixel
// foreground mask into a short list of spatially coherent regions, each summarized
// by its bounding box and its area.
//
// Algorithm:
// 1.  **Row-major seeding**: the mask is scanned top-to-bottom, left-to-right. The
//     first unvisited foreground pixel found becomes the seed of a new component,
//     which fixes the output order: regions come out in the row-major order of
//     their first pixel. The order is stable for a given mask.
// 2.  **Region growing**: from the seed, an explicit stack walks all 8-connected
//     foreground neighbours. A `visited` grid guarantees every pixel joins exactly
//     one component.
// 3.  **Aggregation and filtering**: while growing, the bounding box and pixel
//     count are accumulated. Components smaller than `min_area` are dropped.
//
// The extractor is stateless and has no memory of previous frames.

use crate::core_modules::mask::ForegroundMask;
use serde::{Deserialize, Serialize};

/// Bounding rectangle of one connected foreground component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Number of foreground pixels in the component, not the box area.
    pub area: u32,
}

impl Region {
    pub fn center(&self) -> (f64, f64) {
        (
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }
}

/// Finds 8-connected components in `mask` and keeps those with `area >= min_area`.
pub fn extract_regions(mask: &ForegroundMask, min_area: u32) -> Vec<Region> {
    let (width, height) = (mask.width(), mask.height());
    let mut visited = vec![false; width as usize * height as usize];
    let mut regions = Vec::new();

    for y in 0..height {
        for x in 0..width {
            let index = y as usize * width as usize + x as usize;
            if visited[index] || !mask.get(x, y) {
                continue;
            }
            let region = grow_region(mask, &mut visited, x, y);
            if region.area >= min_area {
                regions.push(region);
            }
        }
    }

    regions
}

/// Depth-first flood fill from a seed pixel, returning the component summary.
fn grow_region(mask: &ForegroundMask, visited: &mut [bool], seed_x: u32, seed_y: u32) -> Region {
    let width = mask.width() as i64;
    let height = mask.height() as i64;
    let mut stack = vec![(seed_x, seed_y)];
    visited[seed_y as usize * width as usize + seed_x as usize] = true;

    let (mut min_x, mut min_y) = (seed_x, seed_y);
    let (mut max_x, mut max_y) = (seed_x, seed_y);
    let mut area = 0_u32;

    while let Some((x, y)) = stack.pop() {
        area += 1;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);

        for dy in -1..=1_i64 {
            for dx in -1..=1_i64 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if nx < 0 || nx >= width || ny < 0 || ny >= height {
                    continue;
                }
                let ni = (ny * width + nx) as usize;
                if !visited[ni] && mask.get(nx as u32, ny as u32) {
                    visited[ni] = true;
                    stack.push((nx as u32, ny as u32));
                }
            }
        }
    }

    Region {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
        area,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(mask: &mut ForegroundMask, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.set(x, y, true);
            }
        }
    }

    #[test]
    fn keeps_only_blobs_above_min_area() {
        let mut mask = ForegroundMask::empty(40, 30);
        block(&mut mask, 2, 2, 10, 10);
        block(&mut mask, 25, 20, 3, 3);

        let regions = extract_regions(&mask, 50);
        assert_eq!(
            regions,
            vec![Region { x: 2, y: 2, width: 10, height: 10, area: 100 }]
        );
    }

    #[test]
    fn diagonal_pixels_are_connected() {
        let mut mask = ForegroundMask::empty(5, 5);
        for i in 0..5 {
            mask.set(i, i, true);
        }
        let regions = extract_regions(&mask, 1);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 5);
        assert_eq!((regions[0].width, regions[0].height), (5, 5));
    }

    #[test]
    fn regions_follow_row_major_discovery() {
        let mut mask = ForegroundMask::empty(20, 20);
        block(&mut mask, 15, 1, 2, 2);
        block(&mut mask, 1, 5, 2, 2);
        block(&mut mask, 8, 1, 2, 2);

        let xs: Vec<u32> = extract_regions(&mask, 1).iter().map(|r| r.x).collect();
        assert_eq!(xs, vec![8, 15, 1]);
    }

    #[test]
    fn area_counts_pixels_not_box() {
        let mut mask = ForegroundMask::empty(10, 10);
        block(&mut mask, 0, 0, 6, 1);
        block(&mut mask, 0, 0, 1, 6);
        let regions = extract_regions(&mask, 1);
        assert_eq!(regions[0].area, 11);
        assert_eq!((regions[0].width, regions[0].height), (6, 6));
    }

    #[test]
    fn empty_mask_yields_nothing() {
        assert!(extract_regions(&ForegroundMask::empty(8, 8), 1).is_empty());
    }
}
