// src/regions.rs - Connected-component extraction by flood fill

use serde::{Deserialize, Serialize};

use crate::image_utils::{in_bounds, BinaryMask};

/// Axis-aligned envelope of a component, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One connected component of a binary mask
#[derive(Debug, Clone)]
pub struct Region {
    /// Row-major indices of member pixels, in discovery order
    pub pixel_indices: Vec<usize>,
    /// Mean member coordinate
    pub centroid: (f64, f64),
    pub bounding_box: BoundingBox,
    /// Row-major index of the first member met by a top-to-bottom,
    /// left-to-right scan
    pub first_index: usize,
}

impl Region {
    #[inline]
    pub fn area(&self) -> usize {
        self.pixel_indices.len()
    }

    /// Build a region from member indices, computing its moments and envelope
    pub fn from_indices(mut pixel_indices: Vec<usize>, width: u32) -> Self {
        let w = width as usize;
        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        let mut sum_x = 0u64;
        let mut sum_y = 0u64;
        let mut first_index = usize::MAX;

        for &idx in &pixel_indices {
            let (x, y) = (idx % w, idx / w);
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
            sum_x += x as u64;
            sum_y += y as u64;
            first_index = first_index.min(idx);
        }

        let n = pixel_indices.len().max(1) as f64;
        pixel_indices.shrink_to_fit();

        let bounding_box = if pixel_indices.is_empty() {
            BoundingBox { x: 0, y: 0, width: 0, height: 0 }
        } else {
            BoundingBox {
                x: min_x as u32,
                y: min_y as u32,
                width: (max_x - min_x + 1) as u32,
                height: (max_y - min_y + 1) as u32,
            }
        };

        Self {
            centroid: (sum_x as f64 / n, sum_y as f64 / n),
            bounding_box,
            first_index: if pixel_indices.is_empty() { 0 } else { first_index },
            pixel_indices,
        }
    }

    /// Rasterize this region back into a mask of the given size
    pub fn to_mask(&self, width: u32, height: u32) -> BinaryMask {
        let mut mask = BinaryMask::new(width, height);
        for &idx in &self.pixel_indices {
            mask.set(idx, true);
        }
        mask
    }
}

/// 4-connected neighbour offsets (dx, dy)
const FOUR_NEIGHBOURHOOD: [(i64, i64); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Label every 4-connected component of set pixels.
///
/// Components are returned in the order a row-major scan first meets them,
/// which makes "first found" tie-breaks deterministic.
pub fn flood_fill_regions(mask: &BinaryMask) -> Vec<Region> {
    let (width, height) = mask.dimensions();
    let mut visited = vec![false; mask.len()];
    let mut regions = Vec::new();
    let mut stack = Vec::new();

    for start in 0..mask.len() {
        if visited[start] || !mask.is_set(start) {
            continue;
        }

        let mut members = Vec::new();
        visited[start] = true;
        stack.push(start);

        while let Some(idx) = stack.pop() {
            members.push(idx);
            let x = (idx % width as usize) as i64;
            let y = (idx / width as usize) as i64;

            for &(dx, dy) in &FOUR_NEIGHBOURHOOD {
                let nx = x + dx;
                let ny = y + dy;
                if !in_bounds(nx, ny, width, height) {
                    continue;
                }
                let n_idx = ny as usize * width as usize + nx as usize;
                if !visited[n_idx] && mask.is_set(n_idx) {
                    visited[n_idx] = true;
                    stack.push(n_idx);
                }
            }
        }

        regions.push(Region::from_indices(members, width));
    }

    regions
}

/// 8-connected neighbour offsets (dx, dy)
const EIGHT_NEIGHBOURHOOD: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

/// Fill every enclosed hole of a mask.
///
/// Unset pixels reachable from the frame border through unset pixels are
/// outside; everything else becomes set. The background walk is 8-connected
/// so it pairs with 4-connected foreground components.
pub fn fill_holes(mask: &BinaryMask) -> BinaryMask {
    let (width, height) = mask.dimensions();
    let w = width as usize;
    let mut outside = vec![false; mask.len()];
    let mut stack = Vec::new();

    for idx in 0..mask.len() {
        let (x, y) = (idx % w, idx / w);
        let on_border = x == 0 || y == 0 || x + 1 == w || y + 1 == height as usize;
        if on_border && !mask.is_set(idx) {
            outside[idx] = true;
            stack.push(idx);
        }
    }

    while let Some(idx) = stack.pop() {
        let x = (idx % w) as i64;
        let y = (idx / w) as i64;

        for &(dx, dy) in &EIGHT_NEIGHBOURHOOD {
            let nx = x + dx;
            let ny = y + dy;
            if !in_bounds(nx, ny, width, height) {
                continue;
            }
            let n_idx = ny as usize * w + nx as usize;
            if !outside[n_idx] && !mask.is_set(n_idx) {
                outside[n_idx] = true;
                stack.push(n_idx);
            }
        }
    }

    BinaryMask::from_predicate(width, height, |idx| !outside[idx])
}

/// Group pixels of a label image (0 = background) into regions, ordered by
/// their first pixel in scan order.
pub fn regions_from_labels(labels: &[u32], width: u32) -> Vec<Region> {
    let mut slots: Vec<Option<usize>> = Vec::new();
    let mut members: Vec<Vec<usize>> = Vec::new();

    for (idx, &label) in labels.iter().enumerate() {
        if label == 0 {
            continue;
        }
        let label = label as usize;
        if label >= slots.len() {
            slots.resize(label + 1, None);
        }
        let slot = match slots[label] {
            Some(slot) => slot,
            None => {
                members.push(Vec::new());
                slots[label] = Some(members.len() - 1);
                members.len() - 1
            }
        };
        members[slot].push(idx);
    }

    members
        .into_iter()
        .map(|indices| Region::from_indices(indices, width))
        .collect()
}
