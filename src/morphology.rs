// src/morphology.rs - Binary morphology with a disc structuring element

use crate::errors::{Result, SegmentationError};
use crate::image_utils::{disc_half_widths, BinaryMask};

/// Per-row prefix counts of set pixels. Row `y` occupies
/// `[y * (width + 1), (y + 1) * (width + 1))` and starts with a zero.
fn row_prefix_counts(mask: &BinaryMask) -> Vec<u32> {
    let (width, height) = mask.dimensions();
    let stride = width as usize + 1;
    let mut prefix = vec![0u32; stride * height as usize];

    for y in 0..height as usize {
        let row = &mut prefix[y * stride..(y + 1) * stride];
        for x in 0..width as usize {
            let on = mask.is_set(y * width as usize + x) as u32;
            row[x + 1] = row[x] + on;
        }
    }

    prefix
}

/// Shared sweep for erosion and dilation.
///
/// For every pixel the disc is visited row by row; `keep` receives the
/// number of set pixels and the number of in-frame pixels in each row span
/// and decides the outcome. Samples outside the frame are skipped, so the
/// border neither erodes nor dilates.
fn sweep<F>(mask: &BinaryMask, radius: u32, dilate: bool, mut keep: F) -> BinaryMask
where
    F: FnMut(u32, u32) -> bool,
{
    let (width, height) = mask.dimensions();
    if radius == 0 || mask.is_empty() {
        return mask.clone();
    }

    let half_widths = disc_half_widths(radius);
    let prefix = row_prefix_counts(mask);
    let stride = width as usize + 1;
    let r = radius as i64;

    BinaryMask::from_predicate(width, height, |idx| {
        let x = (idx % width as usize) as i64;
        let y = (idx / width as usize) as i64;

        for (i, &half) in half_widths.iter().enumerate() {
            let yy = y + i as i64 - r;
            if yy < 0 || yy >= height as i64 {
                continue;
            }
            let x0 = (x - half as i64).max(0) as usize;
            let x1 = (x + half as i64).min(width as i64 - 1) as usize;
            let row = &prefix[yy as usize * stride..(yy as usize + 1) * stride];
            let set = row[x1 + 1] - row[x0];
            let span = (x1 - x0 + 1) as u32;

            let decided = keep(set, span);
            if dilate && decided {
                return true;
            }
            if !dilate && !decided {
                return false;
            }
        }

        !dilate
    })
}

/// Morphological dilation: a pixel is set if any disc neighbour is set.
pub fn dilate(mask: &BinaryMask, radius: u32) -> BinaryMask {
    sweep(mask, radius, true, |set, _| set > 0)
}

/// Morphological erosion: a pixel stays set only if every in-frame disc
/// neighbour is set.
pub fn erode(mask: &BinaryMask, radius: u32) -> BinaryMask {
    sweep(mask, radius, false, |set, span| set == span)
}

/// Apply morphological opening (erosion followed by dilation)
pub fn apply_opening(mask: &BinaryMask, radius: u32) -> BinaryMask {
    dilate(&erode(mask, radius), radius)
}

/// Apply morphological closing (dilation followed by erosion)
pub fn apply_closing(mask: &BinaryMask, radius: u32) -> BinaryMask {
    erode(&dilate(mask, radius), radius)
}

/// Reject kernel radii that would take longer than the frame itself.
pub fn check_radius(mask: &BinaryMask, radius: u32) -> Result<()> {
    let longest = mask.width().max(mask.height());
    if radius > longest.max(1) {
        return Err(SegmentationError::Other(format!(
            "kernel radius {} exceeds mask extent {}",
            radius, longest
        )));
    }
    Ok(())
}
