// src/leaf_locator.rs - Isolate the dominant leaf from background clutter

use image::RgbImage;

use crate::backend::ImagingBackend;
use crate::color::{rgb_to_hsv, ColorRange};
use crate::errors::Result;
use crate::image_utils::BinaryMask;

/// Green hue family with a minimum saturation and value
pub const VEGETATION_GREEN: ColorRange = ColorRange::new([25, 30, 30], [95, 255, 255]);

/// Brown and orange hue family with the same floors
pub const VEGETATION_BROWN: ColorRange = ColorRange::new([0, 30, 30], [30, 255, 255]);

/// Default share of the frame the largest blob must exceed to be trusted as the leaf
pub const DEFAULT_MIN_LEAF_FRACTION: f64 = 0.05;

/// Outcome of leaf location
#[derive(Debug, Clone)]
pub struct LeafLocation {
    pub mask: BinaryMask,
    /// Pixel count of the largest coarse component
    pub largest_component: usize,
    /// True when no component was large enough and the coarse mask was kept
    pub fell_back: bool,
}

/// Broad foreground mask: any pixel in the green or brown/orange families.
pub fn vegetation_mask(pixels: &RgbImage) -> BinaryMask {
    let (width, height) = pixels.dimensions();
    let raw = pixels.as_raw();
    BinaryMask::from_predicate(width, height, |idx| {
        let hsv = rgb_to_hsv(raw[idx * 3], raw[idx * 3 + 1], raw[idx * 3 + 2]);
        VEGETATION_GREEN.contains(hsv) || VEGETATION_BROWN.contains(hsv)
    })
}

/// Find the single largest connected vegetation region.
///
/// If that region covers more than `min_fraction` of the frame only it is
/// kept; otherwise the coarse vegetation mask is returned unfiltered. Ties in
/// size go to the component found first in row-major scan order.
pub fn locate_main_leaf(
    pixels: &RgbImage,
    backend: &dyn ImagingBackend,
    min_fraction: f64,
) -> Result<LeafLocation> {
    let (width, height) = pixels.dimensions();
    let coarse = vegetation_mask(pixels);
    let regions = backend.components(&coarse)?;

    // Strict comparison keeps the earliest region on ties
    let mut best: Option<&crate::regions::Region> = None;
    for region in &regions {
        match best {
            Some(current) if region.area() <= current.area() => {}
            _ => best = Some(region),
        }
    }

    let total = (width as usize) * (height as usize);
    let largest_component = best.map(|r| r.area()).unwrap_or(0);

    match best {
        Some(region) if (largest_component as f64) > total as f64 * min_fraction => {
            log::debug!(
                "Leaf located: {} px of {} ({:.1}%) across {} candidate regions",
                largest_component,
                total,
                largest_component as f64 / total.max(1) as f64 * 100.0,
                regions.len()
            );
            Ok(LeafLocation {
                mask: region.to_mask(width, height),
                largest_component,
                fell_back: false,
            })
        }
        _ => {
            log::debug!(
                "No region above {:.1}% of the frame (largest {} px); keeping coarse mask",
                min_fraction * 100.0,
                largest_component
            );
            Ok(LeafLocation {
                mask: coarse,
                largest_component,
                fell_back: true,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PureBackend;
    use image::Rgb;

    const GREEN: Rgb<u8> = Rgb([40, 160, 40]);
    const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

    #[test]
    fn keeps_only_the_largest_blob() {
        // Large leaf on the left, a small grass blade on the right
        let image = RgbImage::from_fn(40, 20, |x, y| {
            if x < 20 || (x >= 35 && y < 3) { GREEN } else { BLACK }
        });
        let location = locate_main_leaf(&image, &PureBackend, DEFAULT_MIN_LEAF_FRACTION).unwrap();
        assert!(!location.fell_back);
        assert_eq!(location.largest_component, 400);
        assert_eq!(location.mask.count(), 400);
        assert!(!location.mask.is_set_at(36, 0));
    }

    #[test]
    fn falls_back_to_coarse_mask_without_dominant_region() {
        // Checkerboard: every green pixel is its own 4-connected component
        let image = RgbImage::from_fn(30, 30, |x, y| if (x + y) % 2 == 0 { GREEN } else { BLACK });
        let location = locate_main_leaf(&image, &PureBackend, DEFAULT_MIN_LEAF_FRACTION).unwrap();
        assert!(location.fell_back);
        assert_eq!(location.mask, vegetation_mask(&image));
        assert_eq!(location.mask.count(), 450);
    }

    #[test]
    fn equal_blobs_resolve_to_first_in_scan_order() {
        let image = RgbImage::from_fn(21, 10, |x, _| if x < 10 || x > 10 { GREEN } else { BLACK });
        let location = locate_main_leaf(&image, &PureBackend, DEFAULT_MIN_LEAF_FRACTION).unwrap();
        assert!(location.mask.is_set_at(0, 0));
        assert!(!location.mask.is_set_at(20, 0));
    }

    #[test]
    fn orange_lesions_count_as_leaf() {
        let image = RgbImage::from_fn(10, 10, |x, _| {
            if x < 6 { Rgb([230, 140, 20]) } else { GREEN }
        });
        let location = locate_main_leaf(&image, &PureBackend, DEFAULT_MIN_LEAF_FRACTION).unwrap();
        assert_eq!(location.mask.count(), 100);
    }
}
