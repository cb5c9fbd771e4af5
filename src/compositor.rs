// src/compositor.rs - Overlay rendering and aggregate percentages

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

use crate::image_utils::BinaryMask;

/// Marker colour blended into rust pixels
pub const RUST_MARKER_RGB: [u8; 3] = [255, 165, 0];

/// Marker colour blended into scab pixels
pub const SCAB_MARKER_RGB: [u8; 3] = [139, 69, 19];

/// Weight of the marker colour in the blend
pub const MARKER_BLEND: f64 = 0.5;

/// Brightness factor for pixels outside the leaf
pub const OUTSIDE_LEAF_DARKEN: f64 = 0.3;

/// Final, disjoint category masks
#[derive(Debug, Clone)]
pub struct DiseaseMasks {
    pub healthy: BinaryMask,
    pub rust: BinaryMask,
    pub scab: BinaryMask,
}

/// Integer pixel tallies. `healthy + rust + scab + background == total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelCounts {
    pub total: u64,
    pub leaf: u64,
    pub healthy: u64,
    pub rust: u64,
    pub scab: u64,
    pub background: u64,
}

impl PixelCounts {
    pub fn is_conserved(&self) -> bool {
        self.healthy + self.rust + self.scab + self.background == self.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentages {
    pub healthy: f64,
    pub rust: f64,
    pub scab: f64,
    pub background: f64,
}

impl Percentages {
    /// Percentages reported when no image could be processed
    pub fn empty() -> Self {
        Self {
            healthy: 0.0,
            rust: 0.0,
            scab: 0.0,
            background: 100.0,
        }
    }

    /// Healthy, rust and scab as shares of the leaf; background as a share of
    /// the whole frame.
    pub fn from_counts(counts: &PixelCounts) -> Self {
        if counts.total == 0 {
            return Self::empty();
        }
        let leaf_share = |n: u64| {
            if counts.leaf == 0 {
                0.0
            } else {
                (n as f64 / counts.leaf as f64 * 100.0).clamp(0.0, 100.0)
            }
        };

        Self {
            healthy: leaf_share(counts.healthy),
            rust: leaf_share(counts.rust),
            scab: leaf_share(counts.scab),
            background: (counts.background as f64 / counts.total as f64 * 100.0).clamp(0.0, 100.0),
        }
    }

    /// Every category as a share of the whole frame. Used when no leaf mask
    /// is available; the four values then sum to 100.
    pub fn from_frame_counts(counts: &PixelCounts) -> Self {
        if counts.total == 0 {
            return Self::empty();
        }
        let share = |n: u64| (n as f64 / counts.total as f64 * 100.0).clamp(0.0, 100.0);
        Self {
            healthy: share(counts.healthy),
            rust: share(counts.rust),
            scab: share(counts.scab),
            background: share(counts.background),
        }
    }

    /// Sum of the four values
    pub fn sum(&self) -> f64 {
        self.healthy + self.rust + self.scab + self.background
    }

    /// Combined disease share (rust + scab)
    pub fn disease(&self) -> f64 {
        self.rust + self.scab
    }
}

/// Overlay plus the tallies behind the percentages
#[derive(Debug, Clone)]
pub struct Composite {
    pub overlay: RgbImage,
    pub counts: PixelCounts,
    pub percentages: Percentages,
}

#[inline]
fn blend(channel: u8, marker: u8) -> u8 {
    (channel as f64 * (1.0 - MARKER_BLEND) + marker as f64 * MARKER_BLEND)
        .round()
        .min(255.0) as u8
}

#[inline]
fn darken(channel: u8) -> u8 {
    (channel as f64 * OUTSIDE_LEAF_DARKEN).round() as u8
}

/// Tally the category masks against the leaf mask.
///
/// The category masks must already be disjoint and clipped to the leaf.
pub fn count_pixels(masks: &DiseaseMasks, leaf_mask: &BinaryMask) -> PixelCounts {
    let total = leaf_mask.len() as u64;
    let leaf = leaf_mask.count();
    PixelCounts {
        total,
        leaf,
        healthy: masks.healthy.count(),
        rust: masks.rust.count(),
        scab: masks.scab.count(),
        background: total - leaf,
    }
}

/// Render the overlay and compute percentages.
///
/// Outside the leaf pixels are darkened; inside, rust and scab pixels are
/// blended toward their marker colours and everything else passes through.
pub fn composite(pixels: &RgbImage, masks: &DiseaseMasks, leaf_mask: &BinaryMask) -> Composite {
    let (width, height) = pixels.dimensions();
    let mut overlay = RgbImage::new(width, height);

    for (idx, (src, dst)) in pixels.pixels().zip(overlay.pixels_mut()).enumerate() {
        let [r, g, b] = src.0;
        *dst = if !leaf_mask.is_set(idx) {
            Rgb([darken(r), darken(g), darken(b)])
        } else if masks.rust.is_set(idx) {
            Rgb([
                blend(r, RUST_MARKER_RGB[0]),
                blend(g, RUST_MARKER_RGB[1]),
                blend(b, RUST_MARKER_RGB[2]),
            ])
        } else if masks.scab.is_set(idx) {
            Rgb([
                blend(r, SCAB_MARKER_RGB[0]),
                blend(g, SCAB_MARKER_RGB[1]),
                blend(b, SCAB_MARKER_RGB[2]),
            ])
        } else {
            *src
        };
    }

    let counts = count_pixels(masks, leaf_mask);
    Composite {
        overlay,
        counts,
        percentages: Percentages::from_counts(&counts),
    }
}

/// Render and tally without a leaf mask: nothing is darkened and every
/// pixel outside the three categories is background.
pub fn composite_frame(pixels: &RgbImage, masks: &DiseaseMasks) -> Composite {
    let (width, height) = pixels.dimensions();
    let frame = BinaryMask::filled(width, height);
    let mut out = composite(pixels, masks, &frame);

    let labelled = out.counts.healthy + out.counts.rust + out.counts.scab;
    out.counts.leaf = labelled;
    out.counts.background = out.counts.total - labelled;
    out.percentages = Percentages::from_frame_counts(&out.counts);
    out
}
