// src/classifier.rs - Per-pixel disease labelling from HSV colour ranges

use clap::ValueEnum;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::color::{rgb_to_hsv, ColorRange, Hsv};
use crate::image_utils::BinaryMask;

/// Label assigned to a single pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLabel {
    Background,
    Healthy,
    Rust,
    Scab,
}

/// Colour buckets per category. A pixel belongs to a category when any of
/// its buckets contains it.
#[derive(Debug, Clone, Copy)]
pub struct ColorRangeTable {
    pub healthy: &'static [ColorRange],
    pub rust: &'static [ColorRange],
    pub scab: &'static [ColorRange],
}

impl ColorRangeTable {
    /// Label one pixel. Checked in the fixed order scab, rust, healthy;
    /// the first match wins.
    pub fn label(&self, hsv: Hsv) -> PixelLabel {
        let hit = |buckets: &[ColorRange]| buckets.iter().any(|range| range.contains(hsv));

        if hit(self.scab) {
            PixelLabel::Scab
        } else if hit(self.rust) {
            PixelLabel::Rust
        } else if hit(self.healthy) {
            PixelLabel::Healthy
        } else {
            PixelLabel::Background
        }
    }
}

/// Canonical ranges, one box per category. Hue is 0..=180.
pub const SHARED_BOX_RANGES: ColorRangeTable = ColorRangeTable {
    // Medium to bright greens
    healthy: &[ColorRange::new([35, 40, 40], [85, 255, 255])],
    // Strongly saturated, fairly bright oranges and yellows
    rust: &[ColorRange::new([10, 100, 80], [35, 255, 255])],
    // Dark or washed-out tissue: browns, olives, blacks
    scab: &[ColorRange::new([0, 0, 0], [180, 120, 160])],
};

/// Alternative ranges with two buckets per disease
pub const DUAL_BUCKET_RANGES: ColorRangeTable = ColorRangeTable {
    // Broad greens, tolerant of lighting
    healthy: &[ColorRange::new([30, 20, 20], [90, 255, 255])],
    // Orange bucket, yellow bucket
    rust: &[
        ColorRange::new([5, 80, 80], [25, 255, 255]),
        ColorRange::new([20, 40, 80], [40, 255, 255]),
    ],
    // Very dark of any hue, brown bucket
    scab: &[
        ColorRange::new([0, 0, 0], [180, 255, 60]),
        ColorRange::new([5, 40, 20], [30, 255, 160]),
    ],
};

/// Pixels below this saturation carry no usable hue under the dual-bucket profile
pub const DUAL_BUCKET_MIN_SATURATION: u8 = 10;

/// Which rule set labels the pixels.
///
/// `SharedBox` is the canonical profile; `DualBucket` is kept as an
/// alternative with two colour buckets per disease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierProfile {
    #[default]
    SharedBox,
    DualBucket,
}

impl ClassifierProfile {
    pub fn ranges(&self) -> &'static ColorRangeTable {
        match self {
            ClassifierProfile::SharedBox => &SHARED_BOX_RANGES,
            ClassifierProfile::DualBucket => &DUAL_BUCKET_RANGES,
        }
    }

    /// Label one pixel under this profile
    pub fn classify(&self, hsv: Hsv) -> PixelLabel {
        if *self == ClassifierProfile::DualBucket && hsv.s < DUAL_BUCKET_MIN_SATURATION {
            return PixelLabel::Background;
        }
        self.ranges().label(hsv)
    }
}

/// Classify an RGB pixel
#[inline]
pub fn classify_rgb(profile: ClassifierProfile, rgb: [u8; 3]) -> PixelLabel {
    profile.classify(rgb_to_hsv(rgb[0], rgb[1], rgb[2]))
}

/// Raw per-category masks straight from the classifier. Disjoint by construction.
#[derive(Debug, Clone)]
pub struct LabelMasks {
    pub healthy: BinaryMask,
    pub rust: BinaryMask,
    pub scab: BinaryMask,
}

/// Label every pixel of `image` and split the labels into one mask per category
pub fn classify_image(image: &RgbImage, profile: ClassifierProfile) -> LabelMasks {
    let (width, height) = image.dimensions();
    let mut healthy = BinaryMask::new(width, height);
    let mut rust = BinaryMask::new(width, height);
    let mut scab = BinaryMask::new(width, height);

    for (idx, pixel) in image.pixels().enumerate() {
        match classify_rgb(profile, pixel.0) {
            PixelLabel::Healthy => healthy.set(idx, true),
            PixelLabel::Rust => rust.set(idx, true),
            PixelLabel::Scab => scab.set(idx, true),
            PixelLabel::Background => {}
        }
    }

    LabelMasks { healthy, rust, scab }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn every_bucket_is_well_formed() {
        for profile in [ClassifierProfile::SharedBox, ClassifierProfile::DualBucket] {
            let table = profile.ranges();
            for range in table.healthy.iter().chain(table.rust).chain(table.scab) {
                assert!(range.is_well_formed(), "{:?}: {:?} has lower > upper", profile, range);
            }
        }
    }

    #[test]
    fn pure_green_falls_in_healthy_band() {
        let hsv = rgb_to_hsv(0, 255, 0);
        assert!(SHARED_BOX_RANGES.healthy[0].contains(hsv));
        assert_eq!(classify_rgb(ClassifierProfile::SharedBox, [0, 255, 0]), PixelLabel::Healthy);
    }

    #[test]
    fn scab_wins_when_rust_also_matches() {
        let hsv = Hsv::new(20, 110, 120);
        assert!(SHARED_BOX_RANGES.rust[0].contains(hsv));
        assert!(SHARED_BOX_RANGES.scab[0].contains(hsv));
        assert_eq!(ClassifierProfile::SharedBox.classify(hsv), PixelLabel::Scab);

        // Same overlap reached from RGB
        assert_eq!(rgb_to_hsv(120, 104, 70), Hsv::new(20, 106, 120));
        assert_eq!(classify_rgb(ClassifierProfile::SharedBox, [120, 104, 70]), PixelLabel::Scab);
    }

    #[test]
    fn rust_wins_over_healthy_on_shared_hue() {
        // Hue 35 sits on both the rust and healthy boundaries
        let hsv = Hsv::new(35, 200, 200);
        assert!(SHARED_BOX_RANGES.healthy[0].contains(hsv));
        assert_eq!(ClassifierProfile::SharedBox.classify(hsv), PixelLabel::Rust);
    }

    #[test]
    fn orange_is_rust_and_leaf_green_is_healthy() {
        for profile in [ClassifierProfile::SharedBox, ClassifierProfile::DualBucket] {
            assert_eq!(classify_rgb(profile, [230, 140, 20]), PixelLabel::Rust);
            assert_eq!(classify_rgb(profile, [40, 160, 40]), PixelLabel::Healthy);
        }
    }

    #[test]
    fn dual_bucket_rejects_near_grey() {
        let grey = Hsv::new(60, 9, 200);
        assert_eq!(ClassifierProfile::DualBucket.classify(grey), PixelLabel::Background);
        let dark_warm = Hsv::new(15, 120, 90);
        assert_eq!(ClassifierProfile::DualBucket.classify(dark_warm), PixelLabel::Scab);
    }

    #[test]
    fn dual_bucket_yellow_and_dark_buckets() {
        let profile = ClassifierProfile::DualBucket;
        // Only the yellow rust bucket reaches hue 35, and it outranks healthy
        let yellow = Hsv::new(35, 60, 200);
        assert!(DUAL_BUCKET_RANGES.healthy[0].contains(yellow));
        assert_eq!(profile.classify(yellow), PixelLabel::Rust);
        // Dark bucket takes any hue once value drops to 60
        assert_eq!(profile.classify(Hsv::new(100, 50, 60)), PixelLabel::Scab);
        assert_eq!(profile.classify(Hsv::new(100, 50, 61)), PixelLabel::Background);
        // Brown bucket outranks the orange rust bucket
        assert_eq!(profile.classify(Hsv::new(15, 200, 150)), PixelLabel::Scab);
        assert_eq!(profile.classify(Hsv::new(15, 200, 161)), PixelLabel::Rust);
    }

    #[test]
    fn profiles_parse_from_cli_names() {
        assert_eq!(ClassifierProfile::from_str("dual-bucket", false), Ok(ClassifierProfile::DualBucket));
        assert_eq!(ClassifierProfile::from_str("shared-box", false), Ok(ClassifierProfile::SharedBox));
        assert!(ClassifierProfile::from_str("hsv", false).is_err());
    }

    #[test]
    fn classify_image_produces_disjoint_masks() {
        let image = RgbImage::from_fn(3, 1, |x, _| match x {
            0 => Rgb([40, 160, 40]),
            1 => Rgb([230, 140, 20]),
            _ => Rgb([20, 20, 20]),
        });
        let masks = classify_image(&image, ClassifierProfile::SharedBox);
        assert_eq!(masks.healthy.as_raw(), &[255, 0, 0]);
        assert_eq!(masks.rust.as_raw(), &[0, 255, 0]);
        assert_eq!(masks.scab.as_raw(), &[0, 0, 255]);
    }
}
