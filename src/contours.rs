// src/contours.rs - Per-lesion contour metadata and severity tiers

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::backend::ImagingBackend;
use crate::errors::Result;
use crate::image_utils::BinaryMask;
use crate::regions::{BoundingBox, Region};

/// Maximum number of contours reported per disease mask
pub const MAX_CONTOURS: usize = 50;

/// Lesion area floor at the reference working resolution
pub const MIN_LESION_AREA_AT_REFERENCE: u32 = 50;

/// Working resolution (longer side, px) the area floor is calibrated for
pub const REFERENCE_DIMENSION: u32 = 300;

/// Severity tier of a single lesion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Percent-of-leaf cut points for the severity tiers.
///
/// `share < low_below` is low, `share <= high_above` is medium, anything
/// larger is high.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeverityThresholds {
    pub low_below: f64,
    pub high_above: f64,
}

pub const STANDARD_THRESHOLDS: SeverityThresholds = SeverityThresholds {
    low_below: 1.0,
    high_above: 5.0,
};

pub const CONSERVATIVE_THRESHOLDS: SeverityThresholds = SeverityThresholds {
    low_below: 2.0,
    high_above: 5.0,
};

impl SeverityThresholds {
    pub fn classify(&self, area: u64, total_leaf_pixels: u64) -> Severity {
        let share = if total_leaf_pixels == 0 {
            0.0
        } else {
            area as f64 / total_leaf_pixels as f64 * 100.0
        };

        if share < self.low_below {
            Severity::Low
        } else if share <= self.high_above {
            Severity::Medium
        } else {
            Severity::High
        }
    }
}

/// Named severity policy. `Standard` (1 % / 5 %) is canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum SeverityProfile {
    #[default]
    Standard,
    Conservative,
}

impl SeverityProfile {
    pub fn thresholds(&self) -> SeverityThresholds {
        match self {
            SeverityProfile::Standard => STANDARD_THRESHOLDS,
            SeverityProfile::Conservative => CONSERVATIVE_THRESHOLDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Centroid {
    pub x: f64,
    pub y: f64,
}

/// One qualifying lesion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contour {
    pub area: u64,
    pub centroid: Centroid,
    pub bounding_box: BoundingBox,
    pub severity: Severity,
}

impl Contour {
    fn from_region(region: &Region, total_leaf_pixels: u64, thresholds: &SeverityThresholds) -> Self {
        let area = region.area() as u64;
        Self {
            area,
            centroid: Centroid {
                x: region.centroid.0.round(),
                y: region.centroid.1.round(),
            },
            bounding_box: region.bounding_box,
            severity: thresholds.classify(area, total_leaf_pixels),
        }
    }
}

/// Area floor re-derived for the working resolution: the reference floor
/// scaled by the square of the resolution ratio, never below one pixel.
pub fn scaled_min_area(reference_area: u32, working_dimension: u32) -> u32 {
    let ratio = working_dimension as f64 / REFERENCE_DIMENSION as f64;
    ((reference_area as f64 * ratio * ratio).round() as u32).max(1)
}

/// Settings for contour extraction
#[derive(Debug, Clone, Copy)]
pub struct ContourSettings {
    pub min_area: u32,
    pub max_contours: usize,
    pub thresholds: SeverityThresholds,
}

impl Default for ContourSettings {
    fn default() -> Self {
        Self {
            min_area: MIN_LESION_AREA_AT_REFERENCE,
            max_contours: MAX_CONTOURS,
            thresholds: STANDARD_THRESHOLDS,
        }
    }
}

/// Turn already-extracted regions into contours: drop those under the area
/// floor, order by descending area (scan order on ties) and cap the count.
pub fn contours_from_regions(
    regions: &[Region],
    total_leaf_pixels: u64,
    settings: &ContourSettings,
) -> Vec<Contour> {
    let mut qualifying: Vec<&Region> = regions
        .iter()
        .filter(|r| r.area() >= settings.min_area as usize)
        .collect();

    qualifying.sort_by(|a, b| {
        b.area()
            .cmp(&a.area())
            .then_with(|| a.first_index.cmp(&b.first_index))
    });
    qualifying.truncate(settings.max_contours);

    qualifying
        .into_iter()
        .map(|r| Contour::from_region(r, total_leaf_pixels, &settings.thresholds))
        .collect()
}

/// Extract the contours of a disease mask
pub fn find_contours(
    mask: &BinaryMask,
    total_leaf_pixels: u64,
    backend: &dyn ImagingBackend,
    settings: &ContourSettings,
) -> Result<Vec<Contour>> {
    let regions = backend.components(mask)?;
    Ok(contours_from_regions(&regions, total_leaf_pixels, settings))
}
