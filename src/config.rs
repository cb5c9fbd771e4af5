// src/config.rs - Engine and CLI configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::classifier::ClassifierProfile;
use crate::contours::{
    scaled_min_area, ContourSettings, SeverityProfile, MAX_CONTOURS, MIN_LESION_AREA_AT_REFERENCE,
    REFERENCE_DIMENSION,
};
use crate::errors::{Result, SegmentationError};
use crate::leaf_locator::DEFAULT_MIN_LEAF_FRACTION;

/// Configuration for the segmentation engine and its CLI.
///
/// The colour range tables are compiled in; only the choice of profile is
/// configurable here.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_input_path")]
    pub input_path: String,

    #[serde(default = "default_output_base_dir")]
    pub output_base_dir: String,

    /// Longer side of the working raster; larger inputs are downscaled
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,

    /// Restrict statistics to the dominant leaf
    #[serde(default = "default_leaf_isolation")]
    pub leaf_isolation: bool,

    #[serde(default = "default_min_leaf_fraction")]
    pub min_leaf_fraction: f64,

    /// Disc radius used to close the leaf mask
    #[serde(default = "default_leaf_close_radius")]
    pub leaf_close_radius: u32,

    /// Disc radius used to clean the disease masks
    #[serde(default = "default_lesion_kernel_radius")]
    pub lesion_kernel_radius: u32,

    /// Lesion area floor at the reference working resolution
    #[serde(default = "default_min_lesion_area_reference")]
    pub min_lesion_area_reference: u32,

    #[serde(default = "default_max_contours")]
    pub max_contours: usize,

    #[serde(default)]
    pub classifier_profile: ClassifierProfile,

    #[serde(default)]
    pub severity_profile: SeverityProfile,

    #[serde(default = "default_parallel")]
    pub use_parallel: bool,

    /// Write PNG masks and overlay next to the JSON results
    #[serde(default)]
    pub save_images: bool,

    #[serde(default = "default_accelerator_timeout_ms")]
    pub accelerator_timeout_ms: u64,
}

fn default_input_path() -> String {
    "./input".to_string()
}

fn default_output_base_dir() -> String {
    "./output".to_string()
}

fn default_max_dimension() -> u32 {
    REFERENCE_DIMENSION
}

fn default_leaf_isolation() -> bool {
    true
}

fn default_min_leaf_fraction() -> f64 {
    DEFAULT_MIN_LEAF_FRACTION
}

fn default_leaf_close_radius() -> u32 {
    15
}

fn default_lesion_kernel_radius() -> u32 {
    1
}

fn default_min_lesion_area_reference() -> u32 {
    MIN_LESION_AREA_AT_REFERENCE
}

fn default_max_contours() -> usize {
    MAX_CONTOURS
}

fn default_parallel() -> bool {
    true
}

fn default_accelerator_timeout_ms() -> u64 {
    2000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: default_input_path(),
            output_base_dir: default_output_base_dir(),
            max_dimension: default_max_dimension(),
            leaf_isolation: default_leaf_isolation(),
            min_leaf_fraction: default_min_leaf_fraction(),
            leaf_close_radius: default_leaf_close_radius(),
            lesion_kernel_radius: default_lesion_kernel_radius(),
            min_lesion_area_reference: default_min_lesion_area_reference(),
            max_contours: default_max_contours(),
            classifier_profile: ClassifierProfile::default(),
            severity_profile: SeverityProfile::default(),
            use_parallel: default_parallel(),
            save_images: false,
            accelerator_timeout_ms: default_accelerator_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SegmentationError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| {
            SegmentationError::Config(format!("Failed to parse config file '{}': {}", path.display(), e))
        })?;

        Ok(config)
    }

    /// Lesion area floor for the configured working resolution
    pub fn min_lesion_area(&self) -> u32 {
        scaled_min_area(self.min_lesion_area_reference, self.max_dimension)
    }

    /// Contour extraction settings derived from this configuration
    pub fn contour_settings(&self) -> ContourSettings {
        ContourSettings {
            min_area: self.min_lesion_area(),
            max_contours: self.max_contours,
            thresholds: self.severity_profile.thresholds(),
        }
    }

    /// Validate engine parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_dimension < 8 {
            return Err(SegmentationError::Config(
                "max_dimension must be >= 8".to_string(),
            ));
        }

        if !(self.min_leaf_fraction > 0.0 && self.min_leaf_fraction < 1.0) {
            return Err(SegmentationError::Config(
                "min_leaf_fraction must be between 0.0 and 1.0".to_string(),
            ));
        }

        if self.leaf_close_radius > self.max_dimension / 2 {
            return Err(SegmentationError::Config(
                "leaf_close_radius must be <= half of max_dimension".to_string(),
            ));
        }

        if self.lesion_kernel_radius > self.leaf_close_radius {
            return Err(SegmentationError::Config(
                "lesion_kernel_radius must be <= leaf_close_radius".to_string(),
            ));
        }

        if self.max_contours == 0 {
            return Err(SegmentationError::Config(
                "max_contours must be > 0".to_string(),
            ));
        }

        if self.accelerator_timeout_ms == 0 {
            return Err(SegmentationError::Config(
                "accelerator_timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate that the input path exists and create the output directories
    pub fn prepare_paths(&self) -> Result<()> {
        let input_path = PathBuf::from(&self.input_path);
        if !input_path.exists() {
            return Err(SegmentationError::InvalidPath(input_path));
        }

        let base_dir = PathBuf::from(&self.output_base_dir);
        for sub in ["json", "contours", "images"] {
            fs::create_dir_all(base_dir.join(sub))?;
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            SegmentationError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.min_lesion_area(), 50);
        assert_eq!(config.contour_settings().max_contours, 50);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            "max_dimension = 600\nclassifier_profile = \"dual-bucket\"\nseverity_profile = \"conservative\"\n",
        )
        .unwrap();
        assert_eq!(config.max_dimension, 600);
        assert_eq!(config.classifier_profile, ClassifierProfile::DualBucket);
        assert_eq!(config.severity_profile, SeverityProfile::Conservative);
        assert_eq!(config.min_lesion_area(), 200);
        assert!(config.leaf_isolation);
    }

    #[test]
    fn rejects_bad_leaf_fraction() {
        let config = Config { min_leaf_fraction: 1.5, ..Config::default() };
        assert!(matches!(config.validate(), Err(SegmentationError::Config(_))));
    }

    #[test]
    fn saved_file_loads_back() {
        let path = std::env::temp_dir().join(format!("leaf_disease_config_{}.toml", std::process::id()));
        let config = Config {
            classifier_profile: ClassifierProfile::DualBucket,
            leaf_isolation: false,
            ..Config::default()
        };
        config.save_to_file(&path).unwrap();
        let back = Config::from_file(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(back.classifier_profile, ClassifierProfile::DualBucket);
        assert!(!back.leaf_isolation);
        assert_eq!(back.max_dimension, config.max_dimension);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Config::from_file("/nonexistent/leaf.toml").unwrap_err();
        assert!(matches!(err, SegmentationError::Config(_)));
    }
}
