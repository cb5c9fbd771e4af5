// src/lib.rs - Library interface for leaf disease segmentation

pub mod accelerator;
pub mod backend;
pub mod classifier;
pub mod color;
pub mod compositor;
pub mod config;
pub mod contours;
pub mod diagnosis;
pub mod errors;
pub mod image_io;
pub mod image_utils;
pub mod leaf_locator;
pub mod morphology;
pub mod output;
pub mod pipeline;
pub mod regions;
pub mod transport;

// Re-export commonly used types and functions
pub use errors::{SegmentationError, Result};
pub use config::Config;
pub use pipeline::{process_image, Segmentation, SegmentationEngine, SegmentationResult};
pub use image_io::{InputImage, load_image, save_image};

// Re-export the imaging seam
pub use backend::{ImagingBackend, PureBackend};
#[cfg(feature = "accelerator")]
pub use backend::ImageprocBackend;
pub use accelerator::AcceleratorInit;

// Re-export per-stage entry points
pub use color::{rgb_to_hsv, ColorRange, Hsv};
pub use classifier::{classify_image, ClassifierProfile, PixelLabel};
pub use leaf_locator::locate_main_leaf;
pub use contours::{find_contours, Contour, Severity, SeverityProfile};
pub use compositor::{composite, DiseaseMasks, Percentages, PixelCounts};
pub use diagnosis::{diagnose, recommend, Diagnosis, DiseaseKind, OverallSeverity, Recommendation};
pub use transport::{handle_segment_request, health_report, HealthReport, SegmentRequest};
