// src/backend.rs - Imaging capability seam: pure implementation plus optional accelerator

use crate::errors::Result;
use crate::image_utils::BinaryMask;
use crate::morphology::{apply_closing, apply_opening, check_radius};
use crate::regions::{flood_fill_regions, Region};

/// The imaging operations the segmentation pipeline needs.
///
/// Implementations must be pure with respect to their inputs and release
/// every working buffer before returning, on success and on error.
pub trait ImagingBackend: Send + Sync {
    /// Short identifier used in logs and health reports
    fn name(&self) -> &'static str;

    /// Morphological closing with a disc of the given radius
    fn close(&self, mask: &BinaryMask, radius: u32) -> Result<BinaryMask>;

    /// Morphological opening with a disc of the given radius
    fn open(&self, mask: &BinaryMask, radius: u32) -> Result<BinaryMask>;

    /// 4-connected components with their moments, in scan order of first pixel
    fn components(&self, mask: &BinaryMask) -> Result<Vec<Region>>;
}

/// Flood-fill and span-sweep implementation. Always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct PureBackend;

impl ImagingBackend for PureBackend {
    fn name(&self) -> &'static str {
        "pure"
    }

    fn close(&self, mask: &BinaryMask, radius: u32) -> Result<BinaryMask> {
        check_radius(mask, radius)?;
        Ok(apply_closing(mask, radius))
    }

    fn open(&self, mask: &BinaryMask, radius: u32) -> Result<BinaryMask> {
        check_radius(mask, radius)?;
        Ok(apply_opening(mask, radius))
    }

    fn components(&self, mask: &BinaryMask) -> Result<Vec<Region>> {
        Ok(flood_fill_regions(mask))
    }
}

#[cfg(feature = "accelerator")]
pub use accelerated::ImageprocBackend;

#[cfg(feature = "accelerator")]
mod accelerated {
    use imageproc::distance_transform::Norm;
    use imageproc::region_labelling::{connected_components, Connectivity};
    use image::Luma;

    use super::ImagingBackend;
    use crate::errors::{Result, SegmentationError};
    use crate::image_utils::{BinaryMask, BINARIZE_THRESHOLD};
    use crate::regions::{regions_from_labels, Region};

    /// `imageproc`-backed morphology and labelling.
    ///
    /// Morphology uses the L1 norm, so the structuring element is a diamond
    /// rather than a disc; areas can differ slightly from the pure path.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct ImageprocBackend;

    fn kernel_size(radius: u32) -> Result<u8> {
        u8::try_from(radius).map_err(|_| {
            SegmentationError::AcceleratorUnavailable(format!(
                "radius {} exceeds accelerator limit of {}",
                radius,
                u8::MAX
            ))
        })
    }

    impl ImagingBackend for ImageprocBackend {
        fn name(&self) -> &'static str {
            "imageproc"
        }

        fn close(&self, mask: &BinaryMask, radius: u32) -> Result<BinaryMask> {
            let k = kernel_size(radius)?;
            let gray = mask.to_gray();
            let closed = imageproc::morphology::close(&gray, Norm::L1, k);
            Ok(BinaryMask::from_gray(&closed, BINARIZE_THRESHOLD))
        }

        fn open(&self, mask: &BinaryMask, radius: u32) -> Result<BinaryMask> {
            let k = kernel_size(radius)?;
            let gray = mask.to_gray();
            let opened = imageproc::morphology::open(&gray, Norm::L1, k);
            Ok(BinaryMask::from_gray(&opened, BINARIZE_THRESHOLD))
        }

        fn components(&self, mask: &BinaryMask) -> Result<Vec<Region>> {
            let gray = mask.to_gray();
            let labels = connected_components(&gray, Connectivity::Four, Luma([0u8]));
            Ok(regions_from_labels(labels.as_raw(), mask.width()))
        }
    }
}
