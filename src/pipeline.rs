// src/pipeline.rs - Segmentation engine: classification, leaf isolation, refinement and reporting

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::backend::{ImagingBackend, PureBackend};
use crate::classifier::classify_image;
use crate::compositor::{composite, composite_frame, Composite, DiseaseMasks, PixelCounts, Percentages};
use crate::config::Config;
use crate::contours::{find_contours, Contour};
use crate::diagnosis::diagnose;
use crate::errors::{Result, SegmentationError};
use crate::image_io::{
    decode_image, mask_to_data_uri, parse_data_uri, rgb_to_data_uri, save_image, save_mask,
    InputImage,
};
use crate::image_utils::{fit_within, BinaryMask};
use crate::leaf_locator::locate_main_leaf;
use crate::output::{write_contours_csv, write_result_json, SummaryRow};
use crate::regions::fill_holes;

/// Everything one analysis produces, before serialisation
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub leaf: BinaryMask,
    pub masks: DiseaseMasks,
    pub overlay: RgbImage,
    pub counts: PixelCounts,
    pub percentages: Percentages,
    pub rust_contours: Vec<Contour>,
    pub scab_contours: Vec<Contour>,
    /// True when no dominant leaf was found and the coarse vegetation mask was used
    pub leaf_fell_back: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaskImages {
    pub rust: Option<String>,
    pub scab: Option<String>,
    pub healthy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContourSets {
    pub rust: Vec<Contour>,
    pub scab: Vec<Contour>,
}

/// Wire-level outcome of one segmentation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentationResult {
    pub success: bool,
    pub masks: MaskImages,
    pub overlay_image: Option<String>,
    pub percentages: Percentages,
    pub contours: ContourSets,
    /// Wall-clock milliseconds
    pub processing_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SegmentationResult {
    /// Failure shape: no images, 100 % background, no contours
    pub fn failure(message: impl Into<String>, processing_time: u64) -> Self {
        Self {
            success: false,
            masks: MaskImages::default(),
            overlay_image: None,
            percentages: Percentages::empty(),
            contours: ContourSets::default(),
            processing_time,
            error: Some(message.into()),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

fn encode_or_none(what: &str, encoded: Result<String>) -> Option<String> {
    match encoded {
        Ok(uri) => Some(uri),
        Err(e) => {
            log::warn!("Could not encode {}: {}", what, e);
            None
        }
    }
}

/// Kernel radius clamped to the mask extent
fn effective_radius(mask: &BinaryMask, radius: u32) -> u32 {
    radius.min(mask.width().max(mask.height()).max(1))
}

/// The segmentation engine.
///
/// Holds an optional accelerated backend and a pure fallback. Any stage that
/// fails or panics on the accelerator is rerun on the fallback.
pub struct SegmentationEngine {
    config: Config,
    accelerator: Option<Arc<dyn ImagingBackend>>,
    fallback: PureBackend,
}

impl SegmentationEngine {
    pub fn new(config: Config, accelerator: Option<Arc<dyn ImagingBackend>>) -> Self {
        Self {
            config,
            accelerator,
            fallback: PureBackend,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn accelerator_available(&self) -> bool {
        self.accelerator.is_some()
    }

    /// Name of the backend tried first for each stage
    pub fn backend_name(&self) -> &'static str {
        match &self.accelerator {
            Some(backend) => backend.name(),
            None => self.fallback.name(),
        }
    }

    fn run_stage<T, F>(&self, stage: &str, op: F) -> Result<T>
    where
        F: Fn(&dyn ImagingBackend) -> Result<T>,
    {
        if let Some(accelerator) = &self.accelerator {
            match panic::catch_unwind(AssertUnwindSafe(|| op(accelerator.as_ref()))) {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) => log::warn!(
                    "{} failed on {} backend ({}); rerunning on pure backend",
                    stage,
                    accelerator.name(),
                    e
                ),
                Err(_) => log::warn!(
                    "{} panicked on {} backend; rerunning on pure backend",
                    stage,
                    accelerator.name()
                ),
            }
        }
        op(&self.fallback)
    }

    /// Close-then-open with the lesion kernel
    fn refine(&self, stage: &str, mask: &BinaryMask) -> Result<BinaryMask> {
        let radius = effective_radius(mask, self.config.lesion_kernel_radius);
        self.run_stage(stage, |backend| {
            let closed = backend.close(mask, radius)?;
            backend.open(&closed, radius)
        })
    }

    /// Run the full pipeline on an in-memory raster
    pub fn analyze(&self, image: &RgbImage) -> Result<Segmentation> {
        if image.width() == 0 || image.height() == 0 {
            return Err(SegmentationError::Input("image has zero area".to_string()));
        }

        let working = fit_within(image, self.config.max_dimension);
        let (width, height) = working.dimensions();
        log::debug!(
            "Working raster {}x{} (source {}x{})",
            width,
            height,
            image.width(),
            image.height()
        );

        let labels = classify_image(&working, self.config.classifier_profile);
        let mut scab = self.refine("scab refinement", &labels.scab)?;
        let mut rust = self.refine("rust refinement", &labels.rust)?;
        rust.subtract(&scab);

        if !self.config.leaf_isolation {
            let mut healthy = labels.healthy;
            healthy.subtract(&rust);
            healthy.subtract(&scab);
            let masks = DiseaseMasks { healthy, rust, scab };
            let out = composite_frame(&working, &masks);
            let total = out.counts.total;
            return self.finish(masks, BinaryMask::filled(width, height), out, total, false);
        }

        let location = self.run_stage("leaf location", |backend| {
            locate_main_leaf(&working, backend, self.config.min_leaf_fraction)
        })?;
        let leaf_radius = effective_radius(&location.mask, self.config.leaf_close_radius);
        let mut leaf = self.run_stage("leaf closing", |backend| {
            backend.close(&location.mask, leaf_radius)
        })?;
        if !location.fell_back {
            // Lesions wider than the closing kernel would otherwise stay holes
            leaf = fill_holes(&leaf);
        }

        scab.intersect(&leaf);
        rust.intersect(&leaf);

        // Leaf pixels outside both disease masks count as healthy
        let mut healthy = leaf.clone();
        healthy.subtract(&rust);
        healthy.subtract(&scab);

        let masks = DiseaseMasks { healthy, rust, scab };
        let out = composite(&working, &masks, &leaf);
        let leaf_pixels = out.counts.leaf;
        self.finish(masks, leaf, out, leaf_pixels, location.fell_back)
    }

    fn finish(
        &self,
        masks: DiseaseMasks,
        leaf: BinaryMask,
        out: Composite,
        severity_denominator: u64,
        leaf_fell_back: bool,
    ) -> Result<Segmentation> {
        let settings = self.config.contour_settings();
        let rust_contours = self.run_stage("rust contours", |backend| {
            find_contours(&masks.rust, severity_denominator, backend, &settings)
        })?;
        let scab_contours = self.run_stage("scab contours", |backend| {
            find_contours(&masks.scab, severity_denominator, backend, &settings)
        })?;

        debug_assert!(out.counts.is_conserved());
        log::debug!(
            "Segmented: healthy {:.1}%, rust {:.1}%, scab {:.1}%, background {:.1}%; {} rust / {} scab lesions",
            out.percentages.healthy,
            out.percentages.rust,
            out.percentages.scab,
            out.percentages.background,
            rust_contours.len(),
            scab_contours.len()
        );

        Ok(Segmentation {
            leaf,
            masks,
            overlay: out.overlay,
            counts: out.counts,
            percentages: out.percentages,
            rust_contours,
            scab_contours,
            leaf_fell_back,
        })
    }

    /// Segment a decoded raster into a wire result. Never fails: internal
    /// errors and panics become `success: false`.
    pub fn segment_pixels(&self, image: &RgbImage) -> SegmentationResult {
        self.segment_timed(Instant::now(), image)
    }

    fn segment_timed(&self, start: Instant, image: &RgbImage) -> SegmentationResult {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.analyze(image)));
        let segmentation = match outcome {
            Ok(Ok(segmentation)) => segmentation,
            Ok(Err(e)) => {
                log::error!("Segmentation failed: {}", e);
                return SegmentationResult::failure(e.to_string(), elapsed_ms(start));
            }
            Err(_) => {
                log::error!("Segmentation panicked");
                return SegmentationResult::failure("internal error during segmentation", elapsed_ms(start));
            }
        };

        let Segmentation { masks, overlay, percentages, rust_contours, scab_contours, .. } = segmentation;
        SegmentationResult {
            success: true,
            masks: MaskImages {
                rust: encode_or_none("rust mask", mask_to_data_uri(&masks.rust)),
                scab: encode_or_none("scab mask", mask_to_data_uri(&masks.scab)),
                healthy: encode_or_none("healthy mask", mask_to_data_uri(&masks.healthy)),
            },
            overlay_image: encode_or_none("overlay", rgb_to_data_uri(&overlay)),
            percentages,
            contours: ContourSets {
                rust: rust_contours,
                scab: scab_contours,
            },
            processing_time: elapsed_ms(start),
            error: None,
        }
    }

    /// Decode encoded image bytes and segment them. Undecodable bytes give
    /// `success: false`.
    pub fn segment_bytes(&self, bytes: &[u8]) -> SegmentationResult {
        let start = Instant::now();
        match decode_image(bytes) {
            Ok(image) => self.segment_timed(start, &image),
            Err(e) => {
                log::warn!("{}", e);
                SegmentationResult::failure(e.to_string(), elapsed_ms(start))
            }
        }
    }

    /// Segment a data URI or bare base64 payload.
    ///
    /// A malformed payload is an input error and the pipeline never starts.
    pub fn segment_data_uri(&self, payload: &str) -> Result<SegmentationResult> {
        let bytes = parse_data_uri(payload)?;
        Ok(self.segment_bytes(&bytes))
    }
}

/// Analyse one image from disk, write its per-image reports and return its
/// summary row
pub fn process_image(
    input_image: InputImage,
    engine: &SegmentationEngine,
    debug: bool,
) -> Result<SummaryRow> {
    let InputImage { image, path, filename } = input_image;
    let config = engine.config();
    let start = Instant::now();

    let segmentation = engine.analyze(&image)?;
    let processing_time = elapsed_ms(start);
    let diagnosis = diagnose(
        &segmentation.percentages,
        &segmentation.rust_contours,
        &segmentation.scab_contours,
    );

    log::info!(
        "{}: rust {:.1}%, scab {:.1}% -> {} ({}, confidence {:.2})",
        filename,
        segmentation.percentages.rust,
        segmentation.percentages.scab,
        diagnosis.overall_severity.as_str(),
        diagnosis.estimate.disease.as_str(),
        diagnosis.estimate.confidence
    );
    for advice in &diagnosis.recommendations {
        log::debug!("{}: {}", filename, advice.message());
    }
    if segmentation.leaf_fell_back {
        log::info!("{}: no dominant leaf, statistics cover all vegetation", filename);
    }

    let output_base = PathBuf::from(&config.output_base_dir);
    write_result_json(&segmentation, &diagnosis, processing_time, &output_base, &filename)?;
    write_contours_csv(&segmentation, &output_base, &filename)?;

    if debug || config.save_images {
        let image_dir = output_base.join("images");
        std::fs::create_dir_all(&image_dir)?;

        save_image(&segmentation.overlay, image_dir.join(format!("{}_overlay.png", filename)))?;
        save_mask(&segmentation.leaf, image_dir.join(format!("{}_leaf.png", filename)))?;
        save_mask(&segmentation.masks.healthy, image_dir.join(format!("{}_healthy.png", filename)))?;
        save_mask(&segmentation.masks.rust, image_dir.join(format!("{}_rust.png", filename)))?;
        save_mask(&segmentation.masks.scab, image_dir.join(format!("{}_scab.png", filename)))?;
    }

    Ok(SummaryRow::new(&filename, &path, &segmentation, &diagnosis, processing_time))
}
