use std::sync::Arc;

use assert_approx_eq::assert_approx_eq;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{ImageOutputFormat, Rgb, RgbImage};

use leaf_disease_segment_lib::classifier::ClassifierProfile;
use leaf_disease_segment_lib::config::Config;
use leaf_disease_segment_lib::contours::Severity;
use leaf_disease_segment_lib::errors::{Result, SegmentationError};
use leaf_disease_segment_lib::image_io::data_uri_to_gray;
use leaf_disease_segment_lib::image_utils::BinaryMask;
use leaf_disease_segment_lib::regions::Region;
use leaf_disease_segment_lib::transport::handle_segment_request;
use leaf_disease_segment_lib::{ImagingBackend, SegmentationEngine};

const GREEN: Rgb<u8> = Rgb([40, 160, 40]);
const ORANGE: Rgb<u8> = Rgb([230, 140, 20]);

/// Backend whose every operation fails
struct BrokenBackend;

impl ImagingBackend for BrokenBackend {
    fn name(&self) -> &'static str {
        "broken"
    }

    fn close(&self, _: &BinaryMask, _: u32) -> Result<BinaryMask> {
        Err(SegmentationError::AcceleratorUnavailable("context lost".into()))
    }

    fn open(&self, _: &BinaryMask, _: u32) -> Result<BinaryMask> {
        Err(SegmentationError::AcceleratorUnavailable("context lost".into()))
    }

    fn components(&self, _: &BinaryMask) -> Result<Vec<Region>> {
        panic!("labelling kernel crashed")
    }
}

fn pure_engine() -> SegmentationEngine {
    SegmentationEngine::new(Config::default(), None)
}

fn orange_green_split() -> RgbImage {
    RgbImage::from_fn(100, 100, |x, _| if x < 60 { ORANGE } else { GREEN })
}

/// Deterministic speckled scene: leaf tones, lesions, soil and sky
fn speckled_scene(width: u32, height: u32) -> RgbImage {
    let palette = [
        GREEN,
        ORANGE,
        Rgb([90, 60, 30]),
        Rgb([20, 20, 20]),
        Rgb([150, 190, 240]),
        Rgb([240, 240, 240]),
        Rgb([70, 120, 50]),
    ];
    let mut state: u32 = 0x2545_f491;
    RgbImage::from_fn(width, height, |x, y| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        // Blocky layout so components of many sizes appear
        let block = ((x / 6) * 31 + (y / 5) * 17) as usize;
        let jitter = (state >> 28) as usize;
        palette[(block + if jitter < 3 { jitter } else { 0 }) % palette.len()]
    })
}

fn png_data_uri(image: &RgbImage) -> String {
    let mut bytes = std::io::Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageOutputFormat::Png).unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(bytes.into_inner()))
}

#[test]
fn all_green_leaf_is_fully_healthy() {
    let image = RgbImage::from_pixel(100, 100, GREEN);
    let segmentation = pure_engine().analyze(&image).unwrap();

    assert_eq!(segmentation.counts.leaf, 10_000);
    assert_approx_eq!(segmentation.percentages.healthy, 100.0);
    assert_approx_eq!(segmentation.percentages.rust, 0.0);
    assert_approx_eq!(segmentation.percentages.scab, 0.0);
    assert_approx_eq!(segmentation.percentages.background, 0.0);
    assert!(segmentation.rust_contours.is_empty());
    assert!(segmentation.scab_contours.is_empty());
}

#[test]
fn orange_green_split_reports_one_large_rust_lesion() {
    let segmentation = pure_engine().analyze(&orange_green_split()).unwrap();

    assert_approx_eq!(segmentation.percentages.rust, 60.0);
    assert_approx_eq!(segmentation.percentages.healthy, 40.0);
    assert_approx_eq!(segmentation.percentages.scab, 0.0);
    assert_approx_eq!(segmentation.percentages.sum(), 100.0);

    assert_eq!(segmentation.rust_contours.len(), 1);
    let lesion = &segmentation.rust_contours[0];
    assert_eq!(lesion.area, 6000);
    assert_eq!(lesion.bounding_box.x, 0);
    assert_eq!(lesion.bounding_box.width, 60);
    assert_eq!(lesion.bounding_box.height, 100);
    assert_eq!(lesion.severity, Severity::High);
}

#[test]
fn lesion_wider_than_closing_kernel_stays_on_the_leaf() {
    // 44x44 dark lesion, far wider than the radius-15 leaf closing
    let image = RgbImage::from_fn(100, 100, |x, y| {
        if (28..72).contains(&x) && (28..72).contains(&y) {
            Rgb([30, 30, 30])
        } else {
            GREEN
        }
    });
    let segmentation = pure_engine().analyze(&image).unwrap();

    assert!(!segmentation.leaf_fell_back);
    assert_eq!(segmentation.counts.leaf, 10_000);
    assert_eq!(segmentation.counts.background, 0);
    // Opening trims the four lesion corners back to healthy
    assert_eq!(segmentation.counts.scab, 44 * 44 - 4);
    assert_approx_eq!(segmentation.percentages.scab, 19.32, 1e-9);
    assert_approx_eq!(segmentation.percentages.healthy, 80.68, 1e-9);
    assert_approx_eq!(segmentation.percentages.background, 0.0);

    assert_eq!(segmentation.scab_contours.len(), 1);
    assert_eq!(segmentation.scab_contours[0].area, 1932);
    assert_eq!(segmentation.scab_contours[0].severity, Severity::High);
}

#[test]
fn pixel_counts_are_conserved_across_configurations() {
    let image = speckled_scene(72, 60);
    for profile in [ClassifierProfile::SharedBox, ClassifierProfile::DualBucket] {
        for leaf_isolation in [true, false] {
            let config = Config {
                classifier_profile: profile,
                leaf_isolation,
                ..Config::default()
            };
            let segmentation = SegmentationEngine::new(config, None).analyze(&image).unwrap();
            let counts = segmentation.counts;

            assert_eq!(counts.total, 72 * 60);
            assert!(counts.is_conserved(), "{:?} isolation={} {:?}", profile, leaf_isolation, counts);

            let p = segmentation.percentages;
            for value in [p.healthy, p.rust, p.scab, p.background] {
                assert!((0.0..=100.0).contains(&value));
            }
            if !leaf_isolation {
                assert_approx_eq!(p.sum(), 100.0, 1e-9);
            } else if counts.leaf > 0 {
                // Leaf-relative categories partition the leaf
                assert_approx_eq!(p.healthy + p.rust + p.scab, 100.0, 1e-9);
            }
        }
    }
}

#[test]
fn contours_are_capped_and_sorted() {
    let image = speckled_scene(200, 150);
    let config = Config { min_lesion_area_reference: 1, ..Config::default() };
    let segmentation = SegmentationEngine::new(config, None).analyze(&image).unwrap();

    for contours in [&segmentation.rust_contours, &segmentation.scab_contours] {
        assert!(contours.len() <= 50);
        for pair in contours.windows(2) {
            assert!(pair[0].area >= pair[1].area);
        }
    }
}

#[test]
fn broken_accelerator_degrades_to_identical_results() {
    let image = speckled_scene(64, 48);
    let pure = pure_engine().analyze(&image).unwrap();
    let degraded = SegmentationEngine::new(Config::default(), Some(Arc::new(BrokenBackend)))
        .analyze(&image)
        .unwrap();

    assert_eq!(pure.counts, degraded.counts);
    assert_eq!(pure.percentages, degraded.percentages);
    assert_eq!(pure.rust_contours, degraded.rust_contours);
    assert_eq!(pure.scab_contours, degraded.scab_contours);
    assert_eq!(pure.leaf, degraded.leaf);
}

#[cfg(feature = "accelerator")]
#[test]
fn imageproc_backend_agrees_on_split_image() {
    use leaf_disease_segment_lib::ImageprocBackend;

    let engine = SegmentationEngine::new(Config::default(), Some(Arc::new(ImageprocBackend)));
    let segmentation = engine.analyze(&orange_green_split()).unwrap();
    assert_eq!(engine.backend_name(), "imageproc");
    assert_approx_eq!(segmentation.percentages.rust, 60.0, 1.0);
    assert_approx_eq!(segmentation.percentages.healthy, 40.0, 1.0);
    assert_eq!(segmentation.rust_contours.len(), 1);
}

#[test]
fn large_inputs_are_downscaled_to_working_resolution() {
    let image = RgbImage::from_pixel(600, 400, GREEN);
    let segmentation = pure_engine().analyze(&image).unwrap();
    assert_eq!(segmentation.leaf.dimensions(), (300, 200));
    assert_eq!(segmentation.counts.total, 60_000);
}

#[test]
fn data_uri_request_end_to_end() {
    let body = serde_json::json!({ "image": png_data_uri(&orange_green_split()) }).to_string();
    let response = handle_segment_request(&pure_engine(), &body);

    assert_eq!(response.status, 200);
    let result = response.body;
    assert!(result.success);
    assert!(result.error.is_none());
    assert_approx_eq!(result.percentages.rust, 60.0);

    let rust = data_uri_to_gray(result.masks.rust.as_deref().unwrap()).unwrap();
    assert_eq!(rust.dimensions(), (100, 100));
    assert_eq!(rust.pixels().filter(|p| p.0[0] == 255).count(), 6000);
    assert!(rust.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["contours"]["rust"][0]["boundingBox"]["width"], 60);
    assert_eq!(json["contours"]["rust"][0]["severity"], "high");
    assert!(json["overlayImage"].as_str().unwrap().starts_with("data:image/png;base64,"));
}

#[test]
fn empty_request_is_a_client_error() {
    let response = handle_segment_request(&pure_engine(), r#"{"image": null}"#);
    assert_eq!(response.status, 400);
    assert_approx_eq!(response.body.percentages.background, 100.0);
    assert!(response.body.contours.rust.is_empty());
}
