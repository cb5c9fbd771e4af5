// src/transport.rs - Request/response mapping at the service boundary

use serde::{Deserialize, Serialize};

use crate::errors::SegmentationError;
use crate::pipeline::{SegmentationEngine, SegmentationResult};

pub const SERVICE_NAME: &str = "leaf-disease-segmentation";

/// Body of a segmentation request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SegmentRequest {
    #[serde(default)]
    pub image: Option<String>,
}

/// Status code plus the JSON body to send back
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResponse {
    pub status: u16,
    pub body: SegmentationResult,
}

impl SegmentResponse {
    fn rejected(error: SegmentationError) -> Self {
        Self {
            status: error.status_code(),
            body: SegmentationResult::failure(error.to_string(), 0),
        }
    }
}

/// Handle a JSON request body.
///
/// A body that is not JSON, or carries no usable `image`, is answered with
/// 400 before the pipeline starts. A failed segmentation answers 500 with the
/// failure-shaped result body.
pub fn handle_segment_request(engine: &SegmentationEngine, body: &str) -> SegmentResponse {
    let request: SegmentRequest = match serde_json::from_str(body) {
        Ok(request) => request,
        Err(e) => {
            return SegmentResponse::rejected(SegmentationError::Input(format!(
                "request body is not valid JSON: {}",
                e
            )))
        }
    };

    let image = match request.image.as_deref().map(str::trim) {
        Some(image) if !image.is_empty() => image,
        _ => {
            return SegmentResponse::rejected(SegmentationError::Input(
                "no image provided".to_string(),
            ))
        }
    };

    match engine.segment_data_uri(image) {
        Ok(body) => SegmentResponse {
            status: if body.success { 200 } else { 500 },
            body,
        },
        Err(e) => SegmentResponse::rejected(e),
    }
}

/// Liveness report for the segmentation service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub accelerator_available: bool,
    pub backend: String,
}

/// `ok` with an accelerator, `degraded` when running on the pure backend only
pub fn health_report(engine: &SegmentationEngine) -> HealthReport {
    let accelerated = engine.accelerator_available();
    HealthReport {
        status: if accelerated { "ok" } else { "degraded" }.to_string(),
        service: SERVICE_NAME.to_string(),
        accelerator_available: accelerated,
        backend: engine.backend_name().to_string(),
    }
}
