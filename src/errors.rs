use thiserror::Error;
use std::io;
use std::path::PathBuf;

/// Custom error types for the segmentation engine
#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Missing or malformed image payload; the pipeline never starts.
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),

    #[error("Imaging accelerator unavailable: {0}")]
    AcceleratorUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV output error: {0}")]
    CsvOutput(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid input path: {0}")]
    InvalidPath(PathBuf),

    #[error("Unexpected error: {0}")]
    Other(String),
}

impl SegmentationError {
    /// HTTP-equivalent status for the transport boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            SegmentationError::Input(_) => 400,
            _ => 500,
        }
    }
}

/// Type alias for Result with our custom error type
pub type Result<T> = std::result::Result<T, SegmentationError>;
