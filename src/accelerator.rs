// src/accelerator.rs - One-shot, time-bounded accelerator start-up

use std::sync::Arc;
use std::time::Duration;

use crate::backend::ImagingBackend;
use crate::errors::{Result, SegmentationError};

/// Outcome of accelerator initialisation. Every variant leaves the engine usable.
pub enum AcceleratorInit {
    Ready(Arc<dyn ImagingBackend>),
    Unavailable(String),
    TimedOut,
}

impl std::fmt::Debug for AcceleratorInit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcceleratorInit::Ready(backend) => write!(f, "Ready({})", backend.name()),
            AcceleratorInit::Unavailable(reason) => write!(f, "Unavailable({})", reason),
            AcceleratorInit::TimedOut => write!(f, "TimedOut"),
        }
    }
}

impl AcceleratorInit {
    pub fn is_ready(&self) -> bool {
        matches!(self, AcceleratorInit::Ready(_))
    }

    /// Handle to pass into the engine constructor, if any
    pub fn into_backend(self) -> Option<Arc<dyn ImagingBackend>> {
        match self {
            AcceleratorInit::Ready(backend) => Some(backend),
            AcceleratorInit::Unavailable(reason) => {
                log::warn!("Imaging accelerator unavailable ({}); using pure backend", reason);
                None
            }
            AcceleratorInit::TimedOut => {
                log::warn!("Imaging accelerator did not initialise in time; using pure backend");
                None
            }
        }
    }
}

/// Build the accelerated backend and check it against the pure one on a small
/// fixture. Runs on a blocking thread.
#[cfg(feature = "accelerator")]
fn probe() -> Result<Arc<dyn ImagingBackend>> {
    use crate::backend::{ImageprocBackend, PureBackend};
    use crate::image_utils::BinaryMask;

    let fixture = BinaryMask::from_predicate(16, 16, |idx| {
        let (x, y) = (idx % 16, idx / 16);
        ((2..7).contains(&x) && (2..7).contains(&y)) || (x >= 10 && y >= 9)
    });

    let backend = ImageprocBackend;
    let fast = backend.components(&fixture)?;
    let pure = PureBackend.components(&fixture)?;
    let same = fast.len() == pure.len()
        && fast.iter().zip(&pure).all(|(a, b)| a.area() == b.area());
    if !same {
        return Err(SegmentationError::AcceleratorUnavailable(
            "component self-test disagrees with pure backend".to_string(),
        ));
    }
    backend.close(&fixture, 1)?;

    Ok(Arc::new(backend))
}

#[cfg(not(feature = "accelerator"))]
fn probe() -> Result<Arc<dyn ImagingBackend>> {
    Err(SegmentationError::AcceleratorUnavailable(
        "built without the `accelerator` feature".to_string(),
    ))
}

/// Initialise the accelerator once, giving up after `timeout`.
pub async fn initialize(timeout: Duration) -> AcceleratorInit {
    let handle = tokio::task::spawn_blocking(probe);

    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(backend))) => {
            log::info!("Imaging accelerator ready: {}", backend.name());
            AcceleratorInit::Ready(backend)
        }
        Ok(Ok(Err(e))) => AcceleratorInit::Unavailable(e.to_string()),
        Ok(Err(join_error)) => AcceleratorInit::Unavailable(format!("probe failed: {}", join_error)),
        Err(_) => AcceleratorInit::TimedOut,
    }
}

/// Blocking wrapper around [`initialize`] for callers without a runtime
pub fn initialize_blocking(timeout: Duration) -> Result<AcceleratorInit> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_time()
        .build()
        .map_err(|e| SegmentationError::Other(format!("failed to start runtime: {}", e)))?;

    Ok(runtime.block_on(initialize(timeout)))
}
