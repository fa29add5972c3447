//! Decoded frames and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;

/// A frame retained by the sampler for evaluation.
///
/// Only lives for the duration of one iteration step.
#[derive(Debug, Clone)]
pub struct FrameSample {
    /// 1-based position of the frame in the source
    pub frame_index: u64,
    /// RGB pixels
    pub frame: RgbImage,
}

/// Shared cancellation flag for long-running video analysis.
///
/// The request side raises it; the analysis loop checks it between frames.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
