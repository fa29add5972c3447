//! Image and video analysis results.

use serde::Serialize;

use crate::detection::Detection;

/// Result of running detection on a single image or frame.
///
/// `total_count` always equals the number of detections; the type can only
/// be built from a detection list so the two cannot drift apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageResult {
    detections: Vec<Detection>,
    total_count: usize,
    has_detections: bool,
}

impl ImageResult {
    /// Build a result from detections in model emission order.
    pub fn new(detections: Vec<Detection>) -> Self {
        let total_count = detections.len();
        Self {
            detections,
            total_count,
            has_detections: total_count > 0,
        }
    }

    /// An image with nothing detected.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn has_detections(&self) -> bool {
        self.has_detections
    }

    pub fn into_detections(self) -> Vec<Detection> {
        self.detections
    }
}

/// Aggregate statistics for one analyzed video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoResult {
    frames_processed: u64,
    frames_with_detections: u64,
    max_detections_per_frame: u64,
    total_detections_detected: u64,
    avg_detections_per_frame: f64,
    has_detections: bool,
}

impl VideoResult {
    /// Build a result from running totals.
    ///
    /// The average is `total / frames` rounded to two decimals, or `0` when
    /// no frame was processed.
    pub fn from_totals(
        frames_processed: u64,
        frames_with_detections: u64,
        max_detections_per_frame: u64,
        total_detections_detected: u64,
    ) -> Self {
        let avg_detections_per_frame = if frames_processed > 0 {
            round2(total_detections_detected as f64 / frames_processed as f64)
        } else {
            0.0
        };

        Self {
            frames_processed,
            frames_with_detections: frames_with_detections.min(frames_processed),
            max_detections_per_frame,
            total_detections_detected,
            avg_detections_per_frame,
            has_detections: frames_with_detections > 0,
        }
    }

    /// Result for a video in which no frame was evaluated.
    pub fn empty() -> Self {
        Self::from_totals(0, 0, 0, 0)
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn frames_with_detections(&self) -> u64 {
        self.frames_with_detections
    }

    pub fn max_detections_per_frame(&self) -> u64 {
        self.max_detections_per_frame
    }

    pub fn total_detections_detected(&self) -> u64 {
        self.total_detections_detected
    }

    pub fn avg_detections_per_frame(&self) -> f64 {
        self.avg_detections_per_frame
    }

    pub fn has_detections(&self) -> bool {
        self.has_detections
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
