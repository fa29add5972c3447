//! Live stream reply messages.

use serde::Serialize;

use crate::detection::Detection;
use crate::result::ImageResult;

/// Reply sent for each inbound frame on the live stream.
#[derive(Debug, Clone, Serialize)]
pub struct StreamReply {
    pub detections: Vec<Detection>,
    pub total_count: usize,
    pub has_detections: bool,
    /// Seconds spent on this frame, rounded to milliseconds
    pub processing_time: f64,
}

impl StreamReply {
    pub fn new(result: ImageResult, processing_time: f64) -> Self {
        let total_count = result.total_count();
        let has_detections = result.has_detections();
        Self {
            detections: result.into_detections(),
            total_count,
            has_detections,
            processing_time: (processing_time * 1000.0).round() / 1000.0,
        }
    }
}
