//! The object detector seam.

use std::sync::Arc;

use image::RgbImage;

use crate::error::MediaResult;

/// One raw prediction as emitted by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Index into the detector's class-name table
    pub class_id: usize,
    pub confidence: f32,
    /// `[x1, y1, x2, y2]` in frame pixel coordinates
    pub bbox: [f32; 4],
}

impl RawDetection {
    pub fn new(class_id: usize, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

/// Raw output for one frame, together with the label table it refers to.
#[derive(Debug, Clone)]
pub struct RawOutput {
    pub detections: Vec<RawDetection>,
    pub class_names: Arc<Vec<String>>,
}

impl RawOutput {
    pub fn new(detections: Vec<RawDetection>, class_names: Arc<Vec<String>>) -> Self {
        Self {
            detections,
            class_names,
        }
    }

    /// Label for a class id, if the id is inside the table.
    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.class_names.get(class_id).map(String::as_str)
    }
}

/// A loaded detection model.
///
/// Built once at start-up and shared read-only by every request.
pub trait ObjectDetector: Send + Sync {
    /// Short backend name for logs and readiness reports.
    fn name(&self) -> &'static str;

    /// Run the model on one frame.
    ///
    /// `confidence_threshold` is a hint the backend may use to skip weak
    /// candidates early; final filtering is done by the normalizer.
    fn predict(&self, frame: &RgbImage, confidence_threshold: f32) -> MediaResult<RawOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_lookup() {
        let output = RawOutput::new(
            vec![RawDetection::new(1, 0.9, [0.0, 0.0, 1.0, 1.0])],
            Arc::new(vec!["person".to_string(), "boat".to_string()]),
        );
        assert_eq!(output.class_name(1), Some("boat"));
        assert_eq!(output.class_name(2), None);
    }
}
