//! The plain result mapping both renderers consume.
//!
//! Reports are produced from JSON that may have travelled through a client,
//! so parsing is tolerant of the older field names (`ships`, `conf`,
//! `total_ships`) and of missing per-detection fields.

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Renderer, ReportError, ReportResult};

/// Timestamp format shown in both reports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One detection row of a result mapping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DetectionRecord {
    #[serde(rename = "class", default = "unknown_class")]
    pub class_label: String,
    #[serde(alias = "conf", default)]
    pub confidence: f64,
    #[serde(default)]
    pub bbox: [f64; 4],
}

fn unknown_class() -> String {
    "unknown".to_string()
}

impl DetectionRecord {
    /// Confidence as a percentage with one decimal.
    pub fn confidence_percent(&self) -> String {
        format!("{:.1}", self.confidence * 100.0)
    }

    /// Box corners truncated toward zero.
    pub fn truncated_bbox(&self) -> [i64; 4] {
        self.bbox.map(|v| v.trunc() as i64)
    }
}

/// An image or video result as a plain mapping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ResultMapping {
    /// Seconds spent producing the result
    pub processing_time: f64,
    #[serde(alias = "ships", default)]
    pub detections: Vec<DetectionRecord>,
    #[serde(alias = "total_ships", default)]
    pub total_count: Option<u64>,
    #[serde(default)]
    pub frames_processed: Option<u64>,
    #[serde(default)]
    pub frames_with_detections: Option<u64>,
    #[serde(default)]
    pub max_detections_per_frame: Option<u64>,
    #[serde(default)]
    pub total_detections_detected: Option<u64>,
    #[serde(default)]
    pub avg_detections_per_frame: Option<f64>,
}

/// Video statistics present in a mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoStats {
    pub frames_processed: u64,
    pub frames_with_detections: u64,
    pub max_detections_per_frame: u64,
    pub avg_detections_per_frame: f64,
}

impl ResultMapping {
    /// Detection total as reported by the result.
    pub fn detection_count(&self) -> u64 {
        self.total_count
            .or(self.total_detections_detected)
            .unwrap_or(self.detections.len() as u64)
    }

    /// Video statistics, when this mapping describes a video.
    pub fn video_stats(&self) -> Option<VideoStats> {
        let frames_processed = self.frames_processed?;
        Some(VideoStats {
            frames_processed,
            frames_with_detections: self.frames_with_detections.unwrap_or(0),
            max_detections_per_frame: self.max_detections_per_frame.unwrap_or(0),
            avg_detections_per_frame: self.avg_detections_per_frame.unwrap_or(0.0),
        })
    }

    /// Processing time with three decimals.
    pub fn processing_time_display(&self) -> String {
        format!("{:.3}s", self.processing_time)
    }
}

/// A result mapping stamped with its generation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportJob {
    pub result: ResultMapping,
    pub generated_at: NaiveDateTime,
}

impl ReportJob {
    /// Parse `value` for `renderer`, failing with an error that names it.
    pub fn parse(value: &Value, renderer: Renderer, generated_at: NaiveDateTime) -> ReportResult<Self> {
        if !value.is_object() {
            return Err(ReportError::new(renderer, "result must be a JSON object"));
        }

        let result = ResultMapping::deserialize(value)
            .map_err(|e| ReportError::new(renderer, format!("malformed result: {}", e)))?;

        if !result.processing_time.is_finite() {
            return Err(ReportError::new(renderer, "processing_time must be finite"));
        }

        Ok(Self {
            result,
            generated_at,
        })
    }

    pub fn timestamp(&self) -> String {
        self.generated_at.format(TIMESTAMP_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_opt(9, 30, 5)
            .unwrap()
    }

    #[test]
    fn test_parse_image_result() {
        let value = json!({
            "processing_time": 0.4567,
            "detections": [{"class": "boat", "confidence": 0.912, "bbox": [10.7, 20.2, 30.9, 40.0]}],
            "total_count": 1,
            "has_detections": true
        });
        let job = ReportJob::parse(&value, Renderer::Document, at()).unwrap();

        assert_eq!(job.timestamp(), "2024-05-17 09:30:05");
        assert_eq!(job.result.detection_count(), 1);
        assert_eq!(job.result.processing_time_display(), "0.457s");

        let det = &job.result.detections[0];
        assert_eq!(det.confidence_percent(), "91.2");
        assert_eq!(det.truncated_bbox(), [10, 20, 30, 40]);
        assert!(job.result.video_stats().is_none());
    }

    #[test]
    fn test_parse_legacy_field_names() {
        let value = json!({
            "processing_time": 1.0,
            "ships": [{"class": "ship", "conf": 0.5, "bbox": [1, 2, 3, 4]}],
            "total_ships": 7
        });
        let job = ReportJob::parse(&value, Renderer::Spreadsheet, at()).unwrap();

        assert_eq!(job.result.detections.len(), 1);
        assert_eq!(job.result.detections[0].confidence_percent(), "50.0");
        assert_eq!(job.result.detection_count(), 7);
    }

    #[test]
    fn test_parse_video_result() {
        let value = json!({
            "processing_time": 12.5,
            "frames_processed": 4,
            "frames_with_detections": 2,
            "max_detections_per_frame": 5,
            "total_detections_detected": 8,
            "avg_detections_per_frame": 2.0
        });
        let job = ReportJob::parse(&value, Renderer::Document, at()).unwrap();

        assert_eq!(job.result.detection_count(), 8);
        let stats = job.result.video_stats().unwrap();
        assert_eq!(stats.frames_processed, 4);
        assert_eq!(stats.max_detections_per_frame, 5);
    }

    #[test]
    fn test_missing_processing_time() {
        let value = json!({"detections": []});
        let err = ReportJob::parse(&value, Renderer::Spreadsheet, at()).unwrap_err();
        assert_eq!(err.renderer, Renderer::Spreadsheet);
        assert!(err.message.contains("processing_time"));
    }

    #[test]
    fn test_malformed_shapes() {
        let bad_bbox = json!({"processing_time": 1.0, "detections": [{"bbox": [1, 2, 3]}]});
        assert!(ReportJob::parse(&bad_bbox, Renderer::Document, at()).is_err());

        let not_object = json!([1, 2, 3]);
        let err = ReportJob::parse(&not_object, Renderer::Document, at()).unwrap_err();
        assert_eq!(err.renderer, Renderer::Document);
    }

    #[test]
    fn test_missing_detection_fields_default() {
        let value = json!({"processing_time": 0.1, "detections": [{}]});
        let job = ReportJob::parse(&value, Renderer::Document, at()).unwrap();
        let det = &job.result.detections[0];
        assert_eq!(det.class_label, "unknown");
        assert_eq!(det.truncated_bbox(), [0, 0, 0, 0]);
    }
}
