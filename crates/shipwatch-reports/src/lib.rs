//! Report rendering for detection results.
//!
//! Both renderers take a plain JSON result mapping rather than a live result
//! object, so reports can be produced long after (and away from) the
//! detection call that created the result.

pub mod document;
pub mod error;
pub mod input;
pub mod spreadsheet;

use chrono::{Local, NaiveDateTime};
use serde_json::Value;
use tracing::info;

pub use document::DocumentLayout;
pub use error::{Renderer, ReportError, ReportResult};
pub use input::{DetectionRecord, ReportJob, ResultMapping, VideoStats};
pub use spreadsheet::SheetLayout;

/// Render a result mapping as a PDF document, stamped with the current time.
pub fn render_document(result: &Value) -> ReportResult<Vec<u8>> {
    render_document_at(result, Local::now().naive_local())
}

/// Render a result mapping as a PDF document with a fixed timestamp.
pub fn render_document_at(result: &Value, generated_at: NaiveDateTime) -> ReportResult<Vec<u8>> {
    info!("Starting PDF generation");
    let job = ReportJob::parse(result, Renderer::Document, generated_at)?;
    document::render(&DocumentLayout::from_job(&job))
}

/// Render a result mapping as an XLSX workbook, stamped with the current time.
pub fn render_spreadsheet(result: &Value) -> ReportResult<Vec<u8>> {
    render_spreadsheet_at(result, Local::now().naive_local())
}

/// Render a result mapping as an XLSX workbook with a fixed timestamp.
pub fn render_spreadsheet_at(result: &Value, generated_at: NaiveDateTime) -> ReportResult<Vec<u8>> {
    info!("Starting spreadsheet generation");
    let job = ReportJob::parse(result, Renderer::Spreadsheet, generated_at)?;
    spreadsheet::render(&SheetLayout::from_job(&job))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_document_same_input_same_bytes() {
        let result = json!({
            "processing_time": 0.5,
            "detections": [{"class": "boat", "confidence": 0.9, "bbox": [1, 2, 3, 4]}],
            "total_count": 1
        });
        let at = chrono::NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap();

        let first = render_document_at(&result, at).unwrap();
        let second = render_document_at(&result, at).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_errors_name_the_renderer() {
        let bad = json!({"detections": "nope"});

        let err = render_document(&bad).unwrap_err();
        assert_eq!(err.renderer, Renderer::Document);

        let err = render_spreadsheet(&bad).unwrap_err();
        assert_eq!(err.renderer, Renderer::Spreadsheet);
    }

    #[test]
    fn test_render_spreadsheet_video_result() {
        let result = json!({
            "processing_time": 4.2,
            "frames_processed": 60,
            "frames_with_detections": 12,
            "max_detections_per_frame": 3,
            "total_detections_detected": 20,
            "avg_detections_per_frame": 0.33
        });
        let bytes = render_spreadsheet(&result).unwrap();
        assert!(!bytes.is_empty());
    }
}
