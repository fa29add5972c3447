//! Report export handlers.

use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use serde::Deserialize;
use serde_json::Value;
use shipwatch_reports::ReportResult;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::metrics;

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Export request body.
#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    /// Image or video result as returned by a detect endpoint
    pub results: Value,
    /// Used when `results` carries no `processing_time` of its own
    #[serde(default)]
    pub processing_time: Option<f64>,
}

impl ExportRequest {
    /// The mapping handed to the renderer.
    pub fn into_mapping(self) -> Value {
        let mut results = self.results;
        if let (Some(map), Some(secs)) = (results.as_object_mut(), self.processing_time) {
            if !map.contains_key("processing_time") {
                map.insert("processing_time".to_string(), Value::from(secs));
            }
        }
        results
    }
}

#[derive(Debug, Clone, Copy)]
enum ReportFormat {
    Pdf,
    Excel,
}

impl ReportFormat {
    fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "excel",
        }
    }

    fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => PDF_CONTENT_TYPE,
            ReportFormat::Excel => XLSX_CONTENT_TYPE,
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Pdf => "pdf",
            ReportFormat::Excel => "xlsx",
        }
    }

    fn render(&self, mapping: &Value) -> ReportResult<Vec<u8>> {
        match self {
            ReportFormat::Pdf => shipwatch_reports::render_document(mapping),
            ReportFormat::Excel => shipwatch_reports::render_spreadsheet(mapping),
        }
    }
}

async fn export(
    format: ReportFormat,
    body: Result<Json<ExportRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let mapping = request.into_mapping();

    let rendered = tokio::task::spawn_blocking(move || format.render(&mapping))
        .await
        .map_err(|e| ApiError::internal(format!("report task failed: {}", e)))?;

    let bytes = match rendered {
        Ok(bytes) => {
            metrics::record_report(format.as_str(), true);
            bytes
        }
        Err(e) => {
            warn!(format = format.as_str(), error = %e, "Report generation failed");
            metrics::record_report(format.as_str(), false);
            return Err(e.into());
        }
    };

    let file_name = format!(
        "detection_report_{}.{}",
        Local::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    );
    info!(format = format.as_str(), bytes = bytes.len(), file_name = %file_name, "Report exported");

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name))
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(format.content_type())),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// Render a result as a PDF report.
pub async fn export_pdf(body: Result<Json<ExportRequest>, JsonRejection>) -> ApiResult<Response> {
    export(ReportFormat::Pdf, body).await
}

/// Render a result as an XLSX workbook.
pub async fn export_excel(body: Result<Json<ExportRequest>, JsonRejection>) -> ApiResult<Response> {
    export(ReportFormat::Excel, body).await
}
