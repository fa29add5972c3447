//! Error types for report rendering.

use std::fmt;
use thiserror::Error;

/// Result type for report operations.
pub type ReportResult<T> = Result<T, ReportError>;

/// Which renderer produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    Document,
    Spreadsheet,
}

impl Renderer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Renderer::Document => "document",
            Renderer::Spreadsheet => "spreadsheet",
        }
    }
}

impl fmt::Display for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A report could not be generated.
#[derive(Debug, Error)]
#[error("{renderer} report generation failed: {message}")]
pub struct ReportError {
    pub renderer: Renderer,
    pub message: String,
}

impl ReportError {
    pub fn new(renderer: Renderer, message: impl Into<String>) -> Self {
        Self {
            renderer,
            message: message.into(),
        }
    }

    pub fn document(message: impl Into<String>) -> Self {
        Self::new(Renderer::Document, message)
    }

    pub fn spreadsheet(message: impl Into<String>) -> Self {
        Self::new(Renderer::Spreadsheet, message)
    }
}

impl From<lopdf::Error> for ReportError {
    fn from(e: lopdf::Error) -> Self {
        Self::document(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReportError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Self::spreadsheet(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_renderer() {
        let err = ReportError::spreadsheet("missing field `processing_time`");
        assert_eq!(err.renderer, Renderer::Spreadsheet);
        assert_eq!(
            err.to_string(),
            "spreadsheet report generation failed: missing field `processing_time`"
        );
    }
}
