//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use shipwatch_media::MediaError;
use shipwatch_reports::ReportError;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    #[error("Could not decode upload: {0}")]
    Decode(String),

    #[error("Detector returned malformed output: {0}")]
    DetectionFormat(String),

    #[error("{0}")]
    Report(#[from] ReportError),

    #[error("Video source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unsupported_media(msg: impl Into<String>) -> Self {
        Self::UnsupportedMedia(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::Decode(_) | ApiError::DetectionFormat(_) | ApiError::Report(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the `code` field.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Validation(_) => "validation_error",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::UnsupportedMedia(_) => "unsupported_media",
            ApiError::Decode(_) => "decode_error",
            ApiError::DetectionFormat(_) => "detection_format",
            ApiError::Report(_) => "report_generation",
            ApiError::SourceUnavailable(_) => "source_unavailable",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::UnsupportedMedia(msg) => ApiError::UnsupportedMedia(msg),
            MediaError::Decode(msg) => ApiError::Decode(msg),
            MediaError::DetectionFormat(msg) => ApiError::DetectionFormat(msg),
            MediaError::SourceUnavailable(msg) => ApiError::SourceUnavailable(msg),
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => {
                ApiError::SourceUnavailable(e.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Internal(_) => {
                if std::env::var("ENVIRONMENT")
                    .map(|v| v.eq_ignore_ascii_case("production"))
                    .unwrap_or(false)
                {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            success: false,
            detail,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_error_mapping() {
        let err: ApiError = MediaError::unsupported_media("not an image").into();
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let err: ApiError = MediaError::decode("truncated").into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "decode_error");

        let err: ApiError = MediaError::FfmpegNotFound.into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err: ApiError = MediaError::Cancelled.into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_report_error_is_unprocessable() {
        let err: ApiError = ReportError::document("processing_time missing").into();
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "report_generation");
        assert!(err.to_string().starts_with("document report generation failed"));
    }
}
