//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while decoding, sampling or running detection.
#[derive(Debug, Error)]
pub enum MediaError {
    /// Input is not the kind of media the operation expects.
    #[error("Unsupported media: {0}")]
    UnsupportedMedia(String),

    /// Bytes claimed to be media but could not be parsed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The video source could not be opened at all.
    #[error("Video source unavailable: {0}")]
    SourceUnavailable(String),

    /// The detection collaborator returned an unrecognized shape.
    #[error("Detection output malformed: {0}")]
    DetectionFormat(String),

    /// Model inference itself failed for one frame.
    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    pub fn unsupported_media(message: impl Into<String>) -> Self {
        Self::UnsupportedMedia(message.into())
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable(message.into())
    }

    pub fn detection_format(message: impl Into<String>) -> Self {
        Self::DetectionFormat(message.into())
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference(message.into())
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<String>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this failure only concerns the current frame.
    ///
    /// Frame-local failures are absorbed during video analysis instead of
    /// aborting the whole run.
    pub fn is_frame_local(&self) -> bool {
        matches!(
            self,
            MediaError::Decode(_) | MediaError::DetectionFormat(_) | MediaError::Inference(_)
        )
    }
}
