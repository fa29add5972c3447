//! Image and video detection handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use shipwatch_media::CancelFlag;
use shipwatch_models::{ImageResult, SamplingOptions, VideoResult};
use tracing::{info, warn};
use validator::Validate;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Multipart field carrying the upload.
pub const UPLOAD_FIELD: &str = "file";

/// Successful detection response.
#[derive(Debug, Serialize)]
pub struct DetectionResponse<T> {
    pub success: bool,
    /// Wall-clock seconds, rounded to milliseconds
    pub processing_time: f64,
    pub results: T,
}

impl<T> DetectionResponse<T> {
    fn new(results: T, started: Instant) -> Self {
        let secs = started.elapsed().as_secs_f64();
        Self {
            success: true,
            processing_time: (secs * 1000.0).round() / 1000.0,
            results,
        }
    }
}

/// A file taken from a multipart form.
#[derive(Debug)]
pub struct Upload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }

    fn describe_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or("no content type")
    }
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::bad_request(e.body_text())
    }
}

/// Pull the `file` field out of a multipart body.
async fn read_upload(multipart: Result<Multipart, MultipartRejection>) -> ApiResult<Upload> {
    let mut multipart = multipart.map_err(|e| ApiError::bad_request(e.body_text()))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;
        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(ApiError::bad_request(format!(
        "multipart field '{}' is required",
        UPLOAD_FIELD
    )))
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    ApiError::internal(format!("detection task failed: {}", e))
}

/// Detect objects in an uploaded image.
pub async fn detect_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<DetectionResponse<ImageResult>>> {
    let started = Instant::now();
    let upload = read_upload(multipart).await?;

    if !upload.is_image() {
        return Err(ApiError::unsupported_media(format!(
            "expected an image upload, got {}",
            upload.describe_type()
        )));
    }

    info!(
        file_name = ?upload.file_name,
        bytes = upload.bytes.len(),
        "Detecting objects in image"
    );

    let engine = Arc::clone(&state.engine);
    let bytes = upload.bytes;
    let result = tokio::task::spawn_blocking(move || engine.detect_image(&bytes))
        .await
        .map_err(join_error)??;

    let response = DetectionResponse::new(result, started);
    metrics::record_detection(
        "image",
        response.results.total_count() as u64,
        response.processing_time,
    );
    Ok(Json(response))
}

/// Query parameters for video analysis.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct VideoQuery {
    /// Keep every N-th frame
    #[validate(range(min = 1, max = 1000))]
    pub sample_rate: Option<u32>,
    /// Stop after this many sampled frames
    #[validate(range(min = 1, max = 10000))]
    pub max_frames: Option<u32>,
}

impl VideoQuery {
    /// Sampling for this request, filling gaps from `defaults`.
    pub fn sampling(&self, defaults: SamplingOptions) -> ApiResult<SamplingOptions> {
        self.validate()
            .map_err(|e| ApiError::validation(e.to_string()))?;
        SamplingOptions::new(
            self.sample_rate.unwrap_or(defaults.sample_rate),
            self.max_frames.unwrap_or(defaults.max_frames),
        )
        .map_err(|e| ApiError::validation(e.to_string()))
    }
}

/// Analyze an uploaded video.
///
/// If the client disconnects mid-analysis the request future is dropped,
/// which raises the cancel flag and stops the blocking loop at the next frame.
pub async fn detect_video(
    State(state): State<AppState>,
    query: Result<Query<VideoQuery>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<DetectionResponse<VideoResult>>> {
    let started = Instant::now();

    let Query(query) = query.map_err(|e| ApiError::validation(e.body_text()))?;
    let options = query.sampling(state.engine.config().default_sampling)?;

    let upload = read_upload(multipart).await?;
    if upload.is_image() {
        return Err(ApiError::unsupported_media(format!(
            "expected a video upload, got {}",
            upload.describe_type()
        )));
    }

    info!(
        file_name = ?upload.file_name,
        bytes = upload.bytes.len(),
        sample_rate = options.sample_rate,
        max_frames = options.max_frames,
        "Analyzing uploaded video"
    );

    let cancel = CancelFlag::new();
    let guard = scopeguard::guard(cancel.clone(), |flag| {
        warn!("Request dropped, cancelling video analysis");
        flag.cancel();
    });

    let engine = Arc::clone(&state.engine);
    let bytes = upload.bytes;
    let joined =
        tokio::task::spawn_blocking(move || engine.analyze_video(&bytes, options, &cancel)).await;

    // Finished normally; nothing to cancel
    let _ = scopeguard::ScopeGuard::into_inner(guard);

    let result = joined.map_err(join_error)??;

    metrics::record_video_frames(result.frames_processed());
    let response = DetectionResponse::new(result, started);
    metrics::record_detection(
        "video",
        response.results.total_detections_detected(),
        response.processing_time,
    );
    Ok(Json(response))
}
