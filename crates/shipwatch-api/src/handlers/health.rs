//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Service banner.
#[derive(Serialize)]
pub struct ServiceInfo {
    pub message: String,
    pub version: String,
    pub endpoints: Vec<&'static str>,
}

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Shipwatch detection API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints: vec![
            "/detect/image",
            "/detect/video",
            "/export/pdf",
            "/export/excel",
            "/ws/stream",
            "/health",
        ],
    })
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub detector: &'static str,
    pub confidence_threshold: f32,
    pub video: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub backend: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Readiness check endpoint (readiness probe).
///
/// The detector is loaded before the server binds, so only the video
/// decoding tools can be missing at this point. Image and stream detection
/// keep working without them, hence `degraded` rather than a failure.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let engine = state.engine.clone();
    let backend = engine.config().video_backend.to_string();

    let video = match tokio::task::spawn_blocking(move || engine.video_ready()).await {
        Ok(Ok(())) => CheckStatus {
            backend,
            status: "ok".to_string(),
            error: None,
        },
        Ok(Err(e)) => CheckStatus {
            backend,
            status: "error".to_string(),
            error: Some(e.to_string()),
        },
        Err(e) => CheckStatus {
            backend,
            status: "error".to_string(),
            error: Some(e.to_string()),
        },
    };

    let status = if video.status == "ok" { "ready" } else { "degraded" };

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: status.to_string(),
            detector: state.engine.detector_name(),
            confidence_threshold: state.engine.policy().confidence_threshold,
            video,
        }),
    )
}
