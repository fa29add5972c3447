//! Prometheus metrics for the API server.

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "shipwatch_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "shipwatch_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "shipwatch_http_requests_in_flight";

    // Stream metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "shipwatch_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "shipwatch_ws_connections_active";
    pub const WS_FRAMES_RECEIVED: &str = "shipwatch_ws_frames_received_total";

    // Detection metrics
    pub const DETECTIONS_PER_REQUEST: &str = "shipwatch_detections_per_request";
    pub const DETECTION_DURATION_SECONDS: &str = "shipwatch_detection_duration_seconds";
    pub const VIDEO_FRAMES_PROCESSED_TOTAL: &str = "shipwatch_video_frames_processed_total";

    // Report metrics
    pub const REPORTS_RENDERED_TOTAL: &str = "shipwatch_reports_rendered_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "shipwatch_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path).to_string()),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished detection call (`kind` is image, video or stream).
pub fn record_detection(kind: &str, detections: u64, duration_secs: f64) {
    let labels = [("kind", kind.to_string())];
    histogram!(names::DETECTIONS_PER_REQUEST, &labels).record(detections as f64);
    histogram!(names::DETECTION_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record sampled frames of one video analysis.
pub fn record_video_frames(frames: u64) {
    counter!(names::VIDEO_FRAMES_PROCESSED_TOTAL).increment(frames);
}

/// Record a report render attempt.
pub fn record_report(format: &str, success: bool) {
    let labels = [
        ("format", format.to_string()),
        ("status", if success { "ok" } else { "error" }.to_string()),
    ];
    counter!(names::REPORTS_RENDERED_TOTAL, &labels).increment(1);
}

/// Record WebSocket connection.
pub fn record_ws_connection(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_CONNECTIONS_TOTAL, &labels).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record an inbound stream frame.
pub fn record_ws_frame_received(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_FRAMES_RECEIVED, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint).to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

/// Routes served by the API; anything else is folded into one label.
const KNOWN_PATHS: &[&str] = &[
    "/",
    "/health",
    "/healthz",
    "/ready",
    "/metrics",
    "/detect",
    "/detect/image",
    "/detect/video",
    "/export/pdf",
    "/export/excel",
    "/ws/stream",
];

/// Sanitize path for metrics labels so unknown URLs cannot blow up cardinality.
fn sanitize_path(path: &str) -> &str {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    KNOWN_PATHS
        .iter()
        .find(|known| **known == trimmed)
        .copied()
        .unwrap_or("/:other")
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
