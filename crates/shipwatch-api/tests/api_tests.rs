//! API integration tests.

use std::io::Cursor;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use image::{ImageOutputFormat, Rgb, RgbImage};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{json, Value};
use tower::ServiceExt;

use shipwatch_api::{create_router, ApiConfig, AppState};
use shipwatch_media::{
    DetectionEngine, EngineConfig, MediaResult, ObjectDetector, RawDetection, RawOutput,
};
use shipwatch_models::DetectionPolicy;

const BOUNDARY: &str = "shipwatch-test-boundary";

/// Two confident detections and one below the default threshold.
struct HarborDetector;

impl ObjectDetector for HarborDetector {
    fn name(&self) -> &'static str {
        "harbor-fake"
    }

    fn predict(&self, _frame: &RgbImage, _threshold: f32) -> MediaResult<RawOutput> {
        Ok(RawOutput::new(
            vec![
                RawDetection::new(0, 0.91, [10.0, 12.0, 40.0, 30.0]),
                RawDetection::new(1, 0.2, [0.0, 0.0, 5.0, 5.0]),
                RawDetection::new(0, 0.66, [50.0, 8.0, 60.0, 20.0]),
            ],
            Arc::new(vec!["boat".to_string(), "person".to_string()]),
        ))
    }
}

fn test_router(config: ApiConfig) -> Router {
    let engine = DetectionEngine::new(
        Arc::new(HarborDetector),
        DetectionPolicy::default(),
        EngineConfig::default(),
    );
    create_router(AppState::new(config, engine), None)
}

fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(64, 48, Rgb([20, 60, 120]));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageOutputFormat::Png)
        .unwrap();
    buf
}

fn multipart_request(uri: &str, field: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.bin\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, value: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(value.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Test health endpoint.
#[tokio::test]
async fn test_health_endpoint() {
    let app = test_router(ApiConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_root_lists_endpoints() {
    let app = test_router(ApiConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let endpoints = body["endpoints"].as_array().unwrap();
    assert!(endpoints.contains(&json!("/detect/image")));
}

#[tokio::test]
async fn test_ready_reports_detector() {
    let app = test_router(ApiConfig::default());

    let response = app
        .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["detector"], "harbor-fake");
    assert_eq!(body["video"]["backend"], "ffmpeg");
}

#[tokio::test]
async fn test_detect_image() {
    let app = test_router(ApiConfig::default());

    let response = app
        .oneshot(multipart_request(
            "/detect/image",
            "file",
            "image/png",
            &png_bytes(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert!(body["processing_time"].as_f64().unwrap() >= 0.0);

    let results = &body["results"];
    assert_eq!(results["total_count"], 2);
    assert_eq!(results["has_detections"], true);
    // Model order is preserved
    assert_eq!(results["detections"][0]["class"], "boat");
    assert_eq!(results["detections"][0]["bbox"], json!([10.0, 12.0, 40.0, 30.0]));
    assert_eq!(results["detections"][1]["bbox"], json!([50.0, 8.0, 60.0, 20.0]));
}

#[tokio::test]
async fn test_detect_alias_route() {
    let app = test_router(ApiConfig::default());

    let response = app
        .oneshot(multipart_request("/detect", "file", "image/png", &png_bytes()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_detect_image_rejects_non_image_type() {
    let app = test_router(ApiConfig::default());

    let response = app
        .oneshot(multipart_request(
            "/detect/image",
            "file",
            "text/plain",
            b"hello",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "unsupported_media");
}

#[tokio::test]
async fn test_detect_image_undecodable_payload() {
    let app = test_router(ApiConfig::default());

    // Claims to be an image but is not any known format
    let response = app
        .clone()
        .oneshot(multipart_request(
            "/detect/image",
            "file",
            "image/png",
            b"plain text pretending",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);

    // A PNG signature with a truncated body
    let mut truncated = png_bytes();
    truncated.truncate(40);
    let response = app
        .oneshot(multipart_request(
            "/detect/image",
            "file",
            "image/png",
            &truncated,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["code"], "decode_error");
}

#[tokio::test]
async fn test_detect_image_missing_file_field() {
    let app = test_router(ApiConfig::default());

    let response = app
        .oneshot(multipart_request(
            "/detect/image",
            "attachment",
            "image/png",
            &png_bytes(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "bad_request");
}

#[tokio::test]
async fn test_detect_video_validates_query() {
    let app = test_router(ApiConfig::default());

    let response = app
        .clone()
        .oneshot(multipart_request(
            "/detect/video?sample_rate=0",
            "file",
            "video/mp4",
            b"\x00\x00\x00\x18ftypmp42",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "validation_error");

    let response = app
        .oneshot(multipart_request(
            "/detect/video?max_frames=abc",
            "file",
            "video/mp4",
            b"\x00\x00\x00\x18ftypmp42",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_detect_video_rejects_image_upload() {
    let app = test_router(ApiConfig::default());

    let response = app
        .oneshot(multipart_request(
            "/detect/video",
            "file",
            "image/png",
            &png_bytes(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_export_pdf() {
    let app = test_router(ApiConfig::default());

    let payload = json!({
        "results": {
            "detections": [{"class": "boat", "confidence": 0.91, "bbox": [10, 12, 40, 30]}],
            "total_count": 1,
            "has_detections": true
        },
        "processing_time": 0.123
    });
    let response = app
        .oneshot(json_request("/export/pdf", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.ends_with(".pdf\""));

    let bytes = body_bytes(response).await;
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_export_excel_video_result() {
    let app = test_router(ApiConfig::default());

    let payload = json!({
        "results": {
            "processing_time": 3.5,
            "frames_processed": 10,
            "frames_with_detections": 4,
            "max_detections_per_frame": 3,
            "total_detections_detected": 7,
            "avg_detections_per_frame": 0.7,
            "has_detections": true
        }
    });
    let response = app
        .oneshot(json_request("/export/excel", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    );
    let bytes = body_bytes(response).await;
    assert!(bytes.starts_with(b"PK"));
}

#[tokio::test]
async fn test_export_without_processing_time_fails() {
    let app = test_router(ApiConfig::default());

    let payload = json!({"results": {"detections": [], "total_count": 0}});
    let response = app
        .oneshot(json_request("/export/excel", &payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "report_generation");
    assert!(body["detail"].as_str().unwrap().starts_with("spreadsheet"));
}

#[tokio::test]
async fn test_export_rejects_malformed_json() {
    let app = test_router(ApiConfig::default());

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/export/pdf")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Test rate limiting.
#[tokio::test]
async fn test_rate_limiting() {
    let app = test_router(ApiConfig {
        rate_limit_rps: 1,
        ..ApiConfig::default()
    });

    let payload = json!({"results": {"processing_time": 0.1}});
    let request = || {
        let mut req = json_request("/export/pdf", &payload);
        req.headers_mut()
            .insert("X-Forwarded-For", "192.168.1.100".parse().unwrap());
        req
    };

    let first = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(second.headers().get(header::RETRY_AFTER).unwrap(), "1");

    // Health checks are never limited
    let health = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Forwarded-For", "192.168.1.100")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(health.status(), StatusCode::OK);
}

/// Test metrics endpoint (when enabled).
#[tokio::test]
async fn test_metrics_endpoint() {
    let engine = DetectionEngine::new(
        Arc::new(HarborDetector),
        DetectionPolicy::default(),
        EngineConfig::default(),
    );
    // Render from a recorder that is not installed globally
    let handle = PrometheusBuilder::new().build_recorder().handle();
    let app = create_router(AppState::new(ApiConfig::default(), engine), Some(handle));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let disabled = test_router(ApiConfig::default());
    let response = disabled
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
