//! Axum HTTP API server.
//!
//! This crate provides:
//! - Image and video detection endpoints
//! - PDF and XLSX export of detection results
//! - A live WebSocket detection stream
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
