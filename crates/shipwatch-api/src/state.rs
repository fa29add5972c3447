//! Application state.

use std::sync::Arc;

use shipwatch_media::DetectionEngine;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    /// Process-wide engine; the loaded model is shared by every request
    pub engine: Arc<DetectionEngine>,
}

impl AppState {
    pub fn new(config: ApiConfig, engine: DetectionEngine) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
        }
    }
}
