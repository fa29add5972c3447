//! Live detection stream over WebSocket.
//!
//! Each binary message is one encoded frame. Frames are handled strictly in
//! order: the next message is not read until the reply for the current one
//! has been sent. Anything unexpected closes the stream without an error
//! message.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use shipwatch_media::DetectionEngine;
use shipwatch_models::StreamReply;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::state::AppState;

const STREAM_ENDPOINT: &str = "stream";

/// Close the stream after this long without an inbound frame.
const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

/// Upgrade to the live detection stream.
pub async fn ws_stream(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    metrics::record_ws_connection(STREAM_ENDPOINT);

    ws.on_upgrade(|socket| async move {
        let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_ws_active_connections(count);

        let frames = handle_stream(socket, state.engine).await;

        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
        info!(frames, "Stream closed");
    })
}

/// Serve one stream connection; returns the number of frames answered.
async fn handle_stream(mut socket: WebSocket, engine: Arc<DetectionEngine>) -> u64 {
    let mut answered = 0u64;

    loop {
        let message = match tokio::time::timeout(IDLE_TIMEOUT, socket.recv()).await {
            Ok(Some(Ok(message))) => message,
            Ok(Some(Err(e))) => {
                debug!(error = %e, "Stream receive failed");
                break;
            }
            Ok(None) => break,
            Err(_) => {
                debug!("Stream idle, closing");
                break;
            }
        };

        let bytes = match message {
            Message::Binary(bytes) => bytes,
            // Handled by the protocol layer
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => break,
            Message::Text(_) => {
                debug!("Non-binary stream message, closing");
                break;
            }
        };

        metrics::record_ws_frame_received(STREAM_ENDPOINT);

        let Some(reply) = answer_frame(Arc::clone(&engine), bytes).await else {
            break;
        };

        if socket.send(Message::Text(reply)).await.is_err() {
            break;
        }
        answered += 1;
    }

    let _ = socket.send(Message::Close(None)).await;
    answered
}

/// Detect on one frame and serialize the reply; `None` ends the stream.
async fn answer_frame(engine: Arc<DetectionEngine>, bytes: Vec<u8>) -> Option<String> {
    let started = Instant::now();

    let result = match tokio::task::spawn_blocking(move || engine.stream_frame(&bytes)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            debug!(error = %e, "Stream frame rejected");
            return None;
        }
        Err(e) => {
            warn!(error = %e, "Stream detection task failed");
            return None;
        }
    };

    let elapsed = started.elapsed().as_secs_f64();
    metrics::record_detection("stream", result.total_count() as u64, elapsed);

    match serde_json::to_string(&StreamReply::new(result, elapsed)) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!(error = %e, "Failed to serialize stream reply");
            None
        }
    }
}
