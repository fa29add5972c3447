//! Shared data models for the shipwatch backend.
//!
//! This crate provides Serde-serializable types for:
//! - Per-frame detections and bounding boxes
//! - Image and video analysis results
//! - Detection policy and video sampling options
//! - Live stream reply messages

pub mod detection;
pub mod policy;
pub mod result;
pub mod stream;

// Re-export common types
pub use detection::{BoundingBox, Detection};
pub use policy::{DetectionPolicy, PolicyError, SamplingOptions};
pub use result::{ImageResult, VideoResult};
pub use stream::StreamReply;
