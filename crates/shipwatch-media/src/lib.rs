//! Media processing for the detection backend.
//!
//! This crate provides:
//! - Still image decoding
//! - Video frame sources (FFmpeg pipe, optional OpenCV capture) and probing
//! - Frame sampling with a stride and a frame cap
//! - The object detector seam with a YOLOv8 ONNX backend
//! - Detection normalization against a `DetectionPolicy`
//! - Video aggregation and the `DetectionEngine` entry point

pub mod aggregator;
pub mod decode;
pub mod detection;
pub mod engine;
pub mod error;
pub mod frame;
pub mod probe;
pub mod sampler;
pub mod source;

pub use aggregator::{aggregate, AggregationState};
pub use decode::decode_image;
pub use detection::{
    decode_yolo_output, normalize, ObjectDetector, RawDetection, RawOutput, YoloDecodeParams,
    COCO_CLASSES,
};
#[cfg(feature = "onnx")]
pub use detection::{ObjectDetectorConfig, OnnxObjectDetector};
pub use engine::{DetectionEngine, EngineConfig};
pub use error::{MediaError, MediaResult};
pub use frame::{CancelFlag, FrameSample};
pub use probe::{probe_video, VideoInfo};
pub use sampler::{FrameSampler, SamplerStats, MAX_CONSECUTIVE_DECODE_FAILURES};
pub use source::{check_backend, open_video, FfmpegFrameSource, FrameSource, RawFrameReader, VideoBackend};
#[cfg(feature = "opencv")]
pub use source::OpenCvFrameSource;
