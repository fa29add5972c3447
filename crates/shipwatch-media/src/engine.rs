//! The detection engine: one entry point per exposed operation.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use image::RgbImage;
use shipwatch_models::{DetectionPolicy, ImageResult, SamplingOptions, VideoResult};
use tracing::{debug, info, warn};

use crate::aggregator::aggregate;
use crate::decode::decode_image;
use crate::detection::{normalize, ObjectDetector};
use crate::error::{MediaError, MediaResult};
use crate::frame::CancelFlag;
use crate::probe::probe_video;
use crate::sampler::FrameSampler;
use crate::source::{check_backend, open_video, FrameSource, VideoBackend};

/// Engine settings that are not part of the detection policy.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Decoder used for uploaded videos
    pub video_backend: VideoBackend,
    /// Directory for temporary video files (system temp dir when unset)
    pub work_dir: Option<PathBuf>,
    /// Sampling used when a request does not specify its own
    pub default_sampling: SamplingOptions,
}

impl EngineConfig {
    /// Create config from environment variables.
    ///
    /// Reads `VIDEO_BACKEND`, `WORK_DIR`, `VIDEO_SAMPLE_RATE` and
    /// `VIDEO_MAX_FRAMES`; invalid values fall back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(backend) = std::env::var("VIDEO_BACKEND") {
            match backend.parse::<VideoBackend>() {
                Ok(b) => config.video_backend = b,
                Err(e) => warn!("{}, using {}", e, config.video_backend),
            }
        }

        config.work_dir = std::env::var("WORK_DIR")
            .ok()
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);

        let sample_rate = std::env::var("VIDEO_SAMPLE_RATE")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(SamplingOptions::DEFAULT_SAMPLE_RATE);
        let max_frames = std::env::var("VIDEO_MAX_FRAMES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(SamplingOptions::DEFAULT_MAX_FRAMES);

        match SamplingOptions::new(sample_rate, max_frames) {
            Ok(sampling) => config.default_sampling = sampling,
            Err(e) => warn!("Invalid video sampling settings: {}", e),
        }

        config
    }
}

/// Runs decoding, detection, normalization and aggregation.
///
/// Holds the process-wide detector handle; cheap to share behind an `Arc`.
pub struct DetectionEngine {
    detector: Arc<dyn ObjectDetector>,
    policy: DetectionPolicy,
    config: EngineConfig,
}

impl DetectionEngine {
    pub fn new(detector: Arc<dyn ObjectDetector>, policy: DetectionPolicy, config: EngineConfig) -> Self {
        info!(
            detector = detector.name(),
            confidence_threshold = policy.confidence_threshold,
            allowed_classes = ?policy.allowed_classes,
            video_backend = %config.video_backend,
            "Detection engine ready"
        );
        Self {
            detector,
            policy,
            config,
        }
    }

    pub fn detector_name(&self) -> &'static str {
        self.detector.name()
    }

    pub fn policy(&self) -> &DetectionPolicy {
        &self.policy
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether uploaded videos can be decoded with the configured backend.
    pub fn video_ready(&self) -> MediaResult<()> {
        check_backend(self.config.video_backend)
    }

    /// Detect objects in an encoded still image.
    pub fn detect_image(&self, bytes: &[u8]) -> MediaResult<ImageResult> {
        let frame = decode_image(bytes)?;
        self.detect_frame(&frame)
    }

    /// Detect objects in an already decoded frame.
    pub fn detect_frame(&self, frame: &RgbImage) -> MediaResult<ImageResult> {
        let raw = self
            .detector
            .predict(frame, self.policy.confidence_threshold)?;
        let detections = normalize(&raw, &self.policy)?;
        Ok(ImageResult::new(detections))
    }

    /// Detect objects in one frame of a live stream.
    pub fn stream_frame(&self, bytes: &[u8]) -> MediaResult<ImageResult> {
        self.detect_image(bytes)
    }

    /// Analyze an uploaded video.
    ///
    /// The payload is spooled to a temporary file that is removed on every
    /// exit path, after the frame source has been released.
    pub fn analyze_video(
        &self,
        bytes: &[u8],
        options: SamplingOptions,
        cancel: &CancelFlag,
    ) -> MediaResult<VideoResult> {
        if bytes.is_empty() {
            return Err(MediaError::unsupported_media("empty video payload"));
        }

        let mut builder = tempfile::Builder::new();
        builder.prefix("shipwatch-upload-").suffix(".video");
        let mut temp = match &self.config.work_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        temp.write_all(bytes)?;
        temp.flush()?;

        let info = probe_video(temp.path()).map_err(|e| match e {
            MediaError::FfprobeFailed { stderr, .. } => {
                debug!(stderr = ?stderr, "ffprobe rejected upload");
                MediaError::unsupported_media("payload is not a decodable video")
            }
            MediaError::JsonParse(_) => {
                MediaError::unsupported_media("payload is not a decodable video")
            }
            other => other,
        })?;

        info!(
            width = info.width,
            height = info.height,
            fps = info.fps,
            codec = %info.codec,
            sample_rate = options.sample_rate,
            max_frames = options.max_frames,
            "Analyzing video"
        );

        let source = open_video(temp.path(), &info, self.config.video_backend)?;
        self.analyze_source(source, options, cancel)
    }

    /// Sample and aggregate any frame source.
    ///
    /// The source is dropped before this returns, whatever the outcome.
    pub fn analyze_source<S: FrameSource>(
        &self,
        source: S,
        options: SamplingOptions,
        cancel: &CancelFlag,
    ) -> MediaResult<VideoResult> {
        let mut sampler = FrameSampler::new(source, options);
        let result = aggregate(sampler.by_ref(), cancel, |sample| {
            self.detect_frame(&sample.frame).map(|r| r.total_count())
        })?;
        if let Some(e) = sampler.take_failure() {
            return Err(e);
        }

        info!(
            frames_processed = result.frames_processed(),
            frames_with_detections = result.frames_with_detections(),
            total_detections = result.total_detections_detected(),
            "Video analysis complete"
        );

        Ok(result)
    }
}
