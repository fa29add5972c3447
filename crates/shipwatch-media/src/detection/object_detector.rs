//! Object detection using a YOLOv8 ONNX model.
//!
//! Uses ONNX Runtime with execution provider selection:
//! - CUDA on Linux with NVIDIA GPU (when the `cuda` feature is enabled)
//! - CPU fallback on all platforms

use std::path::Path;
use std::sync::{Arc, Mutex};

use image::imageops::FilterType;
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info, warn};

use super::backend::{ObjectDetector, RawOutput};
use super::yolo::{decode_yolo_output, YoloDecodeParams, COCO_CLASSES};
use crate::error::{MediaError, MediaResult};

/// Configuration for the ONNX object detector.
#[derive(Debug, Clone)]
pub struct ObjectDetectorConfig {
    /// Path to ONNX model file
    pub model_path: String,
    /// Label table, indexed by class id
    pub class_names: Vec<String>,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for ObjectDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: "models/yolov8n.onnx".to_string(),
            class_names: COCO_CLASSES.iter().map(|s| s.to_string()).collect(),
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

impl ObjectDetectorConfig {
    /// Create config from environment variables.
    ///
    /// Reads `MODEL_PATH`, `MODEL_CLASS_NAMES` (comma separated, defaults to
    /// the COCO table), `MODEL_INPUT_SIZE` and `NMS_THRESHOLD`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("MODEL_PATH") {
            if !path.trim().is_empty() {
                config.model_path = path;
            }
        }

        if let Ok(names) = std::env::var("MODEL_CLASS_NAMES") {
            let names: Vec<String> = names
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !names.is_empty() {
                config.class_names = names;
            }
        }

        if let Ok(size) = std::env::var("MODEL_INPUT_SIZE") {
            match size.parse::<u32>() {
                Ok(size) if size > 0 => config.input_size = size,
                _ => warn!("Invalid MODEL_INPUT_SIZE '{}', using {}", size, config.input_size),
            }
        }

        if let Ok(nms) = std::env::var("NMS_THRESHOLD") {
            match nms.parse::<f32>() {
                Ok(t) if (0.0..=1.0).contains(&t) => config.nms_threshold = t,
                _ => warn!("Invalid NMS_THRESHOLD '{}', using {}", nms, config.nms_threshold),
            }
        }

        config
    }
}

/// YOLOv8 detector backed by an ONNX Runtime session.
///
/// The session is guarded by a mutex, so concurrent requests run inference
/// one at a time.
pub struct OnnxObjectDetector {
    session: Mutex<Session>,
    class_names: Arc<Vec<String>>,
    config: ObjectDetectorConfig,
}

impl OnnxObjectDetector {
    /// Load the model named by `config`.
    ///
    /// Returns error if the model file doesn't exist or cannot be loaded.
    pub fn new(config: ObjectDetectorConfig) -> MediaResult<Self> {
        let model_path = Path::new(&config.model_path);
        if !model_path.exists() {
            return Err(MediaError::model_not_found(&config.model_path));
        }

        let session = Mutex::new(create_session(model_path)?);
        info!(
            model_path = %config.model_path,
            input_size = config.input_size,
            classes = config.class_names.len(),
            "Object detector initialized"
        );

        Ok(Self {
            session,
            class_names: Arc::new(config.class_names.clone()),
            config,
        })
    }

    pub fn config(&self) -> &ObjectDetectorConfig {
        &self.config
    }

    /// Stretch-resize to the model input and lay out as NCHW in [0, 1].
    fn preprocess(&self, frame: &RgbImage) -> MediaResult<Value> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(frame, size, size, FilterType::Triangle);

        let plane = (size * size) as usize;
        let mut chw = vec![0.0f32; 3 * plane];
        for (i, pixel) in resized.pixels().enumerate() {
            for c in 0..3 {
                chw[c * plane + i] = f32::from(pixel[c]) / 255.0;
            }
        }

        let shape = vec![1usize, 3, size as usize, size as usize];
        Tensor::from_array((shape, chw.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::inference(format!("Failed to create tensor: {}", e)))
    }

    /// Run inference, returning the raw output buffer and its shape.
    fn run_inference(&self, input: Value) -> MediaResult<(Vec<f32>, Vec<usize>)> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::inference(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_format("Missing output0 tensor"))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_format(format!("Failed to extract tensor: {}", e)))?;

        let dims = shape.iter().map(|&d| d.max(0) as usize).collect();
        Ok((data.to_vec(), dims))
    }
}

impl ObjectDetector for OnnxObjectDetector {
    fn name(&self) -> &'static str {
        "yolov8-onnx"
    }

    fn predict(&self, frame: &RgbImage, confidence_threshold: f32) -> MediaResult<RawOutput> {
        let (width, height) = frame.dimensions();

        let input = self.preprocess(frame)?;
        let (data, shape) = self.run_inference(input)?;

        let params = YoloDecodeParams {
            num_classes: self.class_names.len(),
            input_size: self.config.input_size,
            frame_width: width,
            frame_height: height,
            confidence_threshold,
            nms_threshold: self.config.nms_threshold,
        };
        let detections = decode_yolo_output(&data, &shape, &params)?;

        debug!(count = detections.len(), width, height, "Object detection completed");

        Ok(RawOutput::new(detections, Arc::clone(&self.class_names)))
    }
}

/// Create ONNX Runtime session with execution provider selection.
fn create_session(model_path: &Path) -> MediaResult<Session> {
    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("Failed to read model file: {}", e)))?;

    let builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!("Using CUDA execution provider for object detection");
                return Ok(session);
            }
        }
        debug!("CUDA execution provider not available, using CPU");
    }

    info!("Using CPU execution provider for object detection");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}
