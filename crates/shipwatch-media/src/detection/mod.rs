//! Object detection.
//!
//! | Piece | Role |
//! |-------|------|
//! | `ObjectDetector` | model seam, returns raw class ids and boxes |
//! | `yolo` | pure decoding of a YOLOv8 output tensor |
//! | `OnnxObjectDetector` | ONNX Runtime backend (feature `onnx`) |
//! | `normalize` | policy filtering into `Detection` values |

pub mod backend;
pub mod normalizer;
#[cfg(feature = "onnx")]
pub mod object_detector;
pub mod yolo;

pub use backend::{ObjectDetector, RawDetection, RawOutput};
pub use normalizer::normalize;
#[cfg(feature = "onnx")]
pub use object_detector::{ObjectDetectorConfig, OnnxObjectDetector};
pub use yolo::{decode_yolo_output, YoloDecodeParams, COCO_CLASSES};
