//! YOLOv8 output tensor decoding.
//!
//! YOLOv8 exports produce `[1, 4 + C, N]`: for each of the `N` candidates
//! a center-format box `(cx, cy, w, h)` in model input pixels followed by
//! `C` class scores.

use ndarray::ArrayView2;

use super::backend::RawDetection;
use crate::error::{MediaError, MediaResult};

/// COCO class names (80 classes).
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic light", "fire hydrant", "stop sign", "parking meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports ball", "kite", "baseball bat", "baseball glove",
    "skateboard", "surfboard", "tennis racket", "bottle", "wine glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot dog", "pizza", "donut", "cake", "chair", "couch",
    "potted plant", "bed", "dining table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier",
    "toothbrush",
];

/// Parameters for mapping a YOLO tensor back onto a source frame.
#[derive(Debug, Clone, Copy)]
pub struct YoloDecodeParams {
    /// Number of classes the model was trained on
    pub num_classes: usize,
    /// Square model input edge in pixels
    pub input_size: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Candidates scoring at or below this are dropped before NMS
    pub confidence_threshold: f32,
    /// IoU above which a weaker box of the same class is suppressed
    pub nms_threshold: f32,
}

/// Decode a raw YOLOv8 tensor into corner boxes in frame pixels.
///
/// Fails with a detection format error when the tensor shape does not match
/// `[1, 4 + num_classes, N]`.
pub fn decode_yolo_output(
    data: &[f32],
    shape: &[usize],
    params: &YoloDecodeParams,
) -> MediaResult<Vec<RawDetection>> {
    let num_features = 4 + params.num_classes;

    let num_boxes = match shape {
        [1, features, boxes] if *features == num_features => *boxes,
        _ => {
            return Err(MediaError::detection_format(format!(
                "expected output shape [1, {}, N], got {:?}",
                num_features, shape
            )))
        }
    };

    if data.len() != num_features * num_boxes {
        return Err(MediaError::detection_format(format!(
            "output holds {} values, shape {:?} needs {}",
            data.len(),
            shape,
            num_features * num_boxes
        )));
    }

    let output = ArrayView2::from_shape((num_features, num_boxes), data)
        .map_err(|e| MediaError::detection_format(format!("failed to reshape output: {}", e)))?;
    // [N, 4 + C]
    let candidates_view = output.t();

    let input_size = params.input_size as f32;
    let frame_w = params.frame_width as f32;
    let frame_h = params.frame_height as f32;
    let scale_w = frame_w / input_size;
    let scale_h = frame_h / input_size;

    let mut candidates = Vec::new();

    for row in candidates_view.outer_iter() {
        let (best_class, best_score) = row
            .iter()
            .skip(4)
            .copied()
            .enumerate()
            .fold((0usize, f32::MIN), |best, (c, score)| {
                if score > best.1 {
                    (c, score)
                } else {
                    best
                }
            });

        if best_score <= params.confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);

        let x1 = ((cx - w / 2.0) * scale_w).clamp(0.0, frame_w);
        let y1 = ((cy - h / 2.0) * scale_h).clamp(0.0, frame_h);
        let x2 = ((cx + w / 2.0) * scale_w).clamp(0.0, frame_w);
        let y2 = ((cy + h / 2.0) * scale_h).clamp(0.0, frame_h);

        // Boxes that collapse after clipping to the frame carry no area
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        candidates.push(RawDetection::new(best_class, best_score, [x1, y1, x2, y2]));
    }

    Ok(non_maximum_suppression(candidates, params.nms_threshold))
}

/// Per-class non-maximum suppression, strongest first.
fn non_maximum_suppression(mut detections: Vec<RawDetection>, iou_threshold: f32) -> Vec<RawDetection> {
    if detections.is_empty() {
        return detections;
    }

    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; detections.len()];

    for i in 0..detections.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(detections[i].clone());

        for j in (i + 1)..detections.len() {
            if suppressed[j] || detections[i].class_id != detections[j].class_id {
                continue;
            }

            if compute_iou(&detections[i].bbox, &detections[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

fn compute_iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let intersection = inter_w * inter_h;

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
