use serde::{Deserialize, Serialize};

/// Axis-aligned box in the pixel coordinates of the decoded frame.
///
/// Serialized as `[x1, y1, x2, y2]`, the shape the report renderers and the
/// web client consume.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    /// Left edge
    pub x1: f32,
    /// Top edge
    pub y1: f32,
    /// Right edge
    pub x2: f32,
    /// Bottom edge
    pub y2: f32,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Check that all coordinates are finite and the corners are ordered.
    pub fn is_valid(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2]
            .iter()
            .all(|v| v.is_finite())
            && self.x1 < self.x2
            && self.y1 < self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// A single normalized detection.
///
/// Produced fresh per frame by the detection normalizer and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Class label from the model's label table
    #[serde(rename = "class")]
    pub class_label: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Bounding box in frame pixel coordinates
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_label: impl Into<String>, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            class_label: class_label.into(),
            confidence,
            bbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_wire_shape() {
        let det = Detection::new("boat", 0.875, BoundingBox::new(10.0, 20.0, 110.5, 64.0));
        let json = serde_json::to_value(&det).unwrap();

        assert_eq!(json["class"], "boat");
        assert_eq!(json["bbox"], serde_json::json!([10.0, 20.0, 110.5, 64.0]));
        assert!((json["confidence"].as_f64().unwrap() - 0.875).abs() < 1e-6);
    }

    #[test]
    fn test_bbox_validity() {
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_valid());
        assert!(!BoundingBox::new(5.0, 0.0, 5.0, 1.0).is_valid());
        assert!(!BoundingBox::new(0.0, 3.0, 1.0, 2.0).is_valid());
        assert!(!BoundingBox::new(f32::NAN, 0.0, 1.0, 1.0).is_valid());
    }

    #[test]
    fn test_bbox_dimensions() {
        let b = BoundingBox::new(10.0, 10.0, 30.0, 15.0);
        assert_eq!(b.width(), 20.0);
        assert_eq!(b.height(), 5.0);
        assert_eq!(b.area(), 100.0);
    }
}
