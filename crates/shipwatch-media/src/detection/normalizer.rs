//! Conversion of raw model output into policy-filtered detections.

use shipwatch_models::{BoundingBox, Detection, DetectionPolicy};

use super::backend::{RawDetection, RawOutput};
use crate::error::{MediaError, MediaResult};

/// Turn a frame's raw output into the detections that pass `policy`.
///
/// Every record is validated before any filtering; one malformed record
/// fails the whole frame. Survivors keep the model's emission order.
pub fn normalize(raw: &RawOutput, policy: &DetectionPolicy) -> MediaResult<Vec<Detection>> {
    let mut detections = Vec::with_capacity(raw.detections.len());

    for (idx, record) in raw.detections.iter().enumerate() {
        let label = validate(raw, record)
            .map_err(|reason| MediaError::detection_format(format!("record {}: {}", idx, reason)))?;

        if policy.accepts(label, record.confidence) {
            let [x1, y1, x2, y2] = record.bbox;
            detections.push(Detection::new(
                label,
                record.confidence,
                BoundingBox::new(x1, y1, x2, y2),
            ));
        }
    }

    Ok(detections)
}

fn validate<'a>(raw: &'a RawOutput, record: &RawDetection) -> Result<&'a str, String> {
    if !record.confidence.is_finite() || !(0.0..=1.0).contains(&record.confidence) {
        return Err(format!("confidence {} outside [0, 1]", record.confidence));
    }

    let bbox = BoundingBox::from(record.bbox);
    if !bbox.is_valid() {
        return Err(format!("invalid box {:?}", record.bbox));
    }

    raw.class_name(record.class_id).ok_or_else(|| {
        format!(
            "class id {} outside label table of {}",
            record.class_id,
            raw.class_names.len()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn labels() -> Arc<Vec<String>> {
        Arc::new(vec![
            "person".to_string(),
            "boat".to_string(),
            "ship".to_string(),
        ])
    }

    fn output(records: Vec<RawDetection>) -> RawOutput {
        RawOutput::new(records, labels())
    }

    #[test]
    fn test_threshold_is_strict_and_order_kept() {
        let raw = output(vec![
            RawDetection::new(2, 0.9, [0.0, 0.0, 10.0, 10.0]),
            RawDetection::new(1, 0.35, [1.0, 1.0, 5.0, 5.0]),
            RawDetection::new(1, 0.36, [2.0, 2.0, 6.0, 6.0]),
        ]);

        let dets = normalize(&raw, &DetectionPolicy::default()).unwrap();

        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class_label, "ship");
        assert_eq!(dets[1].class_label, "boat");
        assert_eq!(dets[1].bbox, BoundingBox::new(2.0, 2.0, 6.0, 6.0));
    }

    #[test]
    fn test_allowed_classes_filter() {
        let raw = output(vec![
            RawDetection::new(0, 0.9, [0.0, 0.0, 10.0, 10.0]),
            RawDetection::new(1, 0.9, [0.0, 0.0, 10.0, 10.0]),
        ]);
        let policy = DetectionPolicy::default().with_allowed_classes(["boat"]);

        let dets = normalize(&raw, &policy).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class_label, "boat");
    }

    #[test]
    fn test_empty_output() {
        let dets = normalize(&output(vec![]), &DetectionPolicy::default()).unwrap();
        assert!(dets.is_empty());
    }

    #[test]
    fn test_malformed_records_fail_frame() {
        let policy = DetectionPolicy::default();

        let unknown_class = output(vec![RawDetection::new(7, 0.9, [0.0, 0.0, 1.0, 1.0])]);
        assert!(matches!(
            normalize(&unknown_class, &policy),
            Err(MediaError::DetectionFormat(_))
        ));

        let inverted = output(vec![RawDetection::new(1, 0.9, [5.0, 0.0, 1.0, 1.0])]);
        assert!(matches!(
            normalize(&inverted, &policy),
            Err(MediaError::DetectionFormat(_))
        ));

        let bad_conf = output(vec![RawDetection::new(1, f32::NAN, [0.0, 0.0, 1.0, 1.0])]);
        assert!(matches!(
            normalize(&bad_conf, &policy),
            Err(MediaError::DetectionFormat(_))
        ));
    }

    #[test]
    fn test_malformed_record_below_threshold_still_fails() {
        let raw = output(vec![
            RawDetection::new(1, 0.9, [0.0, 0.0, 10.0, 10.0]),
            RawDetection::new(1, 0.1, [0.0, 0.0, f32::INFINITY, 10.0]),
        ]);
        assert!(normalize(&raw, &DetectionPolicy::default()).is_err());
    }
}
