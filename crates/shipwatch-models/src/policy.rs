//! Detection policy and video sampling options.
//!
//! The policy unifies the confidence threshold and the optional class
//! restriction into one value that is passed explicitly to the detection
//! normalizer instead of being fixed per detector.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when policy or sampling values are out of range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("confidence threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f32),

    #[error("sample rate must be at least 1")]
    InvalidSampleRate,
}

/// Which raw detections survive normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionPolicy {
    /// Detections must score strictly above this value
    pub confidence_threshold: f32,
    /// Optional allow-set of class labels; `None` lets every class through
    #[serde(default)]
    pub allowed_classes: Option<BTreeSet<String>>,
}

impl Default for DetectionPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: Self::DEFAULT_CONFIDENCE_THRESHOLD,
            allowed_classes: None,
        }
    }
}

impl DetectionPolicy {
    pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.35;

    /// Create a policy with the given threshold and no class restriction.
    pub fn new(confidence_threshold: f32) -> Result<Self, PolicyError> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(PolicyError::InvalidThreshold(confidence_threshold));
        }
        Ok(Self {
            confidence_threshold,
            allowed_classes: None,
        })
    }

    /// Restrict detections to the given class labels.
    ///
    /// An empty set is treated as "no restriction".
    pub fn with_allowed_classes<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set: BTreeSet<String> = classes
            .into_iter()
            .map(|s| {
                let s: String = s.into();
                s.trim().to_string()
            })
            .filter(|s| !s.is_empty())
            .collect();
        self.allowed_classes = if set.is_empty() { None } else { Some(set) };
        self
    }

    /// Whether a detection with this label and confidence passes the policy.
    pub fn accepts(&self, class_label: &str, confidence: f32) -> bool {
        confidence > self.confidence_threshold && self.allows_class(class_label)
    }

    /// Whether the class restriction (if any) admits this label.
    pub fn allows_class(&self, class_label: &str) -> bool {
        self.allowed_classes
            .as_ref()
            .map_or(true, |allowed| allowed.contains(class_label))
    }

    /// Create policy from environment variables.
    ///
    /// `CONFIDENCE_THRESHOLD` (default 0.35) and `ALLOWED_CLASSES`
    /// (comma separated labels, unset or empty for no restriction).
    pub fn from_env() -> Self {
        let threshold = std::env::var("CONFIDENCE_THRESHOLD")
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .filter(|t| (0.0..=1.0).contains(t))
            .unwrap_or(Self::DEFAULT_CONFIDENCE_THRESHOLD);

        let classes = std::env::var("ALLOWED_CLASSES").unwrap_or_default();

        Self {
            confidence_threshold: threshold,
            allowed_classes: None,
        }
        .with_allowed_classes(classes.split(','))
    }
}

/// How frames are picked from a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingOptions {
    /// Keep every N-th frame (1 = every frame)
    pub sample_rate: u32,
    /// Stop after this many retained frames
    pub max_frames: u32,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            sample_rate: Self::DEFAULT_SAMPLE_RATE,
            max_frames: Self::DEFAULT_MAX_FRAMES,
        }
    }
}

impl SamplingOptions {
    pub const DEFAULT_SAMPLE_RATE: u32 = 5;
    pub const DEFAULT_MAX_FRAMES: u32 = 300;

    pub fn new(sample_rate: u32, max_frames: u32) -> Result<Self, PolicyError> {
        if sample_rate == 0 {
            return Err(PolicyError::InvalidSampleRate);
        }
        Ok(Self {
            sample_rate,
            max_frames,
        })
    }

    /// Whether the 1-based frame index is kept for processing.
    pub fn retains(&self, frame_index: u64) -> bool {
        self.sample_rate > 0 && frame_index % u64::from(self.sample_rate) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_default() {
        let policy = DetectionPolicy::default();
        assert!((policy.confidence_threshold - 0.35).abs() < f32::EPSILON);
        assert!(policy.allowed_classes.is_none());
    }

    #[test]
    fn test_policy_threshold_is_strict() {
        let policy = DetectionPolicy::new(0.5).unwrap();
        assert!(!policy.accepts("boat", 0.5));
        assert!(policy.accepts("boat", 0.5001));
    }

    #[test]
    fn test_policy_rejects_out_of_range_threshold() {
        assert_eq!(
            DetectionPolicy::new(1.5),
            Err(PolicyError::InvalidThreshold(1.5))
        );
    }

    #[test]
    fn test_policy_class_restriction() {
        let policy = DetectionPolicy::default().with_allowed_classes(["boat", " ship "]);
        assert!(policy.accepts("ship", 0.9));
        assert!(policy.accepts("boat", 0.9));
        assert!(!policy.accepts("car", 0.9));
    }

    #[test]
    fn test_policy_empty_restriction_means_all() {
        let policy = DetectionPolicy::default().with_allowed_classes(["", "  "]);
        assert!(policy.allowed_classes.is_none());
        assert!(policy.accepts("car", 0.9));
    }

    #[test]
    fn test_sampling_retains_multiples() {
        let opts = SamplingOptions::new(5, 300).unwrap();
        assert!(!opts.retains(1));
        assert!(!opts.retains(4));
        assert!(opts.retains(5));
        assert!(opts.retains(10));

        let every = SamplingOptions::new(1, 3).unwrap();
        assert!(every.retains(1));
        assert!(every.retains(2));
    }

    #[test]
    fn test_sampling_rejects_zero_rate() {
        assert_eq!(
            SamplingOptions::new(0, 10),
            Err(PolicyError::InvalidSampleRate)
        );
    }
}
