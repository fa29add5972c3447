//! Folding per-frame detection counts into video statistics.

use shipwatch_models::VideoResult;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::frame::{CancelFlag, FrameSample};

/// Running totals for one in-flight video analysis.
///
/// Owned by a single analysis call and consumed by `finalize`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationState {
    frames_processed: u64,
    frames_with_detections: u64,
    max_detections_per_frame: u64,
    total_detections_detected: u64,
}

impl AggregationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one evaluated frame's detection count into the totals.
    ///
    /// The maximum is taken over every processed frame, zero-detection
    /// frames included.
    pub fn accumulate(&mut self, detection_count: usize) {
        let count = detection_count as u64;
        self.frames_processed += 1;
        if count > 0 {
            self.frames_with_detections += 1;
            self.total_detections_detected += count;
        }
        self.max_detections_per_frame = self.max_detections_per_frame.max(count);
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn finalize(self) -> VideoResult {
        VideoResult::from_totals(
            self.frames_processed,
            self.frames_with_detections,
            self.max_detections_per_frame,
            self.total_detections_detected,
        )
    }
}

/// Evaluate every sample and aggregate the detection counts.
///
/// A frame whose evaluation fails with a frame-local error counts as a
/// zero-detection frame. Any other error, or a raised `cancel` flag, aborts
/// and the partial state is dropped.
pub fn aggregate<I, F>(samples: I, cancel: &CancelFlag, mut evaluate: F) -> MediaResult<VideoResult>
where
    I: IntoIterator<Item = FrameSample>,
    F: FnMut(&FrameSample) -> MediaResult<usize>,
{
    let mut state = AggregationState::new();
    let mut failed_frames = 0u64;
    let mut samples = samples.into_iter();

    loop {
        if cancel.is_cancelled() {
            debug!(
                frames_processed = state.frames_processed(),
                "Video analysis cancelled"
            );
            return Err(MediaError::Cancelled);
        }

        let Some(sample) = samples.next() else {
            break;
        };

        let count = match evaluate(&sample) {
            Ok(count) => count,
            Err(e) if e.is_frame_local() => {
                warn!(
                    frame_index = sample.frame_index,
                    error = %e,
                    "Frame evaluation failed, counting as zero detections"
                );
                failed_frames += 1;
                0
            }
            Err(e) => return Err(e),
        };

        state.accumulate(count);
    }

    debug!(
        frames_processed = state.frames_processed(),
        failed_frames, "Video aggregation complete"
    );

    Ok(state.finalize())
}
