//! Strided, capped frame sampling over a `FrameSource`.

use std::iter::FusedIterator;

use shipwatch_models::SamplingOptions;
use tracing::{debug, warn};

use crate::error::MediaError;
use crate::frame::FrameSample;
use crate::source::FrameSource;

/// Consecutive decode failures after which a source is treated as exhausted.
pub const MAX_CONSECUTIVE_DECODE_FAILURES: u32 = 32;

/// Counters describing one sampling run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    /// Frames consumed from the source, retained or not
    pub frames_read: u64,
    /// Frames handed out to the caller
    pub frames_sampled: u64,
    /// Frames skipped because they failed to decode
    pub decode_errors: u64,
}

/// Lazily yields every `sample_rate`-th frame until the source ends or
/// `max_frames` frames have been yielded.
///
/// Frame indices start at 1. The sampler owns its source; dropping the
/// sampler releases the decoder. Once it returns `None` it stays exhausted.
///
/// A source failure that is not local to one frame also ends iteration;
/// callers must check `take_failure` to tell it apart from end of stream.
pub struct FrameSampler<S> {
    source: S,
    options: SamplingOptions,
    position: u64,
    consecutive_failures: u32,
    done: bool,
    failure: Option<MediaError>,
    stats: SamplerStats,
}

impl<S: FrameSource> FrameSampler<S> {
    pub fn new(source: S, options: SamplingOptions) -> Self {
        Self {
            source,
            options,
            position: 0,
            consecutive_failures: 0,
            done: false,
            failure: None,
            stats: SamplerStats::default(),
        }
    }

    pub fn stats(&self) -> SamplerStats {
        self.stats
    }

    /// The error that stopped iteration early, if the source failed.
    pub fn take_failure(&mut self) -> Option<MediaError> {
        self.failure.take()
    }

    /// Record a failed read at `index`. Returns `false` when iteration must stop.
    fn on_error(&mut self, index: u64, err: MediaError) -> bool {
        if !err.is_frame_local() {
            warn!(frame_index = index, error = %err, "Video source failed");
            self.failure = Some(match err {
                e @ MediaError::SourceUnavailable(_) => e,
                other => MediaError::source_unavailable(format!(
                    "video source failed at frame {}: {}",
                    index, other
                )),
            });
            return false;
        }

        self.position = index;
        self.stats.frames_read += 1;
        self.stats.decode_errors += 1;
        self.consecutive_failures += 1;

        if self.consecutive_failures >= MAX_CONSECUTIVE_DECODE_FAILURES {
            warn!(
                frame_index = index,
                failures = self.consecutive_failures,
                "Too many consecutive undecodable frames, ending stream"
            );
            return false;
        }

        debug!(frame_index = index, error = %err, "Skipping undecodable frame");
        true
    }

    fn finish(&mut self) -> Option<FrameSample> {
        if !self.done {
            self.done = true;
            debug!(
                frames_read = self.stats.frames_read,
                frames_sampled = self.stats.frames_sampled,
                decode_errors = self.stats.decode_errors,
                "Frame sampling finished"
            );
        }
        None
    }
}

impl<S: FrameSource> Iterator for FrameSampler<S> {
    type Item = FrameSample;

    fn next(&mut self) -> Option<FrameSample> {
        loop {
            if self.done || self.stats.frames_sampled >= u64::from(self.options.max_frames) {
                return self.finish();
            }

            let index = self.position + 1;

            if self.options.retains(index) {
                match self.source.read_next_frame() {
                    Ok(Some(frame)) => {
                        self.position = index;
                        self.consecutive_failures = 0;
                        self.stats.frames_read += 1;
                        self.stats.frames_sampled += 1;
                        return Some(FrameSample {
                            frame_index: index,
                            frame,
                        });
                    }
                    Ok(None) => return self.finish(),
                    Err(e) => {
                        if !self.on_error(index, e) {
                            return self.finish();
                        }
                    }
                }
            } else {
                match self.source.skip_frame() {
                    Ok(true) => {
                        self.position = index;
                        self.consecutive_failures = 0;
                        self.stats.frames_read += 1;
                    }
                    Ok(false) => return self.finish(),
                    Err(e) => {
                        if !self.on_error(index, e) {
                            return self.finish();
                        }
                    }
                }
            }
        }
    }
}

impl<S: FrameSource> FusedIterator for FrameSampler<S> {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::MediaResult;
    use image::{Rgb, RgbImage};
    use std::collections::HashSet;

    /// In-memory source of `total` tiny frames; listed indices fail to decode.
    pub(crate) struct SyntheticSource {
        total: u64,
        position: u64,
        failing: HashSet<u64>,
        dies_after: Option<u64>,
        pub(crate) reads: u64,
    }

    impl SyntheticSource {
        pub(crate) fn new(total: u64) -> Self {
            Self {
                total,
                position: 0,
                failing: HashSet::new(),
                dies_after: None,
                reads: 0,
            }
        }

        /// The decoder breaks down after `frames` frames.
        pub(crate) fn dying_after(mut self, frames: u64) -> Self {
            self.dies_after = Some(frames);
            self
        }

        pub(crate) fn failing_at(mut self, indices: impl IntoIterator<Item = u64>) -> Self {
            self.failing.extend(indices);
            self
        }
    }

    impl FrameSource for SyntheticSource {
        fn read_next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
            self.reads += 1;
            if self.dies_after == Some(self.position) {
                return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
            }
            if self.position >= self.total {
                return Ok(None);
            }
            self.position += 1;
            if self.failing.contains(&self.position) {
                return Err(MediaError::decode(format!("frame {} corrupt", self.position)));
            }
            let shade = (self.position % 256) as u8;
            Ok(Some(RgbImage::from_pixel(2, 2, Rgb([shade, shade, shade]))))
        }
    }

    fn opts(sample_rate: u32, max_frames: u32) -> SamplingOptions {
        SamplingOptions::new(sample_rate, max_frames).unwrap()
    }

    #[test]
    fn test_stride_and_cap() {
        let mut sampler = FrameSampler::new(SyntheticSource::new(1000), opts(5, 300));
        let indices: Vec<u64> = sampler.by_ref().map(|s| s.frame_index).collect();

        assert_eq!(indices.len(), 200);
        assert_eq!(indices.first(), Some(&5));
        assert_eq!(indices.last(), Some(&1000));
        assert!(indices.iter().all(|i| i % 5 == 0));
        // one extra read discovers end of stream, nothing past frame 1001
        assert_eq!(sampler.source.reads, 1001);
    }

    #[test]
    fn test_cap_stops_without_reading_further() {
        let mut sampler = FrameSampler::new(SyntheticSource::new(1000), opts(1, 10));
        assert_eq!(sampler.by_ref().count(), 10);
        assert_eq!(sampler.source.reads, 10);
        assert_eq!(sampler.stats().frames_sampled, 10);
    }

    #[test]
    fn test_short_source_below_cap() {
        let samples: Vec<_> = FrameSampler::new(SyntheticSource::new(1), opts(1, 3)).collect();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].frame_index, 1);
    }

    #[test]
    fn test_zero_cap_never_reads() {
        let mut sampler = FrameSampler::new(SyntheticSource::new(10), opts(1, 0));
        assert!(sampler.next().is_none());
        assert_eq!(sampler.source.reads, 0);
    }

    #[test]
    fn test_decode_failure_is_skipped() {
        let source = SyntheticSource::new(6).failing_at([2, 4]);
        let mut sampler = FrameSampler::new(source, opts(2, 10));
        let indices: Vec<u64> = sampler.by_ref().map(|s| s.frame_index).collect();

        assert_eq!(indices, vec![6]);
        assert_eq!(sampler.stats().decode_errors, 2);
    }

    #[test]
    fn test_persistent_failures_end_stream() {
        let source = SyntheticSource::new(1000).failing_at(1..=1000);
        let mut sampler = FrameSampler::new(source, opts(1, 300));

        assert!(sampler.next().is_none());
        assert_eq!(
            sampler.stats().decode_errors,
            u64::from(MAX_CONSECUTIVE_DECODE_FAILURES)
        );
    }

    #[test]
    fn test_source_failure_is_kept() {
        let source = SyntheticSource::new(10).dying_after(2);
        let mut sampler = FrameSampler::new(source, opts(1, 10));

        assert_eq!(sampler.by_ref().count(), 2);
        let err = sampler.take_failure().unwrap();
        assert!(matches!(err, MediaError::SourceUnavailable(_)));
        assert!(err.to_string().contains("frame 3"));
        assert!(sampler.next().is_none());
    }

    #[test]
    fn test_clean_end_has_no_failure() {
        let mut sampler = FrameSampler::new(SyntheticSource::new(3), opts(1, 10));
        assert_eq!(sampler.by_ref().count(), 3);
        assert!(sampler.take_failure().is_none());

        let source = SyntheticSource::new(100).failing_at(1..=100);
        let mut sampler = FrameSampler::new(source, opts(1, 10));
        assert!(sampler.next().is_none());
        assert!(sampler.take_failure().is_none());
    }

    #[test]
    fn test_fused_after_end() {
        let mut sampler = FrameSampler::new(SyntheticSource::new(2), opts(1, 5));
        assert_eq!(sampler.by_ref().count(), 2);
        let reads = sampler.source.reads;
        assert!(sampler.next().is_none());
        assert!(sampler.next().is_none());
        assert_eq!(sampler.source.reads, reads);
    }
}
