//! Sequential video frame sources.

mod ffmpeg;
#[cfg(feature = "opencv")]
mod capture;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use image::RgbImage;

use crate::error::{MediaError, MediaResult};
use crate::probe::VideoInfo;

pub use self::ffmpeg::{FfmpegFrameSource, RawFrameReader};
#[cfg(feature = "opencv")]
pub use self::capture::OpenCvFrameSource;

/// A decoder that yields frames in order, one at a time.
///
/// The source owns its decoder handle and releases it when dropped.
pub trait FrameSource: Send {
    /// Decode the next frame.
    ///
    /// `Ok(None)` marks end of stream. A frame that cannot be decoded is an
    /// `Err(MediaError::Decode)`; the source stays usable afterwards.
    fn read_next_frame(&mut self) -> MediaResult<Option<RgbImage>>;

    /// Advance past the next frame without materializing its pixels.
    ///
    /// Returns `false` at end of stream.
    fn skip_frame(&mut self) -> MediaResult<bool> {
        Ok(self.read_next_frame()?.is_some())
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn read_next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        (**self).read_next_frame()
    }

    fn skip_frame(&mut self) -> MediaResult<bool> {
        (**self).skip_frame()
    }
}

/// Which decoder backs video analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoBackend {
    /// `ffmpeg` child process writing raw RGB frames to a pipe
    #[default]
    Ffmpeg,
    /// OpenCV `VideoCapture` (feature `opencv`)
    OpenCv,
}

impl VideoBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoBackend::Ffmpeg => "ffmpeg",
            VideoBackend::OpenCv => "opencv",
        }
    }
}

impl fmt::Display for VideoBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoBackend {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ffmpeg" => Ok(VideoBackend::Ffmpeg),
            "opencv" => Ok(VideoBackend::OpenCv),
            other => Err(MediaError::internal(format!(
                "unknown video backend '{}', expected ffmpeg or opencv",
                other
            ))),
        }
    }
}

/// Check that the tools `backend` needs are present, without opening anything.
pub fn check_backend(backend: VideoBackend) -> MediaResult<()> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)?;
    match backend {
        VideoBackend::Ffmpeg => {
            which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
            Ok(())
        }
        #[cfg(feature = "opencv")]
        VideoBackend::OpenCv => Ok(()),
        #[cfg(not(feature = "opencv"))]
        VideoBackend::OpenCv => Err(MediaError::source_unavailable(
            "OpenCV backend requested but not compiled in",
        )),
    }
}

/// Open a frame source for a probed video file.
pub fn open_video(
    path: &Path,
    info: &VideoInfo,
    backend: VideoBackend,
) -> MediaResult<Box<dyn FrameSource>> {
    match backend {
        VideoBackend::Ffmpeg => Ok(Box::new(FfmpegFrameSource::open(
            path,
            info.width,
            info.height,
        )?)),
        #[cfg(feature = "opencv")]
        VideoBackend::OpenCv => Ok(Box::new(OpenCvFrameSource::open(path)?)),
        #[cfg(not(feature = "opencv"))]
        VideoBackend::OpenCv => Err(MediaError::source_unavailable(
            "OpenCV backend requested but not compiled in",
        )),
    }
}
