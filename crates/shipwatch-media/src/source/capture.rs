//! OpenCV `VideoCapture` frame source.

use std::path::Path;

use image::RgbImage;
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{VideoCapture, CAP_ANY};
use tracing::{debug, warn};

use super::FrameSource;
use crate::error::{MediaError, MediaResult};

/// Frames read through OpenCV, converted from BGR to RGB.
pub struct OpenCvFrameSource {
    capture: VideoCapture,
}

impl OpenCvFrameSource {
    pub fn open(path: &Path) -> MediaResult<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| MediaError::source_unavailable("video path is not valid UTF-8"))?;

        let capture = VideoCapture::from_file(path_str, CAP_ANY)
            .map_err(|e| MediaError::source_unavailable(format!("Failed to open video: {}", e)))?;

        let opened = capture
            .is_opened()
            .map_err(|e| MediaError::source_unavailable(e.to_string()))?;
        if !opened {
            return Err(MediaError::source_unavailable(format!(
                "OpenCV could not open {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "Opened OpenCV frame source");
        Ok(Self { capture })
    }
}

impl FrameSource for OpenCvFrameSource {
    fn read_next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        let mut frame = Mat::default();
        let ok = self
            .capture
            .read(&mut frame)
            .map_err(|e| MediaError::decode(format!("Frame read failed: {}", e)))?;
        if !ok || frame.empty() {
            return Ok(None);
        }

        let mut rgb_frame = Mat::default();
        opencv::imgproc::cvt_color_def(&frame, &mut rgb_frame, opencv::imgproc::COLOR_BGR2RGB)
            .map_err(|e| MediaError::decode(format!("Color conversion failed: {}", e)))?;

        let width = rgb_frame.cols() as u32;
        let height = rgb_frame.rows() as u32;
        let data = rgb_frame
            .data_bytes()
            .map_err(|e| MediaError::decode(format!("Failed to get frame data: {}", e)))?;

        RgbImage::from_raw(width, height, data.to_vec())
            .map(Some)
            .ok_or_else(|| MediaError::decode("frame buffer does not match geometry"))
    }

    fn skip_frame(&mut self) -> MediaResult<bool> {
        self.capture
            .grab()
            .map_err(|e| MediaError::decode(format!("Frame grab failed: {}", e)))
    }
}

impl Drop for OpenCvFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release video capture: {}", e);
        }
    }
}
