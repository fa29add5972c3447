//! FFmpeg pipe frame source.

use std::ffi::OsString;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};

use image::RgbImage;
use tracing::{debug, warn};

use super::FrameSource;
use crate::error::{MediaError, MediaResult};

/// Splits a raw `rgb24` byte stream into fixed-size frames.
pub struct RawFrameReader<R> {
    reader: R,
    width: u32,
    height: u32,
    buf: Vec<u8>,
    finished: bool,
}

impl<R: Read> RawFrameReader<R> {
    pub fn new(reader: R, width: u32, height: u32) -> Self {
        let frame_len = width as usize * height as usize * 3;
        Self {
            reader,
            width,
            height,
            buf: vec![0; frame_len],
            finished: false,
        }
    }

    /// Fill the internal buffer with one frame. Returns `false` at end of stream.
    fn fill(&mut self) -> MediaResult<bool> {
        if self.finished {
            return Ok(false);
        }

        let mut filled = 0;
        while filled < self.buf.len() {
            match self.reader.read(&mut self.buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.finished = true;
                    return Err(e.into());
                }
            }
        }

        if filled < self.buf.len() {
            if filled > 0 {
                debug!(bytes = filled, "Discarding truncated trailing frame");
            }
            self.finished = true;
            return Ok(false);
        }

        Ok(true)
    }
}

impl<R: Read + Send> FrameSource for RawFrameReader<R> {
    fn read_next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        if !self.fill()? {
            return Ok(None);
        }
        RgbImage::from_raw(self.width, self.height, self.buf.clone())
            .map(Some)
            .ok_or_else(|| MediaError::decode("frame buffer does not match geometry"))
    }

    fn skip_frame(&mut self) -> MediaResult<bool> {
        self.fill()
    }
}

/// Arguments decoding `path` to raw `rgb24` on stdout.
///
/// Autorotation stays off so frames keep the coded geometry ffprobe reports.
fn decode_args(path: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-v", "error", "-nostdin", "-noautorotate", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(path.as_os_str().to_owned());
    args.extend(
        ["-f", "rawvideo", "-pix_fmt", "rgb24", "-"]
            .into_iter()
            .map(OsString::from),
    );
    args
}

/// A decoder that stopped writing frames must also have exited cleanly.
fn exit_status_result(status: ExitStatus) -> MediaResult<()> {
    if status.success() {
        Ok(())
    } else {
        Err(MediaError::source_unavailable(format!(
            "ffmpeg exited with {}",
            status
        )))
    }
}

/// Frames decoded by an `ffmpeg` child process.
///
/// The child is killed and reaped when the source is dropped. At end of
/// stream the child is reaped and a failed exit is reported as an error.
pub struct FfmpegFrameSource {
    child: Child,
    frames: RawFrameReader<ChildStdout>,
    exit_checked: bool,
}

impl FfmpegFrameSource {
    /// Spawn `ffmpeg` decoding `path` to raw RGB at the probed geometry.
    pub fn open(path: &Path, width: u32, height: u32) -> MediaResult<Self> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        if width == 0 || height == 0 {
            return Err(MediaError::source_unavailable(format!(
                "invalid frame geometry {}x{}",
                width, height
            )));
        }

        let mut child = Command::new("ffmpeg")
            .args(decode_args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| MediaError::source_unavailable(format!("failed to spawn ffmpeg: {}", e)))?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(MediaError::source_unavailable("ffmpeg stdout not captured"));
            }
        };

        debug!(path = %path.display(), width, height, "Opened ffmpeg frame source");

        Ok(Self {
            child,
            frames: RawFrameReader::new(stdout, width, height),
            exit_checked: false,
        })
    }

    /// Reap the child once stdout is exhausted.
    fn check_exit(&mut self) -> MediaResult<()> {
        if self.exit_checked {
            return Ok(());
        }
        self.exit_checked = true;
        let status = self.child.wait()?;
        debug!(%status, "ffmpeg finished");
        exit_status_result(status)
    }
}

impl FrameSource for FfmpegFrameSource {
    fn read_next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
        let frame = self.frames.read_next_frame()?;
        if frame.is_none() {
            self.check_exit()?;
        }
        Ok(frame)
    }

    fn skip_frame(&mut self) -> MediaResult<bool> {
        let more = self.frames.skip_frame()?;
        if !more {
            self.check_exit()?;
        }
        Ok(more)
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            if let Err(e) = self.child.kill() {
                warn!("Failed to kill ffmpeg: {}", e);
            }
        }
        let _ = self.child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frames(count: usize, width: u32, height: u32) -> Vec<u8> {
        let frame_len = (width * height * 3) as usize;
        (0..count)
            .flat_map(|i| std::iter::repeat(i as u8).take(frame_len))
            .collect()
    }

    #[test]
    fn test_reads_frames_in_order() {
        let mut reader = RawFrameReader::new(Cursor::new(frames(3, 2, 2)), 2, 2);

        let first = reader.read_next_frame().unwrap().unwrap();
        assert_eq!(first.dimensions(), (2, 2));
        assert_eq!(first.get_pixel(1, 1).0, [0, 0, 0]);

        assert!(reader.skip_frame().unwrap());

        let third = reader.read_next_frame().unwrap().unwrap();
        assert_eq!(third.get_pixel(0, 0).0, [2, 2, 2]);

        assert!(reader.read_next_frame().unwrap().is_none());
        assert!(!reader.skip_frame().unwrap());
    }

    #[test]
    fn test_truncated_tail_is_end_of_stream() {
        let mut bytes = frames(1, 2, 2);
        bytes.extend_from_slice(&[9, 9, 9]);
        let mut reader = RawFrameReader::new(Cursor::new(bytes), 2, 2);

        assert!(reader.read_next_frame().unwrap().is_some());
        assert!(reader.read_next_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_stream() {
        let mut reader = RawFrameReader::new(Cursor::new(Vec::new()), 2, 2);
        assert!(reader.read_next_frame().unwrap().is_none());
    }

    #[test]
    fn test_decode_args_disable_autorotate() {
        let args = decode_args(Path::new("/tmp/upload.video"));
        let pos = |flag: &str| args.iter().position(|a| a == flag).unwrap();

        assert!(pos("-noautorotate") < pos("-i"));
        assert_eq!(args[pos("-i") + 1], "/tmp/upload.video");
        assert_eq!(args.last().unwrap(), "-");
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_exit_is_source_error() {
        use std::os::unix::process::ExitStatusExt;

        assert!(exit_status_result(ExitStatus::from_raw(0)).is_ok());

        // wait status for exit code 1
        let err = exit_status_result(ExitStatus::from_raw(1 << 8)).unwrap_err();
        assert!(matches!(err, MediaError::SourceUnavailable(_)));
    }
}
