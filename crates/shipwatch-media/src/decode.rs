//! Still image decoding.

use image::RgbImage;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Decode raw bytes into an RGB frame.
///
/// Bytes that do not carry a known image signature are rejected as
/// unsupported media; bytes that do but fail to parse are a decode error.
pub fn decode_image(bytes: &[u8]) -> MediaResult<RgbImage> {
    if bytes.is_empty() {
        return Err(MediaError::unsupported_media("empty payload"));
    }

    let format = image::guess_format(bytes)
        .map_err(|_| MediaError::unsupported_media("payload is not a recognized image format"))?;

    let img = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| MediaError::decode(format!("failed to decode {:?} image: {}", format, e)))?;

    debug!(
        format = ?format,
        width = img.width(),
        height = img.height(),
        "Decoded image"
    );

    Ok(img.to_rgb8())
}
