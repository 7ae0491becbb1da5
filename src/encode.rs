//! JPEG encoding of annotated frames.
//!
//! Quality is fixed configuration, not negotiated per request. An encode
//! failure is a per-frame condition: the session logs it and drops that frame
//! from the output stream.

use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

pub const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Serialize an annotated frame to JPEG bytes.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100))
        .encode_image(image)
        .context("JPEG encode failed")?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoded_frames_are_valid_jpeg() {
        let image = RgbImage::from_fn(64, 48, |x, y| image::Rgb([x as u8, y as u8, 128]));
        let bytes = encode_jpeg(&image, DEFAULT_JPEG_QUALITY).unwrap();

        // JPEG SOI marker.
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }
}
