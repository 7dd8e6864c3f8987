//! Frame type and pixel-format conversion (YUYV, MJPG, GREY to packed RGB).

use chrono::NaiveDateTime;
use image::RgbImage;
use std::time::Instant;

/// A captured color camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Packed RGB pixel data (width * height * 3 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture instant, used for violation timing.
    pub timestamp: Instant,
    /// Local wall-clock capture time, used for log records and file names.
    pub captured_at: NaiveDateTime,
    pub sequence: u32,
}

impl Frame {
    /// Wrap RGB data captured right now.
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u32) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: Instant::now(),
            captured_at: chrono::Local::now().naive_local(),
            sequence,
        }
    }

    /// Reuse the pixel buffer as an image without copying it.
    pub fn into_image(self) -> Result<RgbImage, FrameError> {
        let expected = rgb_len(self.width, self.height);
        let actual = self.data.len();
        RgbImage::from_raw(self.width, self.height, self.data)
            .ok_or(FrameError::InvalidLength { expected, actual })
    }
}

/// Byte length of a packed RGB buffer, computed without `u32` overflow.
pub fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

/// Convert packed YUYV (4:2:2) to RGB using BT.601 coefficients.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V]; both pixels share U and V.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize * 2;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }

    let mut rgb = Vec::with_capacity(rgb_len(width, height));
    for chunk in yuyv[..expected].chunks_exact(4) {
        let u = chunk[1] as f32 - 128.0;
        let v = chunk[3] as f32 - 128.0;
        for y in [chunk[0], chunk[2]] {
            let y = y as f32;
            rgb.push((y + 1.402 * v).round().clamp(0.0, 255.0) as u8);
            rgb.push((y - 0.344_136 * u - 0.714_136 * v).round().clamp(0.0, 255.0) as u8);
            rgb.push((y + 1.772 * u).round().clamp(0.0, 255.0) as u8);
        }
    }
    Ok(rgb)
}

/// Replicate 8-bit grayscale into three RGB channels.
pub fn grey_to_rgb(grey: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = width as usize * height as usize;
    if grey.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: grey.len(),
        });
    }
    Ok(grey[..expected].iter().flat_map(|&p| [p, p, p]).collect())
}

/// Decode a Motion-JPEG buffer and check it matches the negotiated size.
pub fn mjpeg_to_rgb(jpeg: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let decoded = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)?.to_rgb8();
    if decoded.width() != width || decoded.height() != height {
        return Err(FrameError::SizeMismatch {
            expected: (width, height),
            actual: (decoded.width(), decoded.height()),
        });
    }
    Ok(decoded.into_raw())
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("decoded frame is {actual:?}, negotiated {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("MJPG decode failed: {0}")]
    Decode(#[from] image::ImageError),
}
