//! Raw captured frames and pixel conversion: YUYV and Y16 unpacking.

use glimpse_core::{ImageBuffer, ImageBufferError, Orientation, PixelFormat};

/// A frame as delivered by capture hardware, before orientation tagging.
#[derive(Clone)]
pub struct RawFrame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub sequence: u32,
    pub timestamp: std::time::Instant,
}

impl RawFrame {
    /// Tag with an orientation, producing the immutable buffer handed downstream.
    pub fn into_buffer(self, orientation: Orientation) -> Result<ImageBuffer, ImageBufferError> {
        ImageBuffer::new(self.data, self.width, self.height, self.format, orientation)
    }
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
/// Grayscale = every even-indexed byte.
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = frame_len(width, height, 2)?;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: yuyv.len(),
        });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Downscale 16-bit little-endian grayscale to 8 bits (high byte).
pub fn y16_to_grayscale(y16: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = frame_len(width, height, 2)?;
    if y16.len() < expected {
        return Err(FrameError::InvalidLength {
            expected,
            actual: y16.len(),
        });
    }
    Ok(y16[..expected].chunks_exact(2).map(|px| px[1]).collect())
}

/// Byte length of a `width`×`height` frame at `bytes_per_pixel`.
pub fn frame_len(width: u32, height: u32, bytes_per_pixel: usize) -> Result<usize, FrameError> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(bytes_per_pixel))
        .ok_or(FrameError::TooLarge { width, height })
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid buffer length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("frame dimensions overflow: {width}x{height}")]
    TooLarge { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_grayscale() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let yuyv = vec![100, 128, 200, 128];
        let gray = yuyv_to_grayscale(&yuyv, 2, 1).unwrap();
        assert_eq!(gray, vec![100, 200]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128]; // too short for 2x1
        assert!(yuyv_to_grayscale(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_huge_dimensions_rejected() {
        let data = vec![0u8; 8];
        assert!(matches!(
            yuyv_to_grayscale(&data, u32::MAX, u32::MAX),
            Err(FrameError::TooLarge { .. })
        ));
        assert!(y16_to_grayscale(&data, 65_536, 65_536).is_err());
    }

    #[test]
    fn test_y16_keeps_high_byte() {
        // 0x1234 and 0xff00, little-endian
        let y16 = vec![0x34, 0x12, 0x00, 0xff];
        assert_eq!(y16_to_grayscale(&y16, 2, 1).unwrap(), vec![0x12, 0xff]);
    }

    #[test]
    fn test_raw_frame_tagging() {
        let raw = RawFrame {
            data: vec![0u8; 6],
            width: 3,
            height: 2,
            format: PixelFormat::Gray8,
            sequence: 4,
            timestamp: std::time::Instant::now(),
        };
        let buffer = raw.into_buffer(Orientation::LeftMirrored).unwrap();
        assert_eq!(buffer.orientation(), Orientation::LeftMirrored);
        assert_eq!((buffer.width(), buffer.height()), (3, 2));
    }
}
