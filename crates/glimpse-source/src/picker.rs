//! One-shot image source: decodes a picked photo and its EXIF orientation.

use crate::frame::RawFrame;
use crate::source::{FrameSource, SourceError, SourceMode};
use glimpse_core::{ImageBuffer, Orientation, PixelFormat};
use image::metadata::Orientation as ExifOrientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::path::{Path, PathBuf};

/// Decode an image file into packed RGB plus the orientation recorded in
/// its metadata. Pixels are not rotated; the tag travels with the buffer.
pub fn decode_image(path: &Path) -> Result<(RawFrame, Orientation), SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.display().to_string()));
    }
    let io_err = |source| SourceError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut decoder = ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .into_decoder()?;
    let orientation = map_orientation(decoder.orientation()?);
    let rgb = DynamicImage::from_decoder(decoder)?.into_rgb8();
    let (width, height) = rgb.dimensions();

    tracing::debug!(
        path = %path.display(),
        width,
        height,
        ?orientation,
        "decoded image"
    );

    let frame = RawFrame {
        data: rgb.into_raw(),
        width,
        height,
        format: PixelFormat::Rgb8,
        sequence: 0,
        timestamp: std::time::Instant::now(),
    };
    Ok((frame, orientation))
}

fn map_orientation(orientation: ExifOrientation) -> Orientation {
    match orientation {
        ExifOrientation::NoTransforms => Orientation::Up,
        ExifOrientation::FlipHorizontal => Orientation::UpMirrored,
        ExifOrientation::Rotate180 => Orientation::Down,
        ExifOrientation::FlipVertical => Orientation::DownMirrored,
        ExifOrientation::Rotate90FlipH => Orientation::LeftMirrored,
        ExifOrientation::Rotate90 => Orientation::Right,
        ExifOrientation::Rotate270FlipH => Orientation::RightMirrored,
        ExifOrientation::Rotate270 => Orientation::Left,
    }
}

/// A single picked photo, delivered once.
pub struct ImageFileSource {
    path: PathBuf,
    taken: bool,
}

impl ImageFileSource {
    /// Fails immediately when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SourceError> {
        let path = path.into();
        if !path.is_file() {
            return Err(SourceError::NotFound(path.display().to_string()));
        }
        Ok(Self { path, taken: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameSource for ImageFileSource {
    fn mode(&self) -> SourceMode {
        SourceMode::OneShot
    }

    fn next_frame(&mut self) -> Result<Option<ImageBuffer>, SourceError> {
        if self.taken {
            return Ok(None);
        }
        self.taken = true;
        let (frame, orientation) = decode_image(&self.path)?;
        Ok(Some(frame.into_buffer(orientation)?))
    }
}
