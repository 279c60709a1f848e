//! Frame source contract and the orientation-normalizing streaming wrapper.

use crate::frame::RawFrame;
use glimpse_core::{ImageBuffer, ImageBufferError, Orientation, RecognitionError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    /// No usable capture device. Fatal for the source.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] ImageBufferError),
}

impl SourceError {
    /// Whether the source can keep producing after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_) | Self::NotFound(_))
    }
}

impl From<SourceError> for RecognitionError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::DeviceUnavailable(device) | SourceError::NotFound(device) => {
                RecognitionError::DeviceUnavailable(device)
            }
            other => RecognitionError::ProviderFailure {
                provider: "frame-source".to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Frames arrive continuously; late frames may be dropped downstream.
    Streaming,
    /// One frame per explicit user action.
    OneShot,
}

/// Producer of image buffers.
///
/// `next_frame` blocks until a frame is ready and returns `Ok(None)` once the
/// source is exhausted.
pub trait FrameSource: Send {
    fn mode(&self) -> SourceMode;

    fn next_frame(&mut self) -> Result<Option<ImageBuffer>, SourceError>;
}

/// Raw capture device: yields frames without any orientation knowledge.
pub trait Capture: Send {
    fn capture(&mut self) -> Result<Option<RawFrame>, SourceError>;
}

/// Streaming source that tags every captured frame with one fixed
/// orientation, so buffers leave already upright for display.
pub struct StreamingSource<C> {
    capture: C,
    orientation: Orientation,
    delivered: u64,
}

impl<C: Capture> StreamingSource<C> {
    pub fn new(capture: C, orientation: Orientation) -> Self {
        Self {
            capture,
            orientation,
            delivered: 0,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }
}

impl<C: Capture> FrameSource for StreamingSource<C> {
    fn mode(&self) -> SourceMode {
        SourceMode::Streaming
    }

    fn next_frame(&mut self) -> Result<Option<ImageBuffer>, SourceError> {
        let Some(raw) = self.capture.capture()? else {
            return Ok(None);
        };
        let sequence = raw.sequence;
        let buffer = raw.into_buffer(self.orientation)?;
        self.delivered += 1;
        tracing::trace!(seq = sequence, delivered = self.delivered, "frame captured");
        Ok(Some(buffer))
    }
}
