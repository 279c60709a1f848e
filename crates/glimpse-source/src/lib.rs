//! glimpse-source: Frame sources for the recognition pipeline.
//!
//! Streaming capture (image sequences, and V4L2 cameras with the
//! `v4l-camera` feature) and one-shot image picking, all producing
//! orientation-tagged `ImageBuffer`s.

#[cfg(feature = "v4l-camera")]
pub mod camera;
pub mod frame;
pub mod picker;
pub mod sequence;
pub mod source;

#[cfg(feature = "v4l-camera")]
pub use camera::{Camera, DeviceInfo};
pub use frame::{FrameError, RawFrame};
pub use picker::ImageFileSource;
pub use sequence::ImageSequenceSource;
pub use source::{Capture, FrameSource, SourceError, SourceMode, StreamingSource};
