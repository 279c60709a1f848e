use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// One of the eight canonical EXIF orientations.
///
/// Names describe where the top row of the stored pixels ends up, matching
/// the camera-sensor convention (`Right` is EXIF 6, the usual portrait tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Orientation {
    #[default]
    Up,
    UpMirrored,
    Down,
    DownMirrored,
    Left,
    LeftMirrored,
    Right,
    RightMirrored,
}

impl Orientation {
    /// Map an EXIF orientation value (1..=8).
    pub fn from_exif(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Up),
            2 => Some(Self::UpMirrored),
            3 => Some(Self::Down),
            4 => Some(Self::DownMirrored),
            5 => Some(Self::LeftMirrored),
            6 => Some(Self::Right),
            7 => Some(Self::RightMirrored),
            8 => Some(Self::Left),
            _ => None,
        }
    }

    pub fn to_exif(self) -> u8 {
        match self {
            Self::Up => 1,
            Self::UpMirrored => 2,
            Self::Down => 3,
            Self::DownMirrored => 4,
            Self::LeftMirrored => 5,
            Self::Right => 6,
            Self::RightMirrored => 7,
            Self::Left => 8,
        }
    }

    pub fn is_mirrored(self) -> bool {
        matches!(
            self,
            Self::UpMirrored | Self::DownMirrored | Self::LeftMirrored | Self::RightMirrored
        )
    }
}

impl FromStr for Orientation {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "up-mirrored" => Ok(Self::UpMirrored),
            "down" => Ok(Self::Down),
            "down-mirrored" => Ok(Self::DownMirrored),
            "left" => Ok(Self::Left),
            "left-mirrored" => Ok(Self::LeftMirrored),
            "right" => Ok(Self::Right),
            "right-mirrored" => Ok(Self::RightMirrored),
            other => Err(ParseEnumError {
                kind: "orientation",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Pixel layout of an [`ImageBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 8-bit grayscale, 1 byte/pixel.
    Gray8,
    /// Packed RGB, 3 bytes/pixel.
    Rgb8,
    /// Packed BGRA, 4 bytes/pixel (native camera output on most platforms).
    Bgra8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Gray8 => 1,
            Self::Rgb8 => 3,
            Self::Bgra8 => 4,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageBufferError {
    #[error("image has zero area: {width}x{height}")]
    Empty { width: u32, height: u32 },
    #[error("image dimensions overflow: {width}x{height}")]
    TooLarge { width: u32, height: u32 },
    #[error("invalid pixel data length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Immutable handle to a 2D pixel grid plus its orientation tag.
///
/// Pixel data is reference counted, so clones share storage.
#[derive(Clone)]
pub struct ImageBuffer {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    format: PixelFormat,
    orientation: Orientation,
}

impl ImageBuffer {
    pub fn new(
        data: impl Into<Arc<[u8]>>,
        width: u32,
        height: u32,
        format: PixelFormat,
        orientation: Orientation,
    ) -> Result<Self, ImageBufferError> {
        if width == 0 || height == 0 {
            return Err(ImageBufferError::Empty { width, height });
        }
        let data = data.into();
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(format.bytes_per_pixel()))
            .ok_or(ImageBufferError::TooLarge { width, height })?;
        if data.len() != expected {
            return Err(ImageBufferError::InvalidLength {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
            format,
            orientation,
        })
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Same pixels, different orientation tag. Storage is shared.
    pub fn with_orientation(&self, orientation: Orientation) -> Self {
        Self {
            orientation,
            ..self.clone()
        }
    }
}

impl fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("orientation", &self.orientation)
            .finish_non_exhaustive()
    }
}

/// Axis-aligned box in normalized image coordinates (0..1, origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// A detected face region with optional landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceObservation {
    pub bounding_box: BoundingBox,
    /// Detector confidence, when the detector reports one.
    #[serde(default)]
    pub confidence: Option<f32>,
    /// Landmark points in the same normalized space as `bounding_box`.
    #[serde(default)]
    pub landmarks: Option<Vec<Point>>,
}

/// A classifier label with its confidence (0..1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassObservation {
    pub label: String,
    pub confidence: f32,
}

impl ClassObservation {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }
}

/// Observations from one recognition call. All entries share one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "observations", rename_all = "lowercase")]
pub enum ResultSet {
    /// Detector-native order; the first face has the highest priority.
    Faces(Vec<FaceObservation>),
    /// Sorted by descending confidence.
    Classes(Vec<ClassObservation>),
}

impl ResultSet {
    pub fn faces(faces: Vec<FaceObservation>) -> Self {
        Self::Faces(faces)
    }

    /// Build a classification set, sorting by descending confidence.
    /// The sort is stable, so equal confidences keep provider order.
    pub fn classes(mut classes: Vec<ClassObservation>) -> Self {
        classes.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        Self::Classes(classes)
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Faces(v) => v.len(),
            Self::Classes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Faces(_) => ProviderKind::FaceLandmarks,
            Self::Classes(_) => ProviderKind::Classifier,
        }
    }
}

/// Which observation variant a provider produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    FaceLandmarks,
    Classifier,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FaceLandmarks => f.write_str("face-landmarks"),
            Self::Classifier => f.write_str("classifier"),
        }
    }
}
