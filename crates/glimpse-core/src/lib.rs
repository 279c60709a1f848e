//! glimpse-core: Data model and provider contract for the recognition pipeline.
//!
//! Image buffers, observation result sets and the error taxonomy shared by
//! frame sources, the recognition engine and presenters.

pub mod provider;
pub mod scripted;
pub mod types;

pub use provider::{ObservationProvider, ProviderError, RecognitionError};
pub use scripted::{ScriptError, ScriptedProvider, ScriptedResponse};
pub use types::{
    BoundingBox, ClassObservation, FaceObservation, ImageBuffer, ImageBufferError, Orientation,
    ParseEnumError, PixelFormat, Point, ProviderKind, ResultSet,
};
