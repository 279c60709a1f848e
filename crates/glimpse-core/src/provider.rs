//! The observation provider contract and the recognition error taxonomy.

use crate::types::{ImageBuffer, ProviderKind, ResultSet};
use thiserror::Error;

/// Failure reported by a provider while processing one image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("malformed image: {0}")]
    MalformedImage(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Errors a recognition request can resolve with.
///
/// An empty result set is not an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecognitionError {
    /// No capture device. Fatal; never retried.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
    /// The provider could not process this image. The next frame may succeed.
    #[error("provider {provider} failed: {message}")]
    ProviderFailure { provider: String, message: String },
}

impl RecognitionError {
    pub fn provider_failure(provider: &str, err: impl std::fmt::Display) -> Self {
        Self::ProviderFailure {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DeviceUnavailable(_))
    }
}

/// Anything that turns an image into scored observations.
///
/// `detect` may block (model inference); callers run it off the producer
/// thread. Implementations must return the variant named by `kind`.
pub trait ObservationProvider: Send + Sync {
    /// Stable identifier; requests to the same id share one delivery lane.
    fn id(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    fn detect(&self, image: &ImageBuffer) -> Result<ResultSet, ProviderError>;
}
