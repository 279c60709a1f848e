//! Scripted observation provider.
//!
//! Replays canned responses loaded from TOML, cycling through them one per
//! `detect` call. Used for demos and diagnostics when no model is attached.
//!
//! ```toml
//! id = "demo-classifier"
//! kind = "classifier"
//! latency_ms = 40
//!
//! [[responses]]
//! kind = "classes"
//! observations = [{ label = "cat", confidence = 0.87 }]
//!
//! [[responses]]
//! kind = "failure"
//! message = "unsupported format"
//! ```

use crate::provider::{ObservationProvider, ProviderError};
use crate::types::{ClassObservation, FaceObservation, ImageBuffer, ProviderKind, ResultSet};
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("failed to read script {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("bad script TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("script has no responses")]
    NoResponses,
    #[error("response {index} is {found}, but provider kind is {expected}")]
    KindMismatch {
        index: usize,
        expected: ProviderKind,
        found: ProviderKind,
    },
}

/// One canned answer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ScriptedResponse {
    Faces {
        #[serde(default)]
        observations: Vec<FaceObservation>,
    },
    Classes {
        #[serde(default)]
        observations: Vec<ClassObservation>,
    },
    Failure {
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct ScriptFile {
    id: String,
    kind: ProviderKind,
    #[serde(default)]
    latency_ms: u64,
    responses: Vec<ScriptedResponse>,
}

pub struct ScriptedProvider {
    id: String,
    kind: ProviderKind,
    latency: Duration,
    responses: Vec<ScriptedResponse>,
    cursor: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(
        id: impl Into<String>,
        kind: ProviderKind,
        responses: Vec<ScriptedResponse>,
    ) -> Result<Self, ScriptError> {
        if responses.is_empty() {
            return Err(ScriptError::NoResponses);
        }
        for (index, response) in responses.iter().enumerate() {
            let found = match response {
                ScriptedResponse::Faces { .. } => ProviderKind::FaceLandmarks,
                ScriptedResponse::Classes { .. } => ProviderKind::Classifier,
                ScriptedResponse::Failure { .. } => continue,
            };
            if found != kind {
                return Err(ScriptError::KindMismatch {
                    index,
                    expected: kind,
                    found,
                });
            }
        }
        Ok(Self {
            id: id.into(),
            kind,
            latency: Duration::ZERO,
            responses,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Simulated inference time applied to every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn from_toml_str(src: &str) -> Result<Self, ScriptError> {
        let file: ScriptFile = toml::from_str(src)?;
        Ok(Self::new(file.id, file.kind, file.responses)?
            .with_latency(Duration::from_millis(file.latency_ms)))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path).map_err(|source| ScriptError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let provider = Self::from_toml_str(&src)?;
        tracing::info!(
            path = %path.display(),
            id = %provider.id,
            kind = %provider.kind,
            responses = provider.responses.len(),
            "loaded scripted provider"
        );
        Ok(provider)
    }
}

impl ObservationProvider for ScriptedProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn detect(&self, image: &ImageBuffer) -> Result<ResultSet, ProviderError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.responses.len();
        tracing::trace!(
            id = %self.id,
            index,
            width = image.width(),
            height = image.height(),
            "scripted response"
        );
        match &self.responses[index] {
            ScriptedResponse::Faces { observations } => Ok(ResultSet::faces(observations.clone())),
            ScriptedResponse::Classes { observations } => {
                Ok(ResultSet::classes(observations.clone()))
            }
            ScriptedResponse::Failure { message } => {
                Err(ProviderError::InferenceFailed(message.clone()))
            }
        }
    }
}
