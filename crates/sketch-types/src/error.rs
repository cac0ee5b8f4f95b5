//! Error taxonomy shared by every sketch-search crate.
//!
//! Each crate keeps its own error enum and classifies it into an
//! [`ErrorKind`]; the entry points only reason about kinds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification used to decide how an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing connection parameters, dimension mismatch, invalid settings.
    Configuration,
    /// Index or embedding service unreachable.
    Unavailable,
    /// Expected input (scene graph, query list, collection) missing.
    NotFound,
    /// Malformed scene graph, query list or catalog.
    Data,
    /// One or more per-shot queries failed while the batch proceeded.
    PartialRetrieval,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Data => "data",
            ErrorKind::PartialRetrieval => "partial_retrieval",
        }
    }

    /// Whether a run may continue after an error of this kind.
    ///
    /// `Unavailable` is only recoverable when a fallback is configured, which
    /// the session decides; here it is reported as recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ErrorKind::Unavailable | ErrorKind::PartialRetrieval)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for sketch-search operations.
#[derive(Debug, Error)]
pub enum SketchError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Service unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Not found error
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed input
    #[error("Data error: {0}")]
    Data(String),

    /// Per-shot failures inside an otherwise completed batch
    #[error("Partial retrieval failure: {failed} of {total} shots unresolved")]
    PartialRetrieval { failed: usize, total: usize },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SketchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SketchError::Config(_) => ErrorKind::Configuration,
            SketchError::Unavailable(_) => ErrorKind::Unavailable,
            SketchError::NotFound(_) => ErrorKind::NotFound,
            SketchError::Data(_) | SketchError::Serialization(_) => ErrorKind::Data,
            SketchError::PartialRetrieval { .. } => ErrorKind::PartialRetrieval,
        }
    }

    /// Build an error of the given kind from a message.
    pub fn from_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::Configuration => SketchError::Config(message),
            ErrorKind::Unavailable => SketchError::Unavailable(message),
            ErrorKind::NotFound => SketchError::NotFound(message),
            ErrorKind::Data | ErrorKind::PartialRetrieval => SketchError::Data(message),
        }
    }
}
