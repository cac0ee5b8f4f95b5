//! Vector index error types.

use sketch_embeddings::EmbeddingError;
use sketch_types::{ErrorKind, SketchError};
use thiserror::Error;

/// Errors that can occur during vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Collection does not exist in the index
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Vector or collection dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Index backend unreachable, timed out or failing server-side
    #[error("Index unavailable: {0}")]
    Unavailable(String),

    /// Index backend rejected the request
    #[error("Index request rejected ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// In-process index state error
    #[error("Index error: {0}")]
    Index(String),

    /// Invalid index configuration
    #[error("Index configuration error: {0}")]
    Config(String),

    /// Malformed or inconsistent asset catalog
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Input file error (missing or malformed catalog file)
    #[error(transparent)]
    Input(#[from] SketchError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Embedding error
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl VectorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VectorError::CollectionNotFound(_) => ErrorKind::NotFound,
            VectorError::DimensionMismatch { .. }
            | VectorError::Config(_)
            | VectorError::Rejected { .. } => ErrorKind::Configuration,
            VectorError::Unavailable(_) | VectorError::Index(_) => ErrorKind::Unavailable,
            VectorError::Catalog(_) | VectorError::Serialization(_) => ErrorKind::Data,
            VectorError::Input(e) => e.kind(),
            VectorError::Embedding(e) => e.kind(),
        }
    }
}

impl From<VectorError> for SketchError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::Input(inner) => inner,
            other => SketchError::from_kind(other.kind(), other.to_string()),
        }
    }
}
