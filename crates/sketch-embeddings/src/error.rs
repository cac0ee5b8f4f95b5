//! Embedding error types.

use sketch_types::{ErrorKind, SketchError};
use thiserror::Error;

/// Errors that can occur during embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// Candle model error
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    /// Tokenizer error
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Model file not found or unreadable
    #[error("Model file not found: {0}")]
    ModelNotFound(String),

    /// Download error
    #[error("Failed to download model: {0}")]
    Download(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Classify for propagation.
    ///
    /// Anything that stops the model from loading or running is treated as
    /// the embedding service being unavailable.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmbeddingError::InvalidInput(_) => ErrorKind::Data,
            EmbeddingError::DimensionMismatch { .. } => ErrorKind::Configuration,
            EmbeddingError::Candle(_)
            | EmbeddingError::Tokenizer(_)
            | EmbeddingError::ModelNotFound(_)
            | EmbeddingError::Download(_)
            | EmbeddingError::Io(_) => ErrorKind::Unavailable,
        }
    }
}

impl From<EmbeddingError> for SketchError {
    fn from(err: EmbeddingError) -> Self {
        SketchError::from_kind(err.kind(), err.to_string())
    }
}
