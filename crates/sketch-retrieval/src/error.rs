//! Retrieval error types.

use std::time::Duration;

use sketch_embeddings::EmbeddingError;
use sketch_types::{ErrorKind, SketchError};
use sketch_vector::VectorError;
use thiserror::Error;

/// Errors from a single retrieval or from opening a session.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Query text is empty or whitespace
    #[error("Empty query text")]
    EmptyQuery,

    /// Per-query timeout elapsed
    #[error("Query timed out after {0:?}")]
    Timeout(Duration),

    /// Index payload could not be decoded into an asset
    #[error("Invalid payload for point {id}: {message}")]
    Payload { id: String, message: String },

    /// Blocking embedding task failed to complete
    #[error("Embedding task failed: {0}")]
    Task(String),

    /// Session could not be opened with the given settings
    #[error("Session error: {0}")]
    Session(String),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Vector(#[from] VectorError),
}

impl RetrievalError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RetrievalError::EmptyQuery | RetrievalError::Payload { .. } => ErrorKind::Data,
            RetrievalError::Timeout(_) | RetrievalError::Task(_) => ErrorKind::Unavailable,
            RetrievalError::Session(_) => ErrorKind::Configuration,
            RetrievalError::Embedding(e) => e.kind(),
            RetrievalError::Vector(e) => e.kind(),
        }
    }
}

impl From<RetrievalError> for SketchError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Vector(inner) => inner.into(),
            other => SketchError::from_kind(other.kind(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(RetrievalError::EmptyQuery.kind(), ErrorKind::Data);
        assert_eq!(
            RetrievalError::Timeout(Duration::from_millis(10)).kind(),
            ErrorKind::Unavailable
        );
        assert_eq!(
            RetrievalError::Vector(VectorError::CollectionNotFound("assets".into())).kind(),
            ErrorKind::NotFound
        );
        let err: SketchError = RetrievalError::Session("no catalog".into()).into();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
