//! Deterministic fallback embedder.
//!
//! Folds the UTF-8 bytes of the text into a small histogram. It has no notion
//! of meaning but needs no model files and no network, so a run can still
//! complete when the semantic model cannot be loaded.

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Default toy embedding dimension
pub const TOY_DIM: usize = 8;

/// Byte-histogram embedder.
///
/// Byte `b` at index `i` adds `(b % 31) / 31` to bucket `i % D`; the result is
/// L2-normalized.
#[derive(Debug, Clone)]
pub struct ToyEmbedder {
    info: ModelInfo,
}

impl ToyEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbeddingError> {
        if dimension == 0 {
            return Err(EmbeddingError::InvalidInput(
                "toy embedding dimension must be > 0".to_string(),
            ));
        }
        Ok(Self {
            info: ModelInfo {
                name: format!("toy-{}", dimension),
                dimension,
                max_sequence_length: usize::MAX,
            },
        })
    }

    fn histogram(&self, text: &str) -> Vec<f32> {
        let dim = self.info.dimension;
        let mut buckets = vec![0.0f32; dim];
        for (i, byte) in text.bytes().enumerate() {
            buckets[i % dim] += (byte % 31) as f32 / 31.0;
        }
        buckets
    }
}

impl Default for ToyEmbedder {
    fn default() -> Self {
        Self {
            info: ModelInfo {
                name: format!("toy-{}", TOY_DIM),
                dimension: TOY_DIM,
                max_sequence_length: usize::MAX,
            },
        }
    }
}

impl EmbeddingModel for ToyEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        Ok(Embedding::new(self.histogram(text)))
    }
}
