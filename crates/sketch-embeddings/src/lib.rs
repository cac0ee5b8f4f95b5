//! # sketch-embeddings
//!
//! Text embedding providers for sketch-search.
//!
//! Shot descriptions and asset texts are embedded into the same vector space
//! so the index can rank assets by cosine similarity.
//!
//! ## Providers
//! - [`CandleEmbedder`]: BERT sentence encoder via Candle (all-MiniLM-L6-v2,
//!   384 dimensions, by default); dimension read from the model config; local
//!   inference after a one-time model download
//! - [`ToyEmbedder`]: deterministic byte histogram (8 dimensions), no I/O,
//!   used when the semantic model is unavailable

pub mod cache;
pub mod candle;
pub mod error;
pub mod model;
pub mod toy;

use std::sync::Arc;

use sketch_types::{EmbeddingProviderKind, EmbeddingSettings};
use tracing::info;

pub use crate::candle::{CandleEmbedder, EncoderShape, MAX_SEQ_LENGTH};
pub use cache::{get_or_download_model, ModelCache, ModelPaths, DEFAULT_MODEL_REPO, MODEL_FILES};
pub use error::EmbeddingError;
pub use model::{l2_normalize, Embedding, EmbeddingModel, ModelInfo};
pub use toy::{ToyEmbedder, TOY_DIM};

/// Build the embedder selected by the settings.
///
/// Loading the semantic model may download files and is blocking; call it from
/// a blocking context.
pub fn load_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn EmbeddingModel>, EmbeddingError> {
    match settings.provider {
        EmbeddingProviderKind::Candle => {
            let cache = ModelCache::from_settings(settings);
            let embedder = CandleEmbedder::load(&cache)?;
            info!(model = %embedder.info().name, dim = embedder.info().dimension, "Semantic embedder ready");
            Ok(Arc::new(embedder))
        }
        EmbeddingProviderKind::Toy => {
            let embedder = ToyEmbedder::new(settings.toy_dimension)?;
            info!(dim = embedder.info().dimension, "Toy embedder ready");
            Ok(Arc::new(embedder))
        }
    }
}
