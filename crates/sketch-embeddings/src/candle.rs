//! Candle-based semantic embedder.
//!
//! Runs a BERT-family sentence encoder (all-MiniLM-L6-v2 by default) on the
//! CPU. The output dimension and usable sequence length are read from the
//! model's own `config.json`, so any compatible repo configured under
//! `embedding.model_repo` reports its real shape at load time.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use tokenizers::{Encoding, Tokenizer};
use tracing::{debug, info};

use crate::cache::{get_or_download_model, ModelCache};
use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

/// Upper bound on tokens per text, whatever the model allows
pub const MAX_SEQ_LENGTH: usize = 256;

/// Shape of the encoder as declared in `config.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EncoderShape {
    /// Width of the hidden states, and so of the pooled embedding
    pub hidden_size: usize,

    #[serde(default)]
    pub max_position_embeddings: Option<usize>,
}

impl EncoderShape {
    pub fn from_json(json: &str) -> Result<Self, EmbeddingError> {
        let shape: EncoderShape = serde_json::from_str(json)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;
        if shape.hidden_size == 0 {
            return Err(EmbeddingError::ModelNotFound(
                "Invalid config: hidden_size is 0".to_string(),
            ));
        }
        Ok(shape)
    }

    /// Tokens kept per text.
    pub fn sequence_limit(&self) -> usize {
        self.max_position_embeddings
            .map_or(MAX_SEQ_LENGTH, |positions| positions.min(MAX_SEQ_LENGTH))
    }
}

/// Token ids and attention mask of a batch, padded to a common length.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PaddedBatch {
    ids: Vec<u32>,
    mask: Vec<u32>,
    rows: usize,
    len: usize,
}

impl PaddedBatch {
    /// Truncate each row to `limit` tokens and right-pad with zeros to the
    /// longest remaining row.
    fn from_rows<'a>(
        rows: impl ExactSizeIterator<Item = (&'a [u32], &'a [u32])> + Clone,
        limit: usize,
    ) -> Self {
        let len = rows
            .clone()
            .map(|(ids, _)| ids.len().min(limit))
            .max()
            .unwrap_or(0);
        let count = rows.len();

        let mut ids = Vec::with_capacity(count * len);
        let mut mask = Vec::with_capacity(count * len);
        for (row_ids, row_mask) in rows {
            let kept = row_ids.len().min(len);
            ids.extend_from_slice(&row_ids[..kept]);
            ids.resize(ids.len() + len - kept, 0);
            mask.extend_from_slice(&row_mask[..kept]);
            mask.resize(mask.len() + len - kept, 0);
        }

        Self {
            ids,
            mask,
            rows: count,
            len,
        }
    }

    fn from_encodings(encodings: &[Encoding], limit: usize) -> Self {
        Self::from_rows(
            encodings
                .iter()
                .map(|e| (e.get_ids(), e.get_attention_mask())),
            limit,
        )
    }
}

/// Semantic embedder over a Candle BERT encoder.
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    shape: EncoderShape,
    info: ModelInfo,
}

impl CandleEmbedder {
    /// Load the model in `cache`, downloading missing files.
    pub fn load(cache: &ModelCache) -> Result<Self, EmbeddingError> {
        let paths = get_or_download_model(cache)?;
        Self::load_from_paths(
            cache.model_name(),
            &paths.config,
            &paths.tokenizer,
            &paths.weights,
        )
    }

    pub fn load_from_paths(
        name: &str,
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
    ) -> Result<Self, EmbeddingError> {
        let config_json = std::fs::read_to_string(config_path)?;
        let shape = EncoderShape::from_json(&config_json)?;
        let config: BertConfig = serde_json::from_str(&config_json)
            .map_err(|e| EmbeddingError::ModelNotFound(format!("Invalid config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;

        let device = Device::Cpu;
        // Weights are read-only for the lifetime of the mapping
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path.to_path_buf()], DType::F32, &device)?
        };
        let model = BertModel::load(vb, &config)?;

        let info = ModelInfo {
            name: name.to_string(),
            dimension: shape.hidden_size,
            max_sequence_length: shape.sequence_limit(),
        };
        info!(
            model = %info.name,
            dim = info.dimension,
            max_seq = info.max_sequence_length,
            "Semantic model loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            shape,
            info,
        })
    }

    /// Average token states, ignoring padding.
    fn mean_pool(&self, states: &Tensor, mask: &Tensor) -> Result<Tensor, EmbeddingError> {
        let mask = mask
            .unsqueeze(2)?
            .broadcast_as(states.shape())?
            .to_dtype(DType::F32)?;
        let summed = states.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        Ok(summed.broadcast_div(&counts)?)
    }
}

impl EmbeddingModel for CandleEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| EmbeddingError::InvalidInput("empty model output".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenizer(e.to_string()))?;
        let batch = PaddedBatch::from_encodings(&encodings, self.shape.sequence_limit());
        debug!(texts = batch.rows, tokens = batch.len, "Embedding batch");

        let dims = (batch.rows, batch.len);
        let input_ids = Tensor::from_vec(batch.ids, dims, &self.device)?;
        let attention_mask = Tensor::from_vec(batch.mask, dims, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;

        let states = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled: Vec<Vec<f32>> = self.mean_pool(&states, &attention_mask)?.to_vec2()?;

        Ok(pooled.into_iter().map(Embedding::new).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINILM_CONFIG: &str = r#"{
        "architectures": ["BertModel"],
        "hidden_size": 384,
        "num_hidden_layers": 6,
        "max_position_embeddings": 512
    }"#;

    #[test]
    fn test_shape_from_minilm_config() {
        let shape = EncoderShape::from_json(MINILM_CONFIG).unwrap();
        assert_eq!(shape.hidden_size, 384);
        assert_eq!(shape.sequence_limit(), MAX_SEQ_LENGTH);
    }

    #[test]
    fn test_shape_follows_cached_config() {
        let temp = tempfile::TempDir::new().unwrap();
        let cache = ModelCache::new(temp.path(), "sentence-transformers/all-mpnet-base-v2");
        std::fs::create_dir_all(cache.model_dir()).unwrap();
        std::fs::write(
            cache.file_path("config.json"),
            r#"{"hidden_size": 768, "max_position_embeddings": 128}"#,
        )
        .unwrap();

        let json = std::fs::read_to_string(cache.file_path("config.json")).unwrap();
        let shape = EncoderShape::from_json(&json).unwrap();
        assert_eq!(shape.hidden_size, 768);
        assert_eq!(shape.sequence_limit(), 128);
    }

    #[test]
    fn test_shape_rejects_bad_config() {
        let err = EncoderShape::from_json(r#"{"num_hidden_layers": 6}"#).unwrap_err();
        assert_eq!(err.kind(), sketch_types::ErrorKind::Unavailable);
        assert!(EncoderShape::from_json(r#"{"hidden_size": 0}"#).is_err());
    }

    #[test]
    fn test_padded_batch_truncates_and_pads() {
        let long_ids = [101u32, 7, 8, 9, 102];
        let long_mask = [1u32; 5];
        let short_ids = [101u32, 5, 102];
        let short_mask = [1u32; 3];
        let rows = [
            (&long_ids[..], &long_mask[..]),
            (&short_ids[..], &short_mask[..]),
        ];

        let batch = PaddedBatch::from_rows(rows.iter().copied(), 4);
        assert_eq!(batch.rows, 2);
        assert_eq!(batch.len, 4);
        assert_eq!(batch.ids, vec![101, 7, 8, 9, 101, 5, 102, 0]);
        assert_eq!(batch.mask, vec![1, 1, 1, 1, 1, 1, 1, 0]);
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_default_model_embeds_with_config_dimension() {
        let embedder = CandleEmbedder::load(&ModelCache::default()).unwrap();
        assert_eq!(embedder.info().dimension, 384);
        let batch = embedder
            .embed_batch(&["pink track", "solo can", "crystal"])
            .unwrap();
        assert_eq!(batch.len(), 3);
        assert!(batch.iter().all(|e| e.dimension() == 384));
    }

    #[test]
    #[ignore = "requires model download"]
    fn test_related_shots_score_higher() {
        let embedder = CandleEmbedder::load(&ModelCache::default()).unwrap();
        let wheel = embedder.embed("a giant ferris wheel at a fairground").unwrap();
        let ride = embedder.embed("carnival ferris wheel ride").unwrap();
        let can = embedder.embed("aluminium soda can on a conveyor").unwrap();
        assert!(wheel.cosine_similarity(&ride) > wheel.cosine_similarity(&can));
        assert_eq!(wheel, embedder.embed("a giant ferris wheel at a fairground").unwrap());
    }
}
