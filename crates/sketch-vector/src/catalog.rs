//! Asset catalog loading and indexing.
//!
//! The catalog is the JSON export written by the ingestion tooling. Indexing
//! embeds every asset that lacks a usable vector and upserts all of them, with
//! their metadata as payload, into a collection.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use sketch_embeddings::EmbeddingModel;
use sketch_types::{load_json_file, Asset};
use tracing::{debug, error, info, warn};

use crate::error::VectorError;
use crate::index::{Point, VectorIndex};

/// Ordered, id-unique list of assets.
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    assets: Vec<Asset>,
}

impl AssetCatalog {
    /// Load a catalog file holding a JSON array of assets.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let assets: Vec<Asset> = load_json_file(path.as_ref(), "asset catalog")?;
        let catalog = Self::from_assets(assets)?;
        info!(
            path = %path.as_ref().display(),
            assets = catalog.len(),
            "Loaded asset catalog"
        );
        Ok(catalog)
    }

    /// Build a catalog, rejecting empty or repeated ids.
    pub fn from_assets(assets: Vec<Asset>) -> Result<Self, VectorError> {
        let mut seen = HashSet::new();
        for asset in &assets {
            if asset.id.trim().is_empty() {
                return Err(VectorError::Catalog("asset with empty id".into()));
            }
            if !seen.insert(asset.id.as_str()) {
                return Err(VectorError::Catalog(format!("duplicate asset id {}", asset.id)));
            }
        }
        Ok(Self { assets })
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn get(&self, id: &str) -> Option<&Asset> {
        self.assets.iter().find(|asset| asset.id == id)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Statistics from an indexing run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    /// Number of assets processed
    pub assets_processed: usize,
    /// Vectors computed by the active embedder
    pub vectors_embedded: usize,
    /// Precomputed catalog vectors used as-is
    pub vectors_reused: usize,
    /// Assets that could not be indexed
    pub errors: usize,
}

impl IndexingStats {
    /// Merge another stats into this one
    pub fn merge(&mut self, other: &IndexingStats) {
        self.assets_processed += other.assets_processed;
        self.vectors_embedded += other.vectors_embedded;
        self.vectors_reused += other.vectors_reused;
        self.errors += other.errors;
    }

    pub fn indexed(&self) -> usize {
        self.vectors_embedded + self.vectors_reused
    }
}

/// Catalog indexer configuration
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Assets embedded and upserted per request
    pub batch_size: usize,
    /// Whether to continue after a failed batch
    pub continue_on_error: bool,
    /// Drop and recreate the collection before indexing
    pub reset: bool,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            continue_on_error: true,
            reset: false,
        }
    }
}

/// Embeds catalog assets and upserts them into a collection.
pub struct CatalogIndexer {
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    config: IndexerConfig,
}

impl CatalogIndexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        index: Arc<dyn VectorIndex>,
        config: IndexerConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            config,
        }
    }

    /// Index the whole catalog into `collection`.
    ///
    /// The collection is created with the embedder's dimension. A batch that
    /// fails is counted in `errors` and skipped when `continue_on_error` is
    /// set; collection setup failures always propagate.
    pub async fn index_catalog(
        &self,
        collection: &str,
        catalog: &AssetCatalog,
    ) -> Result<IndexingStats, VectorError> {
        let dimension = self.embedder.info().dimension;

        if self.config.reset {
            self.index.reset_collection(collection, dimension).await?;
        } else {
            self.index.ensure_collection(collection, dimension).await?;
        }

        let mut stats = IndexingStats::default();
        if catalog.is_empty() {
            debug!("No assets to index");
            return Ok(stats);
        }

        info!(
            count = catalog.len(),
            collection,
            backend = self.index.backend(),
            "Indexing asset catalog"
        );

        for batch in catalog.assets().chunks(self.config.batch_size.max(1)) {
            match self.process_batch(collection, batch, dimension).await {
                Ok(batch_stats) => stats.merge(&batch_stats),
                Err(e) => {
                    error!(error = %e, size = batch.len(), "Batch indexing failed");
                    if !self.config.continue_on_error {
                        return Err(e);
                    }
                    stats.assets_processed += batch.len();
                    stats.errors += batch.len();
                }
            }
        }

        info!(
            processed = stats.assets_processed,
            embedded = stats.vectors_embedded,
            reused = stats.vectors_reused,
            errors = stats.errors,
            "Catalog indexing complete"
        );

        Ok(stats)
    }

    async fn process_batch(
        &self,
        collection: &str,
        batch: &[Asset],
        dimension: usize,
    ) -> Result<IndexingStats, VectorError> {
        let mut stats = IndexingStats {
            assets_processed: batch.len(),
            ..Default::default()
        };

        // Precomputed vectors are only trusted when they match the embedder
        let to_embed: Vec<String> = batch
            .iter()
            .filter(|asset| asset.vector.len() != dimension)
            .map(|asset| asset.embedding_text())
            .collect();

        let embedded = if to_embed.is_empty() {
            Vec::new()
        } else {
            let embedder = self.embedder.clone();
            tokio::task::spawn_blocking(move || embedder.embed_texts(&to_embed))
                .await
                .map_err(|e| VectorError::Index(format!("embedding task failed: {}", e)))??
        };
        let mut embedded = embedded.into_iter();

        let mut points = Vec::with_capacity(batch.len());
        for asset in batch {
            let vector = if asset.vector.len() == dimension {
                stats.vectors_reused += 1;
                asset.vector.clone()
            } else {
                if !asset.vector.is_empty() {
                    warn!(
                        asset = %asset.id,
                        expected = dimension,
                        actual = asset.vector.len(),
                        "Catalog vector has wrong dimension, re-embedding"
                    );
                }
                stats.vectors_embedded += 1;
                embedded
                    .next()
                    .ok_or_else(|| VectorError::Index("embedder returned too few vectors".into()))?
                    .into_vec()
            };
            let payload = serde_json::to_value(asset.without_vector())?;
            points.push(Point::new(asset.id.clone(), vector, payload));
        }

        self.index.upsert_batch(collection, points).await?;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brute::BruteForceIndex;
    use sketch_embeddings::ToyEmbedder;
    use std::io::Write;

    fn sample_assets() -> Vec<Asset> {
        vec![
            Asset::new("ring_basic", "Ring")
                .with_tags(["ferris", "wheel"])
                .with_preview_url("https://x/ring.png"),
            Asset::new("can_red", "Red can").with_tags(["soda", "can"]),
            Asset::new("crystal_basic", "Crystal"),
        ]
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut assets = sample_assets();
        assets.push(Asset::new("ring_basic", "Another ring"));
        let err = AssetCatalog::from_assets(assets).unwrap_err();
        assert_eq!(err.kind(), sketch_types::ErrorKind::Data);
    }

    #[test]
    fn test_load_catalog_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "ring_basic", "name": "Ring", "freepik_url": "https://market/ring"}},
                {{"id": "can_red", "name": "Red can", "embedding": [1.0, 0.0]}}]"#
        )
        .unwrap();
        let catalog = AssetCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get("ring_basic").unwrap().provenance.source_url.as_deref(),
            Some("https://market/ring")
        );
        assert_eq!(catalog.get("can_red").unwrap().vector, vec![1.0, 0.0]);
    }

    #[test]
    fn test_missing_and_malformed_catalog() {
        let err = AssetCatalog::load("/no/such/catalog.json").unwrap_err();
        assert_eq!(err.kind(), sketch_types::ErrorKind::NotFound);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        let err = AssetCatalog::load(file.path()).unwrap_err();
        assert_eq!(err.kind(), sketch_types::ErrorKind::Data);
    }

    #[tokio::test]
    async fn test_index_catalog_embeds_and_reuses() {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(ToyEmbedder::default());
        let index = Arc::new(BruteForceIndex::new());

        let mut assets = sample_assets();
        // Matching dimension: reused. Wrong dimension: re-embedded.
        assets[1].vector = vec![0.5; 8];
        assets[2].vector = vec![1.0; 384];
        let catalog = AssetCatalog::from_assets(assets).unwrap();

        let indexer = CatalogIndexer::new(embedder.clone(), index.clone(), IndexerConfig::default());
        let stats = indexer.index_catalog("assets", &catalog).await.unwrap();

        assert_eq!(stats.assets_processed, 3);
        assert_eq!(stats.vectors_reused, 1);
        assert_eq!(stats.vectors_embedded, 2);
        assert_eq!(stats.errors, 0);

        let info = index.collection_info("assets").await.unwrap();
        assert_eq!(info.dimension, 8);
        assert_eq!(info.points, 3);

        // Payload carries the asset metadata but not the vector
        let query = embedder
            .embed(&catalog.get("ring_basic").unwrap().embedding_text())
            .unwrap();
        let hits = index.query("assets", &query.values, 1).await.unwrap();
        assert_eq!(hits[0].id, "ring_basic");
        assert_eq!(hits[0].payload["previewUrl"], "https://x/ring.png");
        assert!(hits[0].payload.get("vector").is_none());
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent() {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(ToyEmbedder::default());
        let index = Arc::new(BruteForceIndex::new());
        let catalog = AssetCatalog::from_assets(sample_assets()).unwrap();
        let indexer = CatalogIndexer::new(embedder, index.clone(), IndexerConfig::default());

        indexer.index_catalog("assets", &catalog).await.unwrap();
        indexer.index_catalog("assets", &catalog).await.unwrap();
        assert_eq!(index.collection_info("assets").await.unwrap().points, 3);
    }

    #[tokio::test]
    async fn test_dimension_conflict_propagates() {
        let index = Arc::new(BruteForceIndex::new());
        index.ensure_collection("assets", 384).await.unwrap();
        let indexer = CatalogIndexer::new(
            Arc::new(ToyEmbedder::default()),
            index.clone(),
            IndexerConfig::default(),
        );
        let catalog = AssetCatalog::from_assets(sample_assets()).unwrap();
        let err = indexer.index_catalog("assets", &catalog).await.unwrap_err();
        assert!(matches!(err, VectorError::DimensionMismatch { .. }));

        // Reset recreates with the embedder's dimension
        let indexer = CatalogIndexer::new(
            Arc::new(ToyEmbedder::default()),
            index.clone(),
            IndexerConfig {
                reset: true,
                ..Default::default()
            },
        );
        indexer.index_catalog("assets", &catalog).await.unwrap();
        assert_eq!(index.collection_info("assets").await.unwrap().dimension, 8);
    }
}
