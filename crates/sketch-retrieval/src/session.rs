//! Retrieval session: the embedder, index and collection used for one run.
//!
//! Handles are acquired once when the session opens. If the semantic embedder
//! or the networked index is unavailable and fallback is enabled, the session
//! switches to the toy embedder with a brute-force index seeded from the asset
//! catalog. That choice is made at open time and never revisited.

use std::sync::Arc;

use sketch_embeddings::{load_embedder, EmbeddingModel, ToyEmbedder};
use sketch_types::{ErrorKind, IndexBackendKind, Settings};
use sketch_vector::{
    AssetCatalog, BruteForceIndex, CatalogIndexer, CollectionInfo, IndexerConfig, QdrantIndex,
    VectorError, VectorIndex,
};
use tracing::{info, warn};

use crate::error::RetrievalError;
use crate::retriever::{Retriever, RetrieverConfig};

/// Which provider pair a session runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Configured embedder and index
    Primary,
    /// Toy embedder and in-process index
    Fallback,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionMode::Primary => "primary",
            SessionMode::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Embedder and index handles shared by every query of a run.
pub struct RetrievalSession {
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    mode: SessionMode,
    fallback_reason: Option<String>,
}

impl RetrievalSession {
    /// Session over explicit handles.
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            mode: SessionMode::Primary,
            fallback_reason: None,
        }
    }

    /// Open the session described by the settings.
    ///
    /// Configuration and not-found errors are returned as-is. Unavailability
    /// switches to the fallback pair when `fallback.enabled` is set.
    pub async fn open(settings: &Settings) -> Result<Self, RetrievalError> {
        match Self::open_primary(settings).await {
            Ok(session) => Ok(session),
            Err(e) if e.kind() == ErrorKind::Unavailable && settings.fallback.enabled => {
                warn!(error = %e, "Primary retrieval providers unavailable, using fallback");
                Self::open_fallback(settings, e.to_string()).await
            }
            Err(e) => Err(e),
        }
    }

    async fn open_primary(settings: &Settings) -> Result<Self, RetrievalError> {
        let embedding = settings.embedding.clone();
        let embedder = tokio::task::spawn_blocking(move || load_embedder(&embedding))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))??;
        let dimension = embedder.info().dimension;
        let collection = settings.index.collection.clone();

        let index: Arc<dyn VectorIndex> = match settings.index.backend {
            IndexBackendKind::Qdrant => {
                let index = QdrantIndex::from_settings(&settings.index)?;
                index.probe().await?;
                let info = index.collection_info(&collection).await?;
                check_dimension(&info, dimension)?;
                Arc::new(index)
            }
            IndexBackendKind::Memory => {
                let catalog = load_catalog(settings)?;
                seeded_index(embedder.clone(), &collection, &catalog).await?
            }
        };

        info!(
            mode = "primary",
            embedder = %embedder.info().name,
            backend = index.backend(),
            collection = %collection,
            "Retrieval session opened"
        );

        Ok(Self::new(embedder, index, collection))
    }

    async fn open_fallback(settings: &Settings, reason: String) -> Result<Self, RetrievalError> {
        if settings.index.catalog_path.is_none() {
            return Err(RetrievalError::Session(format!(
                "fallback needs index.catalog_path ({})",
                reason
            )));
        }
        let catalog = load_catalog(settings)?;
        let embedder: Arc<dyn EmbeddingModel> =
            Arc::new(ToyEmbedder::new(settings.embedding.toy_dimension)?);
        let collection = settings.index.collection.clone();
        let index = seeded_index(embedder.clone(), &collection, &catalog).await?;

        info!(
            mode = "fallback",
            embedder = %embedder.info().name,
            assets = catalog.len(),
            collection = %collection,
            "Retrieval session opened"
        );

        Ok(Self {
            embedder,
            index,
            collection,
            mode: SessionMode::Fallback,
            fallback_reason: Some(reason),
        })
    }

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Why the primary providers were not used, in fallback mode
    pub fn fallback_reason(&self) -> Option<&str> {
        self.fallback_reason.as_deref()
    }

    pub fn embedder(&self) -> Arc<dyn EmbeddingModel> {
        self.embedder.clone()
    }

    pub fn index(&self) -> Arc<dyn VectorIndex> {
        self.index.clone()
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Retriever bound to this session's handles.
    pub fn retriever(&self, config: RetrieverConfig) -> Retriever {
        Retriever::new(
            self.embedder.clone(),
            self.index.clone(),
            self.collection.clone(),
            config,
        )
    }

    /// Current state of the session's collection.
    pub async fn collection_info(&self) -> Result<CollectionInfo, RetrievalError> {
        Ok(self.index.collection_info(&self.collection).await?)
    }

    /// Release the handles. Retrievers created from the session keep their
    /// own references until they are dropped.
    pub fn close(self) {
        info!(mode = %self.mode, collection = %self.collection, "Retrieval session closed");
    }
}

fn check_dimension(info: &CollectionInfo, dimension: usize) -> Result<(), RetrievalError> {
    if info.dimension != dimension {
        return Err(VectorError::DimensionMismatch {
            expected: info.dimension,
            actual: dimension,
        }
        .into());
    }
    Ok(())
}

fn load_catalog(settings: &Settings) -> Result<AssetCatalog, RetrievalError> {
    let path = settings.catalog_path().ok_or_else(|| {
        RetrievalError::Session("index.catalog_path is required for the memory backend".into())
    })?;
    Ok(AssetCatalog::load(path)?)
}

async fn seeded_index(
    embedder: Arc<dyn EmbeddingModel>,
    collection: &str,
    catalog: &AssetCatalog,
) -> Result<Arc<dyn VectorIndex>, RetrievalError> {
    let index: Arc<dyn VectorIndex> = Arc::new(BruteForceIndex::new());
    let stats = CatalogIndexer::new(embedder, index.clone(), IndexerConfig::default())
        .index_catalog(collection, catalog)
        .await?;
    if stats.errors > 0 {
        warn!(errors = stats.errors, "Some catalog assets could not be indexed");
    }
    Ok(index)
}
