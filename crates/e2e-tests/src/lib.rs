//! End-to-end test infrastructure for sketch-search.
//!
//! Provides a shared TestHarness and fixtures for tests covering the
//! query -> retrieve -> assign pipeline over the in-process index.

use std::path::PathBuf;
use std::sync::Arc;

use sketch_embeddings::{EmbeddingModel, ToyEmbedder};
use sketch_retrieval::{MatchResult, RetrievalSession};
use sketch_types::{
    Asset, EmbeddingProviderKind, IndexBackendKind, SceneElement, SceneGraph, Settings, Shot,
};
use sketch_vector::{AssetCatalog, BruteForceIndex, CatalogIndexer, IndexerConfig, VectorIndex};

/// Collection name used by every harness.
pub const COLLECTION: &str = "assets";

/// Shared test harness for E2E tests.
///
/// Holds a temp directory with the catalog written to disk and settings
/// pointing at it, so both explicit sessions and `RetrievalSession::open`
/// can be exercised.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Catalog file written from [`test_catalog`]
    pub catalog_path: PathBuf,
    /// Settings for the toy embedder over the memory backend
    pub settings: Settings,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let catalog_path = temp_dir.path().join("assets.json");
        let json = serde_json::to_string_pretty(test_catalog().assets())
            .expect("Failed to serialize catalog");
        std::fs::write(&catalog_path, json).expect("Failed to write catalog");

        let mut settings = Settings::default();
        settings.embedding.provider = EmbeddingProviderKind::Toy;
        settings.index.backend = IndexBackendKind::Memory;
        settings.index.collection = COLLECTION.to_string();
        settings.index.catalog_path = Some(catalog_path.to_string_lossy().into_owned());

        Self {
            _temp_dir: temp_dir,
            catalog_path,
            settings,
        }
    }

    /// Path inside the harness temp dir.
    pub fn path(&self, name: &str) -> PathBuf {
        self._temp_dir.path().join(name)
    }

    /// Settings that point at an unreachable Qdrant.
    pub fn unreachable_qdrant_settings(&self) -> Settings {
        let mut settings = self.settings.clone();
        settings.embedding.provider = EmbeddingProviderKind::Toy;
        settings.index.backend = IndexBackendKind::Qdrant;
        settings.index.url = "http://127.0.0.1:9".to_string();
        settings.index.request_timeout_ms = 200;
        settings
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Small catalog covering every URL priority.
pub fn test_catalog() -> AssetCatalog {
    let mut local_only = Asset::new("crystal_basic", "Crystal").with_tags(["glass", "crystal"]);
    local_only.provenance.local_preview_path = Some("previews/crystal_basic_crystal.png".into());

    let mut source_only = Asset::new("sphere_metal", "Metal Sphere").with_tags(["chrome"]);
    source_only.provenance.source_url = Some("https://market/sphere".into());

    AssetCatalog::from_assets(vec![
        Asset::new("ring_basic", "Ring")
            .with_tags(["ferris", "wheel", "ring"])
            .with_preview_url("https://x/a.png"),
        Asset::new("can_red", "Red Can")
            .with_tags(["soda", "can"])
            .with_preview_url("https://x/can.png"),
        local_only,
        source_only,
    ])
    .expect("valid catalog")
}

/// Brute-force index seeded with [`test_catalog`] through the toy embedder.
pub async fn seeded_index(embedder: Arc<dyn EmbeddingModel>) -> Arc<BruteForceIndex> {
    let index = Arc::new(BruteForceIndex::new());
    CatalogIndexer::new(embedder, index.clone(), IndexerConfig::default())
        .index_catalog(COLLECTION, &test_catalog())
        .await
        .expect("Failed to index test catalog");
    index
}

/// Session over the toy embedder and a seeded brute-force index.
pub async fn toy_session() -> RetrievalSession {
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(ToyEmbedder::default());
    let index = seeded_index(embedder.clone()).await;
    let index: Arc<dyn VectorIndex> = index;
    RetrievalSession::new(embedder, index, COLLECTION)
}

/// Three-shot scene: hero, one eligible wheel, one ineligible tree in shot 1.
pub fn three_shot_scene() -> SceneGraph {
    let mut tree = SceneElement::new("tree", "tree");
    tree.asset = Some("https://stale/tree.png".into());

    let mut wheel = SceneElement::new("wheelRight", "ferris-wheel");
    wheel
        .extra
        .insert("presetPosition".into(), serde_json::json!("pos-wheel-right"));

    SceneGraph::new(vec![
        Shot::with_elements(0, vec![SceneElement::new("bg", "background")]),
        Shot::with_elements(
            1,
            vec![SceneElement::new("product", "bottle"), wheel, tree],
        ),
        Shot::with_elements(
            2,
            vec![
                SceneElement::new("can1", "solo-can"),
                SceneElement::new("can2", "can-on-track"),
            ],
        ),
    ])
}

/// A single match with a fixed score.
pub fn fixed_match(asset: Asset, score: f64) -> MatchResult {
    MatchResult::new(asset, score)
}
