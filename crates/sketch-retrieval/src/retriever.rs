//! Shot-to-asset retriever.
//!
//! Embeds a shot description, queries the asset collection and turns index
//! hits into ranked [`MatchResult`]s. Batches run with bounded concurrency and
//! a per-shot timeout; one shot failing never affects its siblings.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use sketch_embeddings::{Embedding, EmbeddingModel};
use sketch_types::{Asset, RetrievalSettings};
use sketch_vector::{QueryHit, VectorIndex};
use tracing::{debug, info, warn};

use crate::batch::BatchSummary;
use crate::error::RetrievalError;
use crate::types::{MatchResult, ShotMatches};

/// Round a similarity score to 4 decimal places.
pub fn round_score(score: f64) -> f64 {
    (score * 10_000.0).round() / 10_000.0
}

/// Retriever configuration
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Matches kept per shot in batch calls
    pub top_k: usize,
    /// Maximum shots queried at once
    pub max_concurrency: usize,
    /// Timeout for one shot (embed + query)
    pub query_timeout: Duration,
    /// Directory holding `{id}_{name}.png` previews
    pub previews_dir: Option<PathBuf>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        let settings = RetrievalSettings::default();
        Self {
            top_k: settings.top_k,
            max_concurrency: settings.max_concurrency,
            query_timeout: settings.query_timeout(),
            previews_dir: None,
        }
    }
}

impl RetrieverConfig {
    pub fn from_settings(settings: &RetrievalSettings, previews_dir: Option<PathBuf>) -> Self {
        Self {
            top_k: settings.top_k,
            max_concurrency: settings.max_concurrency,
            query_timeout: settings.query_timeout(),
            previews_dir,
        }
    }
}

/// Asset retriever over one embedder, index and collection.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingModel>,
    index: Arc<dyn VectorIndex>,
    collection: String,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingModel>,
        index: Arc<dyn VectorIndex>,
        collection: impl Into<String>,
        config: RetrieverConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            collection: collection.into(),
            config,
        }
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Embed on the blocking pool; model inference is CPU bound.
    async fn embed(&self, text: &str) -> Result<Embedding, RetrievalError> {
        let embedder = self.embedder.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || embedder.embed(&text))
            .await
            .map_err(|e| RetrievalError::Task(e.to_string()))?
            .map_err(RetrievalError::from)
    }

    /// Rank assets for a free-text query.
    ///
    /// Scores are rounded to 4 decimals and the list is ordered by rounded
    /// score descending, then asset id ascending, with at most `top_k` items.
    pub async fn search(
        &self,
        query_text: &str,
        top_k: usize,
    ) -> Result<Vec<MatchResult>, RetrievalError> {
        if query_text.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let embedding = self.embed(query_text).await?;
        let hits = self
            .index
            .query(&self.collection, &embedding.values, top_k)
            .await?;

        let mut matches = hits
            .into_iter()
            .map(|hit| self.decode(hit))
            .collect::<Result<Vec<_>, _>>()?;

        matches.sort_by(|a, b| match b.score.total_cmp(&a.score) {
            Ordering::Equal => a.asset.id.cmp(&b.asset.id),
            other => other,
        });
        matches.truncate(top_k);
        for (rank, m) in matches.iter_mut().enumerate() {
            m.rank = rank;
        }

        debug!(query = %query_text, matches = matches.len(), "Search complete");
        Ok(matches)
    }

    fn decode(&self, hit: QueryHit) -> Result<MatchResult, RetrievalError> {
        let mut payload = hit.payload;
        // Points indexed without an id field still decode
        if let serde_json::Value::Object(map) = &mut payload {
            map.entry("id")
                .or_insert_with(|| serde_json::Value::String(hit.id.clone()));
        }
        let mut asset: Asset =
            serde_json::from_value(payload).map_err(|e| RetrievalError::Payload {
                id: hit.id.clone(),
                message: e.to_string(),
            })?;
        asset.vector.clear();

        if asset.provenance.local_preview_path.is_none() {
            asset.provenance.local_preview_path = self.local_preview(&asset);
        }

        Ok(MatchResult::new(asset, round_score(hit.score)))
    }

    /// `{id}_{lowercased name, spaces as _}.png` in the previews dir, if present.
    fn local_preview(&self, asset: &Asset) -> Option<String> {
        let dir = self.config.previews_dir.as_ref()?;
        let filename = format!(
            "{}_{}.png",
            asset.id,
            asset.name.to_lowercase().replace(' ', "_")
        );
        let path = dir.join(filename);
        path.exists().then(|| path.to_string_lossy().into_owned())
    }

    /// Search for one shot description.
    pub async fn search_shot(
        &self,
        shot_description: &str,
        top_k: usize,
    ) -> Result<ShotMatches, RetrievalError> {
        let matches = self.search(shot_description, top_k).await?;
        Ok(ShotMatches::success(shot_description, matches))
    }

    /// Search every shot description.
    ///
    /// The result has one entry per input, in input order. A shot that fails
    /// or times out gets an empty match list and an error annotation; the
    /// others are unaffected.
    pub async fn search_multiple_shots(&self, shots: &[String], top_k: usize) -> Vec<ShotMatches> {
        let start = Instant::now();
        let timeout = self.config.query_timeout;
        let mut slots: Vec<Option<ShotMatches>> = vec![None; shots.len()];

        let mut results = stream::iter(shots.iter().enumerate())
            .map(|(i, description)| async move {
                let outcome =
                    tokio::time::timeout(timeout, self.search_shot(description, top_k)).await;
                let shot = match outcome {
                    Ok(Ok(shot)) => shot,
                    Ok(Err(e)) => {
                        warn!(shot = i, error = %e, "Shot retrieval failed");
                        ShotMatches::failure(description.as_str(), e.to_string())
                    }
                    Err(_) => {
                        warn!(shot = i, timeout_ms = timeout.as_millis() as u64, "Shot retrieval timed out");
                        ShotMatches::failure(
                            description.as_str(),
                            RetrievalError::Timeout(timeout).to_string(),
                        )
                    }
                };
                (i, shot)
            })
            .buffer_unordered(self.config.max_concurrency.max(1));

        while let Some((i, shot)) = results.next().await {
            slots[i] = Some(shot);
        }

        let batch: Vec<ShotMatches> = slots
            .into_iter()
            .zip(shots.iter())
            .map(|(slot, description)| {
                slot.unwrap_or_else(|| ShotMatches::failure(description.as_str(), "not executed"))
            })
            .collect();

        let summary = BatchSummary::from_results(&batch);
        if summary.is_partial() {
            warn!(
                failed = summary.failed.len(),
                total = summary.total,
                shots = ?summary.failed,
                "Partial retrieval"
            );
        }
        info!(
            total = summary.total,
            resolved = summary.resolved,
            empty = summary.empty.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch retrieval complete"
        );

        batch
    }

    /// Batch search with the configured `top_k`.
    pub async fn search_batch(&self, shots: &[String]) -> Vec<ShotMatches> {
        self.search_multiple_shots(shots, self.config.top_k).await
    }
}
