//! Command implementations for the sketch binary.
//!
//! Handles:
//! - retrieve: shot queries -> match batch
//! - assign: scene graph + match batch -> scene graph with assets
//! - run: both, over one retrieval session
//! - index: asset catalog -> vector index
//! - status: report the session a run would open

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use sketch_assign::{AssetAssigner, AssignmentPolicy, AssignmentStats};
use sketch_embeddings::load_embedder;
use sketch_retrieval::{
    BatchSummary, RetrievalSession, Retriever, RetrieverConfig, ShotMatches,
};
use sketch_types::{load_json_file, IndexBackendKind, SceneGraph, Settings, ShotQueryList};
use sketch_vector::{AssetCatalog, CatalogIndexer, IndexerConfig, QdrantIndex};

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the config.
///
/// Logs go to stderr so JSON written to stdout stays clean.
pub fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Write pretty JSON to a file, or to stdout when no path is given.
fn write_json<T: Serialize>(value: &T, out: Option<&str>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            let path = Path::new(path);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Wrote output");
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Retriever over the session, with `--top-k` applied.
fn retriever_for(
    session: &RetrievalSession,
    settings: &Settings,
    top_k: Option<usize>,
) -> Retriever {
    let mut config = RetrieverConfig::from_settings(&settings.retrieval, settings.previews_dir());
    if let Some(top_k) = top_k {
        config.top_k = top_k;
    }
    session.retriever(config)
}

async fn open_session(settings: &Settings) -> Result<RetrievalSession> {
    let session = RetrievalSession::open(settings)
        .await
        .map_err(sketch_types::SketchError::from)
        .context("Failed to open retrieval session")?;
    if let Some(reason) = session.fallback_reason() {
        warn!(reason, "Running on fallback embedder and in-process index");
    }
    Ok(session)
}

fn report_batch(summary: &BatchSummary) {
    eprintln!("Retrieval: {}", summary);
    if let Some(partial) = summary.partial_error() {
        eprintln!("  {} (shots {:?})", partial, summary.failed);
    }
}

fn report_assignment(stats: &AssignmentStats) {
    eprintln!(
        "Assignment: {} shots ({} skipped), {} assigned, {} cleared, {} hero protected, {} shots without matches",
        stats.shots_processed,
        stats.shots_skipped,
        stats.assigned,
        stats.cleared,
        stats.hero_protected,
        stats.shots_without_matches
    );
}

/// Retrieve matches for every shot query.
pub async fn retrieve(
    settings: &Settings,
    queries_path: &str,
    top_k: Option<usize>,
    out: Option<&str>,
) -> Result<BatchSummary> {
    let queries = ShotQueryList::load(queries_path).context("Failed to load shot queries")?;
    let session = open_session(settings).await?;
    let retriever = retriever_for(&session, settings, top_k);

    let batch = retriever.search_batch(&queries.texts()).await;
    let summary = BatchSummary::from_results(&batch);

    write_json(&batch, out)?;
    report_batch(&summary);
    session.close();
    Ok(summary)
}

/// Merge a saved match batch into a scene graph.
pub fn assign(
    settings: &Settings,
    scene_path: &str,
    matches_path: &str,
    out: Option<&str>,
) -> Result<AssignmentStats> {
    let mut scene = SceneGraph::load(scene_path).context("Failed to load scene graph")?;
    let batch: Vec<ShotMatches> = load_json_file(Path::new(matches_path), "match batch")
        .context("Failed to load match batch")?;

    let assigner = AssetAssigner::new(AssignmentPolicy::from_settings(&settings.assignment));
    let stats = assigner.assign_batch(&mut scene, &batch);

    write_json(&scene, out)?;
    report_assignment(&stats);
    Ok(stats)
}

/// Retrieve then assign, over one session.
///
/// Inputs are read before the session opens, so a missing or malformed file
/// fails the run without touching the index.
pub async fn run(
    settings: &Settings,
    scene_path: &str,
    queries_path: &str,
    top_k: Option<usize>,
    out: Option<&str>,
    matches_out: Option<&str>,
) -> Result<(BatchSummary, AssignmentStats)> {
    let mut scene = SceneGraph::load(scene_path).context("Failed to load scene graph")?;
    let queries = ShotQueryList::load(queries_path).context("Failed to load shot queries")?;
    if queries.shots.len() != scene.shots.len() {
        warn!(
            queries = queries.shots.len(),
            shots = scene.shots.len(),
            "Query count differs from shot count; matching by position"
        );
    }

    let session = open_session(settings).await?;
    let retriever = retriever_for(&session, settings, top_k);
    let batch = retriever.search_batch(&queries.texts()).await;
    session.close();

    let summary = BatchSummary::from_results(&batch);
    if let Some(path) = matches_out {
        write_json(&batch, Some(path))?;
    }

    let assigner = AssetAssigner::new(AssignmentPolicy::from_settings(&settings.assignment));
    let stats = assigner.assign_batch(&mut scene, &batch);
    write_json(&scene, out)?;

    report_batch(&summary);
    report_assignment(&stats);
    Ok((summary, stats))
}

/// Embed and upload the catalog to the configured Qdrant collection.
pub async fn index(settings: &Settings, catalog_path: &str, reset: bool) -> Result<()> {
    if settings.index.backend == IndexBackendKind::Memory {
        bail!("the memory backend is rebuilt from index.catalog_path on every run; nothing to index");
    }

    let catalog = AssetCatalog::load(catalog_path)
        .map_err(sketch_types::SketchError::from)
        .context("Failed to load asset catalog")?;

    let embedding = settings.embedding.clone();
    let embedder = tokio::task::spawn_blocking(move || load_embedder(&embedding))
        .await?
        .map_err(sketch_types::SketchError::from)
        .context("Failed to load embedder")?;

    let index = QdrantIndex::from_settings(&settings.index).map_err(sketch_types::SketchError::from)?;
    index
        .probe()
        .await
        .map_err(sketch_types::SketchError::from)
        .with_context(|| format!("Qdrant unreachable at {}", index.base_url()))?;

    let indexer = CatalogIndexer::new(
        embedder,
        Arc::new(index),
        IndexerConfig {
            reset,
            ..Default::default()
        },
    );
    let stats = indexer
        .index_catalog(&settings.index.collection, &catalog)
        .await
        .map_err(sketch_types::SketchError::from)
        .context("Failed to index catalog")?;

    println!(
        "Indexed {} assets into '{}': {} embedded, {} reused, {} errors",
        stats.assets_processed,
        settings.index.collection,
        stats.vectors_embedded,
        stats.vectors_reused,
        stats.errors
    );
    Ok(())
}

/// Print the session a run would use.
pub async fn show_status(settings: &Settings) -> Result<()> {
    let session = open_session(settings).await?;
    let embedder = session.embedder();
    let info = embedder.info();

    println!("Sketch Search status");
    println!("  Mode:        {}", session.mode());
    if let Some(reason) = session.fallback_reason() {
        println!("  Reason:      {}", reason);
    }
    println!("  Embedder:    {} ({} dims)", info.name, info.dimension);
    println!("  Backend:     {}", session.index().backend());
    match session.collection_info().await {
        Ok(collection) => println!(
            "  Collection:  {} ({} points, {} dims)",
            collection.name, collection.points, collection.dimension
        ),
        Err(e) => println!("  Collection:  {} ({})", session.collection(), e),
    }
    println!("  Top-k:       {}", settings.retrieval.top_k);
    let policy = AssignmentPolicy::from_settings(&settings.assignment);
    println!(
        "  Eligible:    {}",
        policy.eligible_types().collect::<Vec<_>>().join(", ")
    );
    session.close();
    Ok(())
}
