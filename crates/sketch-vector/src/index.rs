//! Vector index trait and types.
//!
//! An index holds named collections of fixed-dimension vectors, each point
//! carrying a JSON payload. Similarity is cosine; results are ordered by score
//! descending with ties broken by ascending point id.

use std::cmp::Ordering;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::VectorError;

/// A vector with its id and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: Value,
}

impl Point {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, payload: Value) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
        }
    }
}

/// One result of a similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    /// Cosine similarity (higher = more similar)
    pub score: f64,
    pub payload: Value,
}

/// Collection statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimension: usize,
    pub points: u64,
}

/// Order hits by score descending, then id ascending.
pub fn rank_hits(hits: &mut [QueryHit]) {
    hits.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.id.cmp(&b.id),
        other => other,
    });
}

/// Trait for vector indexes.
///
/// Implementations must be thread-safe: a batch issues concurrent queries
/// against one shared handle.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short backend name for logs and status output
    fn backend(&self) -> &'static str;

    /// Create the collection if absent.
    ///
    /// An existing collection with a different dimension is a
    /// `DimensionMismatch`; it is never silently re-created.
    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), VectorError>;

    /// Drop the collection (if present) and create it empty.
    async fn reset_collection(&self, name: &str, dimension: usize) -> Result<(), VectorError>;

    /// Insert or replace points by id.
    async fn upsert_batch(&self, name: &str, points: Vec<Point>) -> Result<(), VectorError>;

    /// Insert or replace one point.
    async fn upsert(&self, name: &str, point: Point) -> Result<(), VectorError> {
        self.upsert_batch(name, vec![point]).await
    }

    /// At most `k` nearest points, best first.
    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>, VectorError>;

    /// Dimension and point count of a collection.
    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, VectorError>;
}
