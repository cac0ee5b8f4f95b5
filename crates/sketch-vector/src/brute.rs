//! In-process brute-force index.
//!
//! Scores every point of a collection against the query. Used when the
//! networked index is unavailable and for tests; catalogs here are small.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use sketch_embeddings::l2_normalize;
use tracing::debug;

use crate::error::VectorError;
use crate::index::{rank_hits, CollectionInfo, Point, QueryHit, VectorIndex};

#[derive(Debug)]
struct Collection {
    dimension: usize,
    /// Keyed by point id; vectors stored normalized
    points: BTreeMap<String, (Vec<f32>, Value)>,
}

impl Collection {
    fn new(dimension: usize) -> Self {
        Self {
            dimension,
            points: BTreeMap::new(),
        }
    }

    fn check_dimension(&self, actual: usize) -> Result<(), VectorError> {
        if actual != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual,
            });
        }
        Ok(())
    }
}

/// Brute-force cosine index held in memory.
#[derive(Debug, Default)]
pub struct BruteForceIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl BruteForceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Collection>>, VectorError> {
        self.collections
            .read()
            .map_err(|e| VectorError::Index(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>>, VectorError> {
        self.collections
            .write()
            .map_err(|e| VectorError::Index(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl VectorIndex for BruteForceIndex {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), VectorError> {
        if dimension == 0 {
            return Err(VectorError::Config("collection dimension must be > 0".into()));
        }
        let mut collections = self.write()?;
        match collections.get(name) {
            Some(existing) => existing.check_dimension(dimension),
            None => {
                debug!(collection = name, dim = dimension, "Creating in-memory collection");
                collections.insert(name.to_string(), Collection::new(dimension));
                Ok(())
            }
        }
    }

    async fn reset_collection(&self, name: &str, dimension: usize) -> Result<(), VectorError> {
        if dimension == 0 {
            return Err(VectorError::Config("collection dimension must be > 0".into()));
        }
        self.write()?
            .insert(name.to_string(), Collection::new(dimension));
        Ok(())
    }

    async fn upsert_batch(&self, name: &str, points: Vec<Point>) -> Result<(), VectorError> {
        let mut collections = self.write()?;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| VectorError::CollectionNotFound(name.to_string()))?;

        // Validate the whole batch before touching the collection
        for point in &points {
            collection.check_dimension(point.vector.len())?;
        }
        for point in points {
            collection
                .points
                .insert(point.id, (l2_normalize(point.vector), point.payload));
        }
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>, VectorError> {
        let collections = self.read()?;
        let collection = collections
            .get(name)
            .ok_or_else(|| VectorError::CollectionNotFound(name.to_string()))?;
        collection.check_dimension(vector.len())?;

        if k == 0 {
            return Ok(Vec::new());
        }

        let query = l2_normalize(vector.to_vec());
        let mut hits: Vec<QueryHit> = collection
            .points
            .iter()
            .map(|(id, (stored, payload))| QueryHit {
                id: id.clone(),
                score: dot(&query, stored) as f64,
                payload: payload.clone(),
            })
            .collect();

        rank_hits(&mut hits);
        hits.truncate(k);
        Ok(hits)
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, VectorError> {
        let collections = self.read()?;
        let collection = collections
            .get(name)
            .ok_or_else(|| VectorError::CollectionNotFound(name.to_string()))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            dimension: collection.dimension,
            points: collection.points.len() as u64,
        })
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
