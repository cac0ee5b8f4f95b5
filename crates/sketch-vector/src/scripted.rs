//! Index wrapper with scripted delays and failures.
//!
//! Wraps another index and, for chosen query vectors, sleeps or fails before
//! delegating. Used to exercise partial-failure and timeout handling.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::VectorError;
use crate::index::{CollectionInfo, Point, QueryHit, VectorIndex};

#[derive(Debug, Clone)]
enum Script {
    Delay(Duration),
    Fail(String),
}

/// Scripted index for tests and demos.
pub struct ScriptedIndex {
    inner: Arc<dyn VectorIndex>,
    scripts: Vec<(Vec<f32>, Script)>,
    unavailable: bool,
}

impl ScriptedIndex {
    pub fn new(inner: Arc<dyn VectorIndex>) -> Self {
        Self {
            inner,
            scripts: Vec::new(),
            unavailable: false,
        }
    }

    /// Sleep before answering a query with exactly this vector.
    pub fn with_delay(mut self, vector: Vec<f32>, delay: Duration) -> Self {
        self.scripts.push((vector, Script::Delay(delay)));
        self
    }

    /// Fail a query with exactly this vector as unavailable.
    pub fn with_failure(mut self, vector: Vec<f32>, message: impl Into<String>) -> Self {
        self.scripts.push((vector, Script::Fail(message.into())));
        self
    }

    /// Fail every call as unavailable.
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    fn check_available(&self) -> Result<(), VectorError> {
        if self.unavailable {
            return Err(VectorError::Unavailable("scripted outage".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    fn backend(&self) -> &'static str {
        "scripted"
    }

    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), VectorError> {
        self.check_available()?;
        self.inner.ensure_collection(name, dimension).await
    }

    async fn reset_collection(&self, name: &str, dimension: usize) -> Result<(), VectorError> {
        self.check_available()?;
        self.inner.reset_collection(name, dimension).await
    }

    async fn upsert_batch(&self, name: &str, points: Vec<Point>) -> Result<(), VectorError> {
        self.check_available()?;
        self.inner.upsert_batch(name, points).await
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>, VectorError> {
        self.check_available()?;
        for (target, script) in &self.scripts {
            if target.as_slice() == vector {
                match script {
                    Script::Delay(delay) => tokio::time::sleep(*delay).await,
                    Script::Fail(message) => {
                        return Err(VectorError::Unavailable(message.clone()))
                    }
                }
            }
        }
        self.inner.query(name, vector, k).await
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, VectorError> {
        self.check_available()?;
        self.inner.collection_info(name).await
    }
}
