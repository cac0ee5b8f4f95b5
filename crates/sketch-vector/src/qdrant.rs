//! Qdrant index over its REST API.
//!
//! Asset ids are arbitrary strings while Qdrant point ids must be integers or
//! UUIDs, so each id is mapped to a stable UUIDv5 and the original id travels
//! in the payload under `id`.

use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sketch_types::IndexSettings;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::VectorError;
use crate::index::{rank_hits, CollectionInfo, Point, QueryHit, VectorIndex};

/// Configuration for the Qdrant client.
#[derive(Debug, Clone)]
pub struct QdrantConfig {
    /// Base URL (e.g., "http://localhost:6333")
    pub base_url: String,

    /// Optional API key sent as `api-key`
    pub api_key: Option<SecretString>,

    /// Per-request timeout
    pub timeout: Duration,

    /// Maximum probe attempts before the index is declared unavailable
    pub max_retries: u32,
}

impl QdrantConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn from_settings(settings: &IndexSettings) -> Self {
        Self {
            api_key: settings
                .api_key
                .as_ref()
                .filter(|key| !key.is_empty())
                .map(|key| SecretString::from(key.clone())),
            timeout: settings.request_timeout(),
            ..Self::new(settings.url.clone())
        }
    }
}

/// Stable Qdrant point id for an asset id.
pub fn point_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes())
}

#[derive(Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Serialize)]
struct UpsertPoints {
    points: Vec<QdrantPoint>,
}

#[derive(Serialize)]
struct QdrantPoint {
    id: String,
    vector: Vec<f32>,
    payload: Value,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: Value,
    score: f64,
    #[serde(default)]
    payload: Value,
}

#[derive(Deserialize)]
struct CollectionResponse {
    result: CollectionDescription,
}

#[derive(Deserialize)]
struct CollectionDescription {
    #[serde(default)]
    points_count: Option<u64>,
    config: Value,
}

/// Vector index backed by a Qdrant server.
pub struct QdrantIndex {
    client: Client,
    config: QdrantConfig,
}

impl QdrantIndex {
    /// Create a new client. Does not contact the server; see [`probe`](Self::probe).
    pub fn new(config: QdrantConfig) -> Result<Self, VectorError> {
        if config.base_url.is_empty() {
            return Err(VectorError::Config("qdrant url is empty".into()));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| VectorError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn from_settings(settings: &IndexSettings) -> Result<Self, VectorError> {
        Self::new(QdrantConfig::from_settings(settings))
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("api-key", key.expose_secret()),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, VectorError> {
        self.authorized(request)
            .send()
            .await
            .map_err(|e| VectorError::Unavailable(e.to_string()))
    }

    /// Map non-success statuses onto the error taxonomy.
    async fn check(response: Response, collection: &str) -> Result<Response, VectorError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(VectorError::CollectionNotFound(collection.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        if status.is_server_error() {
            return Err(VectorError::Unavailable(format!("HTTP {}: {}", status, body)));
        }
        Err(VectorError::Rejected {
            status: status.as_u16(),
            body,
        })
    }

    /// Check that the server answers, retrying with exponential backoff.
    pub async fn probe(&self) -> Result<(), VectorError> {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(200),
            max_elapsed_time: Some(self.config.timeout * 2),
            ..Default::default()
        };

        let mut attempts = 0;

        loop {
            attempts += 1;
            debug!(attempt = attempts, url = %self.config.base_url, "Probing qdrant");

            let result = match self.send(self.client.get(self.url("/collections"))).await {
                Ok(response) => Self::check(response, "").await.map(|_| ()),
                Err(e) => Err(e),
            };

            match result {
                Ok(()) => return Ok(()),
                // Rejections (bad key, bad url path) do not improve with retries
                Err(e @ VectorError::Rejected { .. }) => return Err(e),
                Err(e) => {
                    if attempts >= self.config.max_retries {
                        return Err(e);
                    }
                    match backoff.next_backoff() {
                        Some(duration) => {
                            warn!(
                                error = %e,
                                retry_in_ms = duration.as_millis(),
                                "Qdrant probe failed, retrying"
                            );
                            tokio::time::sleep(duration).await;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }

    async fn create_collection(&self, name: &str, dimension: usize) -> Result<(), VectorError> {
        let body = CreateCollection {
            vectors: VectorParams {
                size: dimension,
                distance: "Cosine",
            },
        };
        let response = self
            .send(
                self.client
                    .put(self.url(&format!("/collections/{}", name)))
                    .json(&body),
            )
            .await?;
        Self::check(response, name).await?;
        info!(collection = name, dim = dimension, "Created qdrant collection");
        Ok(())
    }

    async fn describe(&self, name: &str) -> Result<Option<CollectionInfo>, VectorError> {
        let response = self
            .send(self.client.get(self.url(&format!("/collections/{}", name))))
            .await?;
        let response = match Self::check(response, name).await {
            Ok(response) => response,
            Err(VectorError::CollectionNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let body: CollectionResponse = response
            .json()
            .await
            .map_err(|e| VectorError::Unavailable(format!("invalid collection response: {}", e)))?;

        let dimension = body.result.config["params"]["vectors"]["size"]
            .as_u64()
            .ok_or_else(|| {
                VectorError::Config(format!(
                    "collection {} does not use a single unnamed vector",
                    name
                ))
            })? as usize;

        Ok(Some(CollectionInfo {
            name: name.to_string(),
            dimension,
            points: body.result.points_count.unwrap_or(0),
        }))
    }

    /// One search request, hits in server order.
    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<QueryHit>, VectorError> {
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let response = self
            .send(
                self.client
                    .post(self.url(&format!("/collections/{}/points/search", name)))
                    .json(&body),
            )
            .await?;
        let response = Self::check(response, name).await?;
        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| VectorError::Unavailable(format!("invalid search response: {}", e)))?;
        Ok(decode_hits(body))
    }
}

/// Extra points requested beyond `k` to see ties at the cutoff.
const TIE_HEADROOM: usize = 8;

/// Hits with the asset id restored from the payload.
fn decode_hits(body: SearchResponse) -> Vec<QueryHit> {
    body.result
        .into_iter()
        .map(|point| {
            let id = match point.payload.get("id") {
                Some(Value::String(id)) => id.clone(),
                _ => match point.id {
                    Value::String(id) => id,
                    other => other.to_string(),
                },
            };
            QueryHit {
                id,
                score: point.score,
                payload: point.payload,
            }
        })
        .collect()
}

/// Rank one page of hits and cut it to `k`.
///
/// Returns `None` when the page was full and the k-th score is still tied
/// with its last hit: points beyond the page could then outrank the kept
/// ones on id.
fn settle_top_k(mut hits: Vec<QueryHit>, k: usize, limit: usize) -> Option<Vec<QueryHit>> {
    let full_page = hits.len() >= limit;
    rank_hits(&mut hits);
    if full_page && hits.len() > k {
        if let (Some(kth), Some(last)) = (k.checked_sub(1).and_then(|i| hits.get(i)), hits.last()) {
            if kth.score == last.score {
                return None;
            }
        }
    }
    hits.truncate(k);
    Some(hits)
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn backend(&self) -> &'static str {
        "qdrant"
    }

    async fn ensure_collection(&self, name: &str, dimension: usize) -> Result<(), VectorError> {
        match self.describe(name).await? {
            Some(info) if info.dimension == dimension => Ok(()),
            Some(info) => Err(VectorError::DimensionMismatch {
                expected: info.dimension,
                actual: dimension,
            }),
            None => self.create_collection(name, dimension).await,
        }
    }

    async fn reset_collection(&self, name: &str, dimension: usize) -> Result<(), VectorError> {
        let response = self
            .send(self.client.delete(self.url(&format!("/collections/{}", name))))
            .await?;
        match Self::check(response, name).await {
            Ok(_) | Err(VectorError::CollectionNotFound(_)) => {}
            Err(e) => return Err(e),
        }
        self.create_collection(name, dimension).await
    }

    async fn upsert_batch(&self, name: &str, points: Vec<Point>) -> Result<(), VectorError> {
        if points.is_empty() {
            return Ok(());
        }
        let info = self
            .describe(name)
            .await?
            .ok_or_else(|| VectorError::CollectionNotFound(name.to_string()))?;
        for point in &points {
            if point.vector.len() != info.dimension {
                return Err(VectorError::DimensionMismatch {
                    expected: info.dimension,
                    actual: point.vector.len(),
                });
            }
        }

        let count = points.len();
        let body = UpsertPoints {
            points: points
                .into_iter()
                .map(|point| {
                    let mut payload = match point.payload {
                        Value::Object(map) => map,
                        _ => serde_json::Map::new(),
                    };
                    payload.insert("id".to_string(), Value::String(point.id.clone()));
                    QdrantPoint {
                        id: point_uuid(&point.id).to_string(),
                        vector: point.vector,
                        payload: Value::Object(payload),
                    }
                })
                .collect(),
        };

        let response = self
            .send(
                self.client
                    .put(self.url(&format!("/collections/{}/points?wait=true", name)))
                    .json(&body),
            )
            .await?;
        Self::check(response, name).await?;
        debug!(collection = name, count, "Upserted points");
        Ok(())
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
    ) -> Result<Vec<QueryHit>, VectorError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        // Qdrant picks arbitrarily among points tied at the cutoff, so fetch
        // past it until the k-th score is settled.
        let mut limit = k + TIE_HEADROOM;
        loop {
            let hits = self.search(name, vector, limit).await?;
            if let Some(top) = settle_top_k(hits, k, limit) {
                return Ok(top);
            }
            debug!(collection = name, k, limit, "Score tie at page end, widening search");
            limit *= 2;
        }
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo, VectorError> {
        self.describe(name)
            .await?
            .ok_or_else(|| VectorError::CollectionNotFound(name.to_string()))
    }
}
