//! Configuration loading for sketch-search.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! Default config file lives at ~/.config/sketch-search/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::SketchError;

/// Which embedding provider a session uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProviderKind {
    /// all-MiniLM-L6-v2 through Candle (384 dimensions)
    #[default]
    Candle,
    /// Deterministic byte histogram, no I/O
    Toy,
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    #[serde(default)]
    pub provider: EmbeddingProviderKind,

    /// HuggingFace repository of the semantic model
    #[serde(default = "default_model_repo")]
    pub model_repo: String,

    /// Model cache directory (defaults to the user cache dir)
    #[serde(default)]
    pub cache_dir: Option<String>,

    /// Dimension of the toy embedding
    #[serde(default = "default_toy_dimension")]
    pub toy_dimension: usize,
}

fn default_model_repo() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_toy_dimension() -> usize {
    8
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::default(),
            model_repo: default_model_repo(),
            cache_dir: None,
            toy_dimension: default_toy_dimension(),
        }
    }
}

/// Which vector index backend a session uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IndexBackendKind {
    /// Qdrant over its REST API
    #[default]
    Qdrant,
    /// In-process brute-force index seeded from the asset catalog
    Memory,
}

/// Vector index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSettings {
    #[serde(default)]
    pub backend: IndexBackendKind,

    /// Qdrant base URL
    #[serde(default = "default_index_url")]
    pub url: String,

    /// Qdrant API key (prefer SKETCH_INDEX__API_KEY over the config file)
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    /// Per-request HTTP timeout
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Asset catalog used to seed the in-process index
    #[serde(default)]
    pub catalog_path: Option<String>,

    /// Directory searched for `{id}_{name}.png` local previews
    #[serde(default)]
    pub previews_dir: Option<String>,
}

fn default_index_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection() -> String {
    "assets".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackendKind::default(),
            url: default_index_url(),
            api_key: None,
            collection: default_collection(),
            request_timeout_ms: default_request_timeout_ms(),
            catalog_path: None,
            previews_dir: None,
        }
    }
}

impl IndexSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Batch retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Matches kept per shot
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Maximum concurrent per-shot queries
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Timeout for one shot (embed + query)
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,
}

fn default_top_k() -> usize {
    3
}

fn default_max_concurrency() -> usize {
    4
}

fn default_query_timeout_ms() -> u64 {
    10_000
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_concurrency: default_max_concurrency(),
            query_timeout_ms: default_query_timeout_ms(),
        }
    }
}

impl RetrievalSettings {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// Asset assignment settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentSettings {
    /// Element types allowed to receive a marketplace asset
    #[serde(default = "default_eligible_types")]
    pub eligible_types: Vec<String>,
}

fn default_eligible_types() -> Vec<String> {
    ["can-on-track", "solo-can", "ferris-wheel"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AssignmentSettings {
    fn default() -> Self {
        Self {
            eligible_types: default_eligible_types(),
        }
    }
}

/// Fallback to the toy embedder and brute-force index.
///
/// Enabled by default so a run without Qdrant or the model still completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackSettings {
    #[serde(default = "default_fallback_enabled")]
    pub enabled: bool,
}

fn default_fallback_enabled() -> bool {
    true
}

impl Default for FallbackSettings {
    fn default() -> Self {
        Self {
            enabled: default_fallback_enabled(),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub index: IndexSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,

    #[serde(default)]
    pub assignment: AssignmentSettings,

    #[serde(default)]
    pub fallback: FallbackSettings,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            embedding: EmbeddingSettings::default(),
            index: IndexSettings::default(),
            retrieval: RetrievalSettings::default(),
            assignment: AssignmentSettings::default(),
            fallback: FallbackSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/sketch-search/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (SKETCH_*, nested keys split on `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, SketchError> {
        let config_dir = ProjectDirs::from("", "", "sketch-search")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            // 1. Built-in defaults
            .set_default("log_level", default_log_level())
            .map_err(|e| SketchError::Config(e.to_string()))?
            .set_default("index.url", default_index_url())
            .map_err(|e| SketchError::Config(e.to_string()))?
            .set_default("index.collection", default_collection())
            .map_err(|e| SketchError::Config(e.to_string()))?
            .set_default("retrieval.top_k", default_top_k() as i64)
            .map_err(|e| SketchError::Config(e.to_string()))?
            .set_default("retrieval.max_concurrency", default_max_concurrency() as i64)
            .map_err(|e| SketchError::Config(e.to_string()))?
            // 2. Default config file (~/.config/sketch-search/config.toml)
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        // 3. CLI-specified config file (higher precedence than default)
        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // 4. Environment variables (highest precedence before CLI flags)
        // Format: SKETCH_LOG_LEVEL, SKETCH_INDEX__URL, SKETCH_RETRIEVAL__TOP_K, etc.
        builder = builder.add_source(
            Environment::with_prefix("SKETCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| SketchError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| SketchError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), SketchError> {
        if self.retrieval.top_k == 0 {
            return Err(SketchError::Config("retrieval.top_k must be > 0".into()));
        }
        if self.retrieval.max_concurrency == 0 {
            return Err(SketchError::Config(
                "retrieval.max_concurrency must be > 0".into(),
            ));
        }
        if self.retrieval.query_timeout_ms == 0 {
            return Err(SketchError::Config(
                "retrieval.query_timeout_ms must be > 0".into(),
            ));
        }
        if self.index.request_timeout_ms == 0 {
            return Err(SketchError::Config(
                "index.request_timeout_ms must be > 0".into(),
            ));
        }
        if self.embedding.toy_dimension == 0 {
            return Err(SketchError::Config(
                "embedding.toy_dimension must be > 0".into(),
            ));
        }
        if self.index.collection.trim().is_empty() {
            return Err(SketchError::Config("index.collection is empty".into()));
        }
        if self.index.backend == IndexBackendKind::Qdrant && self.index.url.trim().is_empty() {
            return Err(SketchError::Config(
                "index.url is required for the qdrant backend".into(),
            ));
        }
        Ok(())
    }

    /// Expand ~ in an optional path setting.
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
            {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.index.catalog_path.as_deref().map(Self::expand_path)
    }

    pub fn previews_dir(&self) -> Option<PathBuf> {
        self.index.previews_dir.as_deref().map(Self::expand_path)
    }
}
