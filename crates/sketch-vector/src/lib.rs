//! # sketch-vector
//!
//! Vector index for sketch-search.
//!
//! Assets are stored as vectors with their metadata as payload and queried by
//! cosine similarity.
//!
//! ## Backends
//! - [`QdrantIndex`]: Qdrant over REST, the primary store
//! - [`BruteForceIndex`]: in-process exhaustive search, used as the fallback
//!   and in tests
//!
//! [`AssetCatalog`] and [`CatalogIndexer`] load the ingestion catalog and
//! populate either backend. [`ScriptedIndex`] injects delays and failures.

pub mod brute;
pub mod catalog;
pub mod error;
pub mod index;
pub mod qdrant;
pub mod scripted;

pub use brute::BruteForceIndex;
pub use catalog::{AssetCatalog, CatalogIndexer, IndexerConfig, IndexingStats};
pub use error::VectorError;
pub use index::{rank_hits, CollectionInfo, Point, QueryHit, VectorIndex};
pub use qdrant::{point_uuid, QdrantConfig, QdrantIndex};
pub use scripted::ScriptedIndex;
