//! # sketch-types
//!
//! Shared domain types for sketch-search.
//!
//! - Assets: catalogued visual resources with provenance
//! - Shot queries: per-shot retrieval text from the planner
//! - Scene graph: shots and elements that receive assets
//! - Settings and the error taxonomy used by every crate

pub mod asset;
pub mod config;
pub mod error;
pub mod query;
pub mod scene;

use std::path::Path;

use serde::de::DeserializeOwned;

pub use asset::{Asset, AssetSource, License, Provenance};
pub use config::{
    AssignmentSettings, EmbeddingProviderKind, EmbeddingSettings, FallbackSettings,
    IndexBackendKind, IndexSettings, RetrievalSettings, Settings,
};
pub use error::{ErrorKind, SketchError};
pub use query::{ShotQuery, ShotQueryList};
pub use scene::{AssetMeta, SceneElement, SceneGraph, Shot, HERO_ELEMENT_ID, HERO_ELEMENT_TYPE};

/// Read and parse a JSON input file.
///
/// A missing file is `NotFound`; unreadable or malformed content is `Data`.
/// `what` names the input in error messages.
pub fn load_json_file<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, SketchError> {
    if !path.exists() {
        return Err(SketchError::NotFound(format!(
            "{} at {}",
            what,
            path.display()
        )));
    }
    let bytes = std::fs::read(path)
        .map_err(|e| SketchError::Data(format!("cannot read {} {}: {}", what, path.display(), e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| SketchError::Data(format!("malformed {} {}: {}", what, path.display(), e)))
}
