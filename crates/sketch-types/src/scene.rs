//! Scene graph: ordered shots, each with ordered visual elements.
//!
//! The planner owns the structure. Only `asset`, `asset_meta` and
//! `asset_source` on elements are ever written by this system; every other
//! field, including ones this crate does not model, survives a
//! read/merge/write cycle unchanged.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::asset::{Asset, AssetSource, License};
use crate::error::SketchError;
use crate::load_json_file;

/// Element id reserved for the hero product.
pub const HERO_ELEMENT_ID: &str = "product";

/// Element type reserved for the hero product.
pub const HERO_ELEMENT_TYPE: &str = "bottle";

/// Snapshot of an asset's provenance at the time it was bound to an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMeta {
    pub asset_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub licenses: Vec<License>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_preview_path: Option<String>,

    #[serde(default)]
    pub resolved: bool,

    /// Similarity score of the match, rounded to 4 decimals
    pub score: f64,
}

impl AssetMeta {
    pub fn snapshot(asset: &Asset, score: f64) -> Self {
        let prov = &asset.provenance;
        Self {
            asset_id: asset.id.clone(),
            source_url: prov.source_url.clone(),
            title: prov.title.clone(),
            licenses: prov.licenses.clone(),
            preview_url: prov.preview_url.clone(),
            local_preview_path: prov.local_preview_path.clone(),
            resolved: prov.resolved,
            score,
        }
    }
}

/// One visual element of a shot.
///
/// Only `id` and `type` are read; `parent`, `motion`, `position`,
/// `presetPosition` and anything else the planner writes stay in `extra` as
/// raw JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneElement {
    pub id: String,

    #[serde(rename = "type")]
    pub kind: String,

    /// Bound asset URL; always serialized, `null` when unbound
    #[serde(default)]
    pub asset: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_meta: Option<AssetMeta>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_source: Option<AssetSource>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SceneElement {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            asset: None,
            asset_meta: None,
            asset_source: None,
            extra: Map::new(),
        }
    }

    /// The hero element never receives a marketplace asset.
    pub fn is_hero(&self) -> bool {
        self.id == HERO_ELEMENT_ID || self.kind == HERO_ELEMENT_TYPE
    }

    /// Reset every assignment field to null.
    pub fn clear_asset(&mut self) {
        self.asset = None;
        self.asset_meta = None;
        self.asset_source = None;
    }

    pub fn has_asset(&self) -> bool {
        self.asset.is_some()
    }
}

/// One timed segment of the scene.
///
/// `id`, `duration`, `camera` and other shot fields are kept verbatim in
/// `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Shot {
    #[serde(default)]
    pub elements: Vec<SceneElement>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Shot {
    pub fn with_elements(id: u64, elements: Vec<SceneElement>) -> Self {
        let mut extra = Map::new();
        extra.insert("id".to_string(), Value::from(id));
        Self { elements, extra }
    }
}

/// Full ordered shot -> element structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneGraph {
    #[serde(default)]
    pub shots: Vec<Shot>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SceneGraph {
    pub fn new(shots: Vec<Shot>) -> Self {
        Self {
            shots,
            extra: Map::new(),
        }
    }

    /// Load and validate a scene graph file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SketchError> {
        let scene: SceneGraph = load_json_file(path.as_ref(), "scene graph")?;
        scene.validate()?;
        Ok(scene)
    }

    /// A scene with no shots cannot be merged.
    pub fn validate(&self) -> Result<(), SketchError> {
        if self.shots.is_empty() {
            return Err(SketchError::Data("scene graph has no shots".to_string()));
        }
        Ok(())
    }

    /// Pretty JSON as handed to the renderer.
    pub fn to_json_pretty(&self) -> Result<String, SketchError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
