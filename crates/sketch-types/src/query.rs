//! Per-shot retrieval queries produced by the planner.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::SketchError;
use crate::load_json_file;

/// One textual query per shot. Immutable once planned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotQuery {
    pub shot_id: u64,

    /// Free text built by the planner from brief, shot description and keywords
    #[serde(rename = "query_text", alias = "text")]
    pub text: String,

    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Query list file: `{"shots": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShotQueryList {
    #[serde(default)]
    pub shots: Vec<ShotQuery>,
}

impl ShotQueryList {
    /// Load a query list.
    ///
    /// Returns `NotFound` when the file is missing and `Data` when it does not
    /// parse or holds no shots.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SketchError> {
        let list: ShotQueryList = load_json_file(path.as_ref(), "shot query list")?;
        if list.shots.is_empty() {
            return Err(SketchError::Data(format!(
                "shot query list {} has no shots",
                path.as_ref().display()
            )));
        }
        Ok(list)
    }

    /// Query texts in shot order, one per shot (empty texts included).
    pub fn texts(&self) -> Vec<String> {
        self.shots.iter().map(|s| s.text.clone()).collect()
    }
}
