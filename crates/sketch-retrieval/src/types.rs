//! Match results as exchanged with the renderer and the merger.

use serde::{Deserialize, Serialize};
use sketch_types::Asset;

/// One ranked candidate asset for a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(flatten)]
    pub asset: Asset,

    /// Cosine similarity rounded to 4 decimals
    pub score: f64,

    /// 0-based position in the match list
    #[serde(default)]
    pub rank: usize,
}

impl MatchResult {
    pub fn new(asset: Asset, score: f64) -> Self {
        Self {
            asset,
            score,
            rank: 0,
        }
    }
}

/// Matches for one shot, positionally aligned with the query list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShotMatches {
    pub shot_description: String,

    #[serde(default)]
    pub matched_assets: Vec<MatchResult>,

    /// Why this shot has no matches, when retrieval failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ShotMatches {
    pub fn success(shot_description: impl Into<String>, matched_assets: Vec<MatchResult>) -> Self {
        Self {
            shot_description: shot_description.into(),
            matched_assets,
            error: None,
        }
    }

    pub fn failure(shot_description: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            shot_description: shot_description.into(),
            matched_assets: Vec::new(),
            error: Some(error.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Per-shot match lists in shot order, as read back from a batch file.
pub fn match_lists(batch: &[ShotMatches]) -> Vec<Vec<MatchResult>> {
    batch.iter().map(|shot| shot.matched_assets.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_form() {
        let asset = Asset::new("ring_basic", "Ring").with_preview_url("https://x/a.png");
        let shot = ShotMatches::success("ferris wheel", vec![MatchResult::new(asset, 0.87)]);
        let value = serde_json::to_value(&shot).unwrap();

        assert_eq!(value["shotDescription"], "ferris wheel");
        let first = &value["matchedAssets"][0];
        assert_eq!(first["id"], "ring_basic");
        assert_eq!(first["previewUrl"], "https://x/a.png");
        assert_eq!(first["score"], 0.87);
        assert_eq!(first["rank"], 0);
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_batch_file_round_trip() {
        let json = r#"[
            {"shotDescription": "a", "matchedAssets": [
                {"id": "ring_basic", "score": 0.87, "previewUrl": "https://x/a.png"}
            ]},
            {"shotDescription": "b", "matchedAssets": [], "error": "Query timed out after 10s"}
        ]"#;
        let batch: Vec<ShotMatches> = serde_json::from_str(json).unwrap();
        assert_eq!(batch.len(), 2);
        let first = &batch[0].matched_assets[0];
        assert_eq!(first.asset.id, "ring_basic");
        assert_eq!(
            first.asset.provenance.preview_url.as_deref(),
            Some("https://x/a.png")
        );
        assert_eq!(first.score, 0.87);
        assert!(batch[1].is_failed());
        assert_eq!(match_lists(&batch)[1].len(), 0);
    }
}
