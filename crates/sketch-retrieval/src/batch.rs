//! Summary of a batch retrieval.

use serde::Serialize;
use sketch_types::SketchError;

use crate::types::ShotMatches;

/// Outcome counts of one `search_multiple_shots` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Number of shots in the batch
    pub total: usize,
    /// Shots whose retrieval succeeded (possibly with zero matches)
    pub resolved: usize,
    /// Indices of shots whose retrieval failed
    pub failed: Vec<usize>,
    /// Indices of resolved shots that matched nothing
    pub empty: Vec<usize>,
}

impl BatchSummary {
    pub fn from_results(results: &[ShotMatches]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Default::default()
        };
        for (i, shot) in results.iter().enumerate() {
            if shot.is_failed() {
                summary.failed.push(i);
            } else {
                summary.resolved += 1;
                if shot.matched_assets.is_empty() {
                    summary.empty.push(i);
                }
            }
        }
        summary
    }

    /// Whether some but not necessarily all shots failed.
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }

    /// The failure set as an error value, for reporting. Never aborts a run.
    pub fn partial_error(&self) -> Option<SketchError> {
        self.is_partial().then(|| SketchError::PartialRetrieval {
            failed: self.failed.len(),
            total: self.total,
        })
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} shots: {} resolved, {} failed, {} without matches",
            self.total,
            self.resolved,
            self.failed.len(),
            self.empty.len()
        )
    }
}
