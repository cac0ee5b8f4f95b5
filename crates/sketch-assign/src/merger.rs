//! Asset assignment merger.

use std::collections::BTreeSet;

use serde::Serialize;
use sketch_retrieval::{match_lists, MatchResult, ShotMatches};
use sketch_types::{AssetMeta, AssetSource, AssignmentSettings, SceneElement, SceneGraph};
use tracing::{debug, info};

/// Which element types may receive a marketplace asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentPolicy {
    eligible_types: BTreeSet<String>,
}

impl Default for AssignmentPolicy {
    fn default() -> Self {
        Self::from_settings(&AssignmentSettings::default())
    }
}

impl AssignmentPolicy {
    pub fn new<I, S>(eligible_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            eligible_types: eligible_types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_settings(settings: &AssignmentSettings) -> Self {
        Self::new(settings.eligible_types.iter().cloned())
    }

    pub fn is_eligible(&self, element_type: &str) -> bool {
        self.eligible_types.contains(element_type)
    }

    pub fn eligible_types(&self) -> impl Iterator<Item = &str> {
        self.eligible_types.iter().map(String::as_str)
    }
}

/// Counts from one merge pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssignmentStats {
    /// Shots with at least one element
    pub shots_processed: usize,
    /// Shots without elements
    pub shots_skipped: usize,
    /// Elements given an asset
    pub assigned: usize,
    /// Non-hero elements left without an asset
    pub cleared: usize,
    /// Hero elements seen (and kept unbound)
    pub hero_protected: usize,
    /// Processed shots that had no matches to draw from
    pub shots_without_matches: usize,
}

/// Binds per-shot matches onto scene elements.
#[derive(Debug, Clone, Default)]
pub struct AssetAssigner {
    policy: AssignmentPolicy,
}

impl AssetAssigner {
    pub fn new(policy: AssignmentPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AssignmentPolicy {
        &self.policy
    }

    /// Merge `matches[i]` into shot `i` of the scene, in place.
    ///
    /// `matches` may be shorter than the shot list; missing entries count as
    /// no matches. Within a shot, the n-th eligible element gets
    /// `matches[i][n % len]`.
    pub fn assign(&self, scene: &mut SceneGraph, matches: &[Vec<MatchResult>]) -> AssignmentStats {
        let mut stats = AssignmentStats::default();

        if matches.len() > scene.shots.len() {
            debug!(
                shots = scene.shots.len(),
                batches = matches.len(),
                "Ignoring match lists past the last shot"
            );
        }

        for (i, shot) in scene.shots.iter_mut().enumerate() {
            if shot.elements.is_empty() {
                stats.shots_skipped += 1;
                continue;
            }
            stats.shots_processed += 1;

            let shot_matches: &[MatchResult] = matches.get(i).map(Vec::as_slice).unwrap_or(&[]);
            if shot_matches.is_empty() {
                stats.shots_without_matches += 1;
            }

            let mut counter = 0usize;
            for element in shot.elements.iter_mut() {
                if element.is_hero() {
                    element.clear_asset();
                    stats.hero_protected += 1;
                } else if self.policy.is_eligible(&element.kind) && !shot_matches.is_empty() {
                    let chosen = &shot_matches[counter % shot_matches.len()];
                    counter += 1;
                    bind(element, chosen);
                    stats.assigned += 1;
                } else {
                    element.clear_asset();
                    stats.cleared += 1;
                }
            }
        }

        info!(
            shots = stats.shots_processed,
            skipped = stats.shots_skipped,
            assigned = stats.assigned,
            cleared = stats.cleared,
            hero = stats.hero_protected,
            without_matches = stats.shots_without_matches,
            "Asset assignment complete"
        );

        stats
    }

    /// Merge a batch as produced by the retriever.
    pub fn assign_batch(&self, scene: &mut SceneGraph, batch: &[ShotMatches]) -> AssignmentStats {
        self.assign(scene, &match_lists(batch))
    }
}

fn bind(element: &mut SceneElement, chosen: &MatchResult) {
    let (url, source) = match chosen.asset.provenance.best_url() {
        Some((url, source)) => (Some(url.to_string()), source),
        None => (None, AssetSource::Unknown),
    };
    element.asset = url;
    element.asset_meta = Some(AssetMeta::snapshot(&chosen.asset, chosen.score));
    element.asset_source = Some(source);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sketch_types::{Asset, Shot};

    fn matched(id: &str, score: f64, preview: &str) -> MatchResult {
        MatchResult::new(Asset::new(id, id).with_preview_url(preview), score)
    }

    fn five_element_shot() -> Shot {
        Shot::with_elements(
            1,
            vec![
                SceneElement::new("track", "track-layer"),
                SceneElement::new("can1", "can-on-track"),
                SceneElement::new("product", "bottle"),
                SceneElement::new("wheel", "ferris-wheel"),
                SceneElement::new("tree", "tree"),
            ],
        )
    }

    #[test]
    fn test_single_match_reused_for_all_eligible() {
        let mut scene = SceneGraph::new(vec![five_element_shot()]);
        let stats = AssetAssigner::default().assign(
            &mut scene,
            &[vec![matched("ring_basic", 0.87, "https://x/a.png")]],
        );

        let elements = &scene.shots[0].elements;
        assert_eq!(elements[1].asset.as_deref(), Some("https://x/a.png"));
        assert_eq!(elements[3].asset.as_deref(), Some("https://x/a.png"));
        for i in [0, 2, 4] {
            assert!(elements[i].asset.is_none());
            assert!(elements[i].asset_meta.is_none());
        }
        assert_eq!(stats.assigned, 2);
        assert_eq!(stats.cleared, 2);
        assert_eq!(stats.hero_protected, 1);
    }

    #[test]
    fn test_round_robin_wraps() {
        let shot = Shot::with_elements(
            0,
            vec![
                SceneElement::new("a", "solo-can"),
                SceneElement::new("b", "solo-can"),
                SceneElement::new("tree", "tree"),
                SceneElement::new("c", "solo-can"),
            ],
        );
        let mut scene = SceneGraph::new(vec![shot]);
        AssetAssigner::default().assign(
            &mut scene,
            &[vec![
                matched("m0", 0.9, "https://x/0.png"),
                matched("m1", 0.8, "https://x/1.png"),
            ]],
        );
        let urls: Vec<Option<&str>> = scene.shots[0]
            .elements
            .iter()
            .map(|e| e.asset.as_deref())
            .collect();
        // Ineligible elements do not advance the counter
        assert_eq!(
            urls,
            vec![
                Some("https://x/0.png"),
                Some("https://x/1.png"),
                None,
                Some("https://x/0.png")
            ]
        );
    }

    #[test]
    fn test_hero_is_stripped_and_never_bound() {
        let mut hero = SceneElement::new("product", "can-on-track");
        hero.asset = Some("https://stale.png".into());
        hero.asset_source = Some(AssetSource::Marketplace);
        let mut bottle = SceneElement::new("hero2", "bottle");
        bottle.asset = Some("https://stale2.png".into());

        let mut scene = SceneGraph::new(vec![Shot::with_elements(0, vec![hero, bottle])]);
        let stats = AssetAssigner::default()
            .assign(&mut scene, &[vec![matched("m0", 0.9, "https://x/0.png")]]);

        for element in &scene.shots[0].elements {
            assert!(element.asset.is_none());
            assert!(element.asset_meta.is_none());
            assert!(element.asset_source.is_none());
        }
        assert_eq!(stats.hero_protected, 2);
        assert_eq!(stats.assigned, 0);
    }

    #[test]
    fn test_stale_assets_cleared_on_ineligible_and_unmatched() {
        let mut tree = SceneElement::new("tree", "tree");
        tree.asset = Some("https://stale.png".into());
        let mut wheel = SceneElement::new("wheel", "ferris-wheel");
        wheel.asset = Some("https://stale-wheel.png".into());

        let mut scene = SceneGraph::new(vec![
            Shot::with_elements(0, vec![tree]),
            Shot::with_elements(1, vec![wheel]),
        ]);
        // Shot 1 has no match list at all
        let stats = AssetAssigner::default()
            .assign(&mut scene, &[vec![matched("m0", 0.9, "https://x/0.png")]]);

        assert!(scene.shots[0].elements[0].asset.is_none());
        assert!(scene.shots[1].elements[0].asset.is_none());
        assert_eq!(stats.shots_without_matches, 1);
        assert_eq!(stats.cleared, 2);
    }

    #[test]
    fn test_empty_shots_skipped() {
        let mut scene = SceneGraph::new(vec![
            Shot::with_elements(0, vec![]),
            Shot::with_elements(1, vec![SceneElement::new("wheel", "ferris-wheel")]),
        ]);
        let stats = AssetAssigner::default().assign(
            &mut scene,
            &[
                vec![matched("m0", 0.9, "https://x/0.png")],
                vec![matched("m1", 0.7, "https://x/1.png")],
            ],
        );
        assert_eq!(stats.shots_skipped, 1);
        assert_eq!(stats.shots_processed, 1);
        // Shot 1 draws from matches[1], not matches[0]
        assert_eq!(
            scene.shots[1].elements[0].asset.as_deref(),
            Some("https://x/1.png")
        );
    }

    #[test]
    fn test_provenance_and_source_labels() {
        let mut local = Asset::new("local_only", "Local");
        local.provenance.local_preview_path = Some("/previews/local_only_local.png".into());
        local.provenance.source_url = Some("https://market/local".into());
        let mut market = Asset::new("market_only", "Market");
        market.provenance.source_url = Some("https://market/page".into());
        market.provenance.title = Some("Market page".into());
        market.provenance.resolved = true;
        let bare = Asset::new("bare", "Bare");

        let mut scene = SceneGraph::new(vec![Shot::with_elements(
            0,
            vec![
                SceneElement::new("a", "solo-can"),
                SceneElement::new("b", "solo-can"),
                SceneElement::new("c", "solo-can"),
            ],
        )]);
        AssetAssigner::default().assign(
            &mut scene,
            &[vec![
                MatchResult::new(local, 0.9),
                MatchResult::new(market, 0.8),
                MatchResult::new(bare, 0.7),
            ]],
        );

        let elements = &scene.shots[0].elements;
        assert_eq!(
            elements[0].asset.as_deref(),
            Some("/previews/local_only_local.png")
        );
        assert_eq!(elements[0].asset_source, Some(AssetSource::Local));

        assert_eq!(elements[1].asset.as_deref(), Some("https://market/page"));
        assert_eq!(elements[1].asset_source, Some(AssetSource::Unknown));
        let meta = elements[1].asset_meta.as_ref().unwrap();
        assert_eq!(meta.asset_id, "market_only");
        assert_eq!(meta.title.as_deref(), Some("Market page"));
        assert!(meta.resolved);
        assert_eq!(meta.score, 0.8);

        // No URL anywhere: unbound, but provenance is still recorded
        assert!(elements[2].asset.is_none());
        assert_eq!(elements[2].asset_source, Some(AssetSource::Unknown));
        assert_eq!(elements[2].asset_meta.as_ref().unwrap().asset_id, "bare");
    }

    #[test]
    fn test_merge_is_idempotent() {
        let batch = vec![vec![
            matched("m0", 0.9, "https://x/0.png"),
            matched("m1", 0.8, "https://x/1.png"),
        ]];
        let mut scene = SceneGraph::new(vec![five_element_shot()]);
        let assigner = AssetAssigner::default();

        assigner.assign(&mut scene, &batch);
        let first = scene.to_json_pretty().unwrap();
        assigner.assign(&mut scene, &batch);
        let second = scene.to_json_pretty().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_policy() {
        let policy = AssignmentPolicy::new(["tree", "cloud", "tree"]);
        assert!(policy.is_eligible("tree"));
        assert!(!policy.is_eligible("ferris-wheel"));
        assert_eq!(policy.eligible_types().collect::<Vec<_>>(), ["cloud", "tree"]);
        let policy = AssignmentPolicy::new(["tree"]);

        let mut scene = SceneGraph::new(vec![five_element_shot()]);
        let stats = AssetAssigner::new(policy)
            .assign(&mut scene, &[vec![matched("m0", 0.9, "https://x/0.png")]]);
        assert_eq!(stats.assigned, 1);
        assert_eq!(
            scene.shots[0].elements[4].asset.as_deref(),
            Some("https://x/0.png")
        );
        assert!(scene.shots[0].elements[3].asset.is_none());
    }

    #[test]
    fn test_assign_batch_uses_matched_assets() {
        let mut scene = SceneGraph::new(vec![five_element_shot()]);
        let batch = vec![ShotMatches::success(
            "wheel shot",
            vec![matched("ring_basic", 0.87, "https://x/a.png")],
        )];
        let stats = AssetAssigner::default().assign_batch(&mut scene, &batch);
        assert_eq!(stats.assigned, 2);

        let value = serde_json::to_value(&scene).unwrap();
        let wheel = &value["shots"][0]["elements"][3];
        assert_eq!(wheel["asset"], "https://x/a.png");
        assert_eq!(wheel["asset_source"], "marketplace");
        assert_eq!(wheel["asset_meta"]["score"], 0.87);
        assert_eq!(wheel["asset_meta"]["asset_id"], "ring_basic");
    }

    #[test]
    fn test_merge_keeps_planner_fields_verbatim() {
        let element: SceneElement = serde_json::from_str(
            r#"{"id":"platform","type":"bottle-platform","motion":null,"position":{"x":50,"y":52,"z":3}}"#,
        )
        .unwrap();
        let mut scene = SceneGraph::new(vec![Shot::with_elements(1, vec![element])]);
        let policy = AssignmentPolicy::new(["bottle-platform"]);
        AssetAssigner::new(policy)
            .assign(&mut scene, &[vec![matched("p", 0.5, "https://x/p.png")]]);

        let element = serde_json::to_value(&scene.shots[0].elements[0]).unwrap();
        assert_eq!(element["asset"], "https://x/p.png");
        assert!(element["motion"].is_null());
        assert!(element.as_object().unwrap().contains_key("motion"));
        assert_eq!(
            serde_json::to_string(&element["position"]).unwrap(),
            r#"{"x":50,"y":52,"z":3}"#
        );
    }
}
