//! Pipeline E2E tests for sketch-search.
//!
//! Shot queries are retrieved against the toy embedder and in-process index,
//! then merged into a scene graph. Covers URL priority, hero protection,
//! positional alignment and idempotent re-merging.

use pretty_assertions::assert_eq;

use e2e_tests::{fixed_match, test_catalog, three_shot_scene, toy_session, TestHarness};
use sketch_assign::{AssetAssigner, AssignmentPolicy};
use sketch_retrieval::{RetrievalSession, RetrieverConfig, SessionMode, ShotMatches};
use sketch_types::{load_json_file, AssetSource, SceneGraph};

fn assigner() -> AssetAssigner {
    AssetAssigner::new(AssignmentPolicy::default())
}

/// A single fixed match lands on the only eligible element of its shot.
#[test]
fn test_fixed_matches_merge_into_scene() {
    let mut scene = three_shot_scene();
    let ring = test_catalog().get("ring_basic").unwrap().clone();
    let matches = vec![vec![], vec![fixed_match(ring, 0.87)], vec![]];

    let stats = assigner().assign(&mut scene, &matches);

    let shot = &scene.shots[1];
    let hero = &shot.elements[0];
    assert!(hero.asset.is_none());
    assert!(hero.asset_meta.is_none());

    let wheel = &shot.elements[1];
    assert_eq!(wheel.asset.as_deref(), Some("https://x/a.png"));
    assert_eq!(wheel.asset_source, Some(AssetSource::Marketplace));
    let meta = wheel.asset_meta.as_ref().unwrap();
    assert_eq!(meta.asset_id, "ring_basic");
    assert_eq!(meta.score, 0.87);
    assert_eq!(wheel.extra["presetPosition"], "pos-wheel-right");

    // Ineligible element loses its stale URL.
    assert!(shot.elements[2].asset.is_none());

    // Shots without matches keep eligible elements unbound.
    assert!(scene.shots[2].elements.iter().all(|e| !e.has_asset()));

    assert_eq!(stats.assigned, 1);
    assert_eq!(stats.hero_protected, 1);
    assert_eq!(stats.shots_without_matches, 2);
}

/// Eligible elements in a shot cycle through the shot's matches in order.
#[test]
fn test_matches_cycle_over_eligible_elements() {
    let mut scene = three_shot_scene();
    let catalog = test_catalog();
    let can = catalog.get("can_red").unwrap().clone();
    let crystal = catalog.get("crystal_basic").unwrap().clone();
    let sphere = catalog.get("sphere_metal").unwrap().clone();
    let matches = vec![
        vec![],
        vec![],
        vec![fixed_match(crystal, 0.9), fixed_match(sphere, 0.8), fixed_match(can, 0.7)],
    ];

    assigner().assign(&mut scene, &matches);

    let shot = &scene.shots[2];
    assert_eq!(
        shot.elements[0].asset.as_deref(),
        Some("previews/crystal_basic_crystal.png")
    );
    assert_eq!(shot.elements[0].asset_source, Some(AssetSource::Local));
    assert_eq!(shot.elements[1].asset.as_deref(), Some("https://market/sphere"));
    assert_eq!(shot.elements[1].asset_source, Some(AssetSource::Unknown));
}

/// Full run over a toy session: every shot resolves, hero stays unbound.
#[tokio::test]
async fn test_toy_session_end_to_end() {
    let session = toy_session().await;
    let retriever = session.retriever(RetrieverConfig::default());

    let queries = vec![
        "studio backdrop".to_string(),
        "ferris wheel ring at dusk".to_string(),
        "red soda can on a track".to_string(),
    ];
    let batch = retriever.search_multiple_shots(&queries, 2).await;
    assert_eq!(batch.len(), 3);
    for (shot, query) in batch.iter().zip(queries.iter()) {
        assert_eq!(&shot.shot_description, query);
        assert!(!shot.is_failed());
        assert_eq!(shot.matched_assets.len(), 2);
    }

    let mut scene = three_shot_scene();
    let stats = assigner().assign_batch(&mut scene, &batch);

    assert_eq!(stats.shots_processed, 3);
    assert_eq!(stats.assigned, 3);
    assert!(scene.shots[1].elements[0].asset.is_none());

    // The wheel in shot 1 got the top match for shot 1's query.
    let top = &batch[1].matched_assets[0];
    let wheel = &scene.shots[1].elements[1];
    assert_eq!(wheel.asset_meta.as_ref().unwrap().asset_id, top.asset.id);
    assert_eq!(wheel.asset_meta.as_ref().unwrap().score, top.score);

    // Two eligible cans take the two matches of shot 2 in rank order.
    let cans: Vec<_> = scene.shots[2]
        .elements
        .iter()
        .map(|e| e.asset_meta.as_ref().unwrap().asset_id.clone())
        .collect();
    let ranked: Vec<_> = batch[2]
        .matched_assets
        .iter()
        .map(|m| m.asset.id.clone())
        .collect();
    assert_eq!(cans, ranked);

    session.close();
}

/// Merging the same batch twice yields the same scene.
#[tokio::test]
async fn test_merge_is_idempotent() {
    let session = toy_session().await;
    let retriever = session.retriever(RetrieverConfig::default());
    let queries = vec![
        "backdrop".to_string(),
        "ferris wheel".to_string(),
        "soda can".to_string(),
    ];
    let batch = retriever.search_multiple_shots(&queries, 3).await;

    let mut once = three_shot_scene();
    assigner().assign_batch(&mut once, &batch);
    let mut twice = once.clone();
    assigner().assign_batch(&mut twice, &batch);

    assert_eq!(once, twice);
}

/// The match batch survives a trip through its JSON file form.
#[tokio::test]
async fn test_saved_batch_merges_like_live_batch() {
    let harness = TestHarness::new();
    let session = RetrievalSession::open(&harness.settings).await.unwrap();
    assert_eq!(session.mode(), SessionMode::Primary);

    let retriever = session.retriever(RetrieverConfig::default());
    let queries = vec![
        "backdrop".to_string(),
        "ferris wheel".to_string(),
        "soda can".to_string(),
    ];
    let batch = retriever.search_multiple_shots(&queries, 3).await;

    let path = harness.path("matches.json");
    std::fs::write(&path, serde_json::to_string_pretty(&batch).unwrap()).unwrap();
    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(raw[0]["shotDescription"].is_string());
    assert!(raw[0]["matchedAssets"].is_array());

    let saved: Vec<ShotMatches> = load_json_file(&path, "match batch").unwrap();
    assert_eq!(saved, batch);

    let mut live = three_shot_scene();
    assigner().assign_batch(&mut live, &batch);
    let mut from_file = three_shot_scene();
    assigner().assign_batch(&mut from_file, &saved);
    assert_eq!(live, from_file);

    let scene_path = harness.path("scene.with_assets.json");
    std::fs::write(&scene_path, live.to_json_pretty().unwrap()).unwrap();
    let reloaded = SceneGraph::load(&scene_path).unwrap();
    assert_eq!(reloaded, live);
}
