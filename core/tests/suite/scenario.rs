use std::path::PathBuf;
use std::sync::Arc;

use chromaflux_core::ChromaConfig;
use chromaflux_core::ColorVector;
use chromaflux_core::Session;
use chromaflux_core::SyncPolicy;
use core_test_support::AssetDir;
use core_test_support::FakeConverter;
use core_test_support::asset_document;
use core_test_support::color_over_life;
use core_test_support::start_color;
use pretty_assertions::assert_eq;

/// Asset A carries one color-over-life module with identical MIN and MAX;
/// asset B a start-color module whose MIN differs only past the sixth
/// decimal.
async fn two_asset_session() -> (AssetDir, Session, PathBuf, PathBuf) {
    let dir = AssetDir::new();
    let a = dir.asset("A.uasset");
    let b = dir.asset("B.uasset");
    let converter = FakeConverter::new()
        .with_fixture(
            &a,
            asset_document(vec![color_over_life(
                "ParticleModuleColorOverLife_0",
                [0.1, 0.2, 0.3],
                [0.1, 0.2, 0.3],
            )]),
        )
        .with_fixture(
            &b,
            asset_document(vec![start_color("ParticleModuleColor_1", [0.1000001, 0.2, 0.3])]),
        );
    let mut session = Session::new(ChromaConfig::default(), Arc::new(converter));
    session
        .load(&[a.clone(), b.clone()], |_| {})
        .await
        .expect("load");
    (dir, session, a, b)
}

#[tokio::test]
async fn two_assets_share_one_group() {
    let (_dir, session, a, b) = two_asset_session().await;

    let groups = session.regroup();

    assert_eq!(groups.len(), 1);
    let group = &groups[0];
    assert_eq!(group.count(), 3);
    assert_eq!(group.key(), ColorVector::new(0.1, 0.2, 0.3).key());
    assert!(group.affects_min());
    assert!(group.affects_max());
    assert_eq!(
        group.assets().iter().cloned().collect::<Vec<_>>(),
        vec![a.with_extension("json"), b.with_extension("json")]
    );
}

#[tokio::test]
async fn group_recolor_reaches_every_node_and_keeps_the_group_in_place() {
    let (_dir, mut session, _a, _b) = two_asset_session().await;
    let mut groups = session.regroup();
    let teal = ColorVector::new(0.0, 0.5, 0.5);

    let outcome = session
        .recolor_group(&mut groups[0], teal, SyncPolicy::Disabled)
        .expect("current groups");

    assert!(outcome.is_complete());
    assert_eq!(outcome.touched().len(), 3);
    for (_, entry) in session.entries().iter() {
        assert_eq!(entry.color(), teal);
        let node = session.store().resolve(&entry.node).expect("node resolves");
        assert_eq!(ColorVector::from_json(node), Ok(teal));
    }
    assert_eq!(groups[0].color(), teal);
    assert_eq!(groups[0].count(), 3);
    assert_eq!(groups[0].assets().len(), 2);

    let regrouped = session.regroup();
    assert_eq!(regrouped.len(), 1);
    assert_eq!(regrouped[0].key(), teal.key());
}

#[tokio::test]
async fn sync_pairs_min_and_max_within_one_module_only() {
    let (_dir, mut session, _a, _b) = two_asset_session().await;
    let ids: Vec<_> = session.entries().iter().map(|(id, _)| id).collect();
    let red = ColorVector::new(1.0, 0.0, 0.0);

    // ids[0] is A MIN, ids[1] is A MAX, ids[2] is B MIN (no sibling).
    let touched = session
        .recolor_entry(ids[0], red, SyncPolicy::Enabled)
        .expect("recolor");
    assert_eq!(touched, vec![ids[0], ids[1]]);

    let touched = session
        .recolor_entry(ids[2], red, SyncPolicy::Enabled)
        .expect("recolor");
    assert_eq!(touched, vec![ids[2]]);

    let blue = ColorVector::new(0.0, 0.0, 1.0);
    session
        .recolor_entry(ids[1], blue, SyncPolicy::Disabled)
        .expect("recolor");
    let colors: Vec<ColorVector> = session.entries().iter().map(|(_, e)| e.color()).collect();
    assert_eq!(colors, vec![red, blue, red]);
}

#[tokio::test]
async fn five_decimal_grouping_merges_a_sixth_decimal_difference() {
    let dir = AssetDir::new();
    let a = dir.asset("A.uasset");
    let b = dir.asset("B.uasset");
    let converter = FakeConverter::new()
        .with_fixture(
            &a,
            asset_document(vec![color_over_life(
                "ParticleModuleColorOverLife_0",
                [0.1, 0.2, 0.3],
                [0.1, 0.2, 0.3],
            )]),
        )
        .with_fixture(
            &b,
            asset_document(vec![start_color("ParticleModuleColor_1", [0.100001, 0.2, 0.3])]),
        );
    let mut config = ChromaConfig::default();
    config.grouping.decimals = 5;
    let mut session = Session::new(config, Arc::new(converter));
    session
        .load(&[a.clone(), b.clone()], |_| {})
        .await
        .expect("load");

    let groups = session.regroup();

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].count(), 3);
    assert!(groups[0].affects_min() && groups[0].affects_max());
    assert_eq!(groups[0].assets().len(), 2);
}
