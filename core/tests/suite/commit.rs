use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use chromaflux_core::ChromaConfig;
use chromaflux_core::ChromaError;
use chromaflux_core::ColorVector;
use chromaflux_core::CommitScope;
use chromaflux_core::ErrorKind;
use chromaflux_core::Session;
use chromaflux_core::SyncPolicy;
use core_test_support::AssetDir;
use core_test_support::FakeConverter;
use core_test_support::asset_document;
use core_test_support::color_over_life;
use core_test_support::original_bytes;
use pretty_assertions::assert_eq;
use serde_json::Value;

struct Fixture {
    _dir: AssetDir,
    converter: Arc<FakeConverter>,
    session: Session,
    a: PathBuf,
    b: PathBuf,
}

async fn fixture(config: ChromaConfig) -> Fixture {
    let dir = AssetDir::new();
    let a = dir.asset("P_A.uasset");
    let b = dir.asset("P_B.uasset");
    let converter = Arc::new(
        FakeConverter::new()
            .with_fixture(
                &a,
                asset_document(vec![color_over_life(
                    "ParticleModuleColorOverLife_0",
                    [0.25, 0.5, 0.75],
                    [0.1, 0.1, 0.1],
                )]),
            )
            .with_fixture(
                &b,
                asset_document(vec![color_over_life(
                    "ParticleModuleColorOverLife_2",
                    [0.25, 0.5, 0.75],
                    [0.9, 0.9, 0.9],
                )]),
            ),
    );
    let mut session = Session::new(config, converter.clone());
    session
        .load(&[a.clone(), b.clone()], |_| {})
        .await
        .expect("load");
    Fixture {
        _dir: dir,
        converter,
        session,
        a,
        b,
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).expect("read")).expect("json")
}

fn min_color_in(asset_json: &Value) -> Value {
    asset_json["Exports"][0]["Data"][1]["Value"][0]["Value"][0]["Value"].clone()
}

#[tokio::test]
async fn one_failing_document_does_not_block_the_other() {
    let mut fx = fixture(ChromaConfig::default()).await;
    let mut groups = fx.session.regroup();
    let shared = groups
        .iter_mut()
        .find(|g| g.count() == 2)
        .expect("shared color group");
    let red = ColorVector::new(1.0, 0.0, 0.0);
    fx.session
        .recolor_group(shared, red, SyncPolicy::Disabled)
        .expect("recolor");
    fx.converter.fail_import(&fx.b);

    let report = fx.session.commit().await;

    assert_eq!(report.documents.len(), 2);
    assert_eq!(
        report.committed().map(|d| d.asset_path.clone()).collect::<Vec<_>>(),
        vec![fx.a.clone()]
    );
    assert_eq!(
        report.failed().map(|d| d.asset_path.clone()).collect::<Vec<_>>(),
        vec![fx.b.clone()]
    );

    // Succeeding document: JSON gone, binary rebuilt with the new color.
    assert!(!fx.a.with_extension("json").exists());
    let rebuilt = read_json(&fx.a);
    assert_eq!(min_color_in(&rebuilt)["X"], Value::from(1.0));
    assert_eq!(min_color_in(&rebuilt)["Y"], Value::from(0.0));

    // Failing document: JSON left for a retry, binary restored.
    assert!(fx.b.with_extension("json").exists());
    assert_eq!(std::fs::read(&fx.b).expect("read b"), original_bytes("P_B.uasset"));

    match report.into_result() {
        Err(ChromaError::PartialCommitFailure { committed, failed }) => {
            assert_eq!(committed, vec![fx.a.with_extension("json")]);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].json_path, fx.b.with_extension("json"));
        }
        other => panic!("expected partial commit failure, got {other:?}"),
    }

    // Only the failed document is still pending; a retry picks it up.
    assert_eq!(fx.session.touched_documents().len(), 1);
    fx.converter.clear_failures();
    let retry = fx.session.commit().await;
    assert!(retry.is_success());
    assert_eq!(retry.documents.len(), 1);
    assert!(!fx.b.with_extension("json").exists());
    assert!(fx.session.touched_documents().is_empty());
}

#[tokio::test]
async fn untouched_documents_are_not_rebuilt() {
    let mut fx = fixture(ChromaConfig::default()).await;
    let max_of_b = fx
        .session
        .entries()
        .iter()
        .find(|(_, e)| e.module == "ParticleModuleColorOverLife_2" && e.mode.is_max_side())
        .map(|(id, _)| id)
        .expect("b max entry");

    fx.session
        .recolor_entry(max_of_b, ColorVector::new(0.0, 0.0, 0.0), SyncPolicy::Disabled)
        .expect("recolor");
    let report = fx.session.commit().await;

    assert!(report.is_success());
    assert_eq!(fx.converter.import_calls(), 1);
    assert_eq!(std::fs::read(&fx.a).expect("read a"), original_bytes("P_A.uasset"));
}

#[tokio::test]
async fn recoloring_back_to_the_loaded_value_is_not_a_change() {
    let mut fx = fixture(ChromaConfig::default()).await;
    let (id, original) = fx
        .session
        .entries()
        .iter()
        .map(|(id, e)| (id, e.color()))
        .next()
        .expect("entry");

    fx.session
        .recolor_entry(id, ColorVector::new(0.3, 0.3, 0.3), SyncPolicy::Disabled)
        .expect("recolor");
    fx.session
        .recolor_entry(id, original, SyncPolicy::Disabled)
        .expect("recolor back");

    assert!(fx.session.touched_documents().is_empty());
}

#[tokio::test]
async fn all_loaded_scope_round_trips_unmodified_documents() {
    let mut config = ChromaConfig::default();
    config.commit.scope = CommitScope::AllLoaded;
    let mut fx = fixture(config).await;
    let expected = read_json(&fx.a.with_extension("json"));

    let report = fx.session.commit().await;

    assert!(report.is_success());
    assert_eq!(fx.converter.import_calls(), 2);
    let rebuilt = read_json(&fx.a);
    assert_eq!(
        serde_json::to_string(&rebuilt).expect("serialize"),
        serde_json::to_string(&expected).expect("serialize"),
        "key order and numbers survive a write-back"
    );
}

#[tokio::test]
async fn keep_json_leaves_intermediate_files() {
    let mut config = ChromaConfig::default();
    config.commit.scope = CommitScope::AllLoaded;
    config.commit.keep_json = true;
    let mut fx = fixture(config).await;

    let report = fx.session.commit().await;

    assert!(report.is_success());
    assert!(fx.a.with_extension("json").exists());
    assert!(fx.b.with_extension("json").exists());
}

#[tokio::test]
async fn commit_makes_existing_groups_stale() {
    let mut fx = fixture(ChromaConfig::default()).await;
    let mut groups = fx.session.regroup();

    fx.session.commit().await;

    let err = fx
        .session
        .recolor_group(&mut groups[0], ColorVector::new(0.5, 0.5, 0.5), SyncPolicy::Disabled)
        .expect_err("groups are stale");
    assert_eq!(err.kind(), ErrorKind::StaleGroups);

    let mut fresh = fx.session.regroup();
    fx.session
        .recolor_group(&mut fresh[0], ColorVector::new(0.5, 0.5, 0.5), SyncPolicy::Disabled)
        .expect("fresh groups");
}

#[tokio::test]
async fn written_json_uses_configured_indent() {
    let mut config = ChromaConfig::default();
    config.commit.scope = CommitScope::AllLoaded;
    config.commit.json_indent = 2;
    let mut fx = fixture(config).await;

    fx.session.commit().await;

    let text = std::fs::read_to_string(&fx.a).expect("read");
    assert!(text.starts_with("{\n  \"Info\""), "{text}");
}

#[tokio::test]
async fn close_keeps_json_only_for_uncommitted_edits() {
    let mut fx = fixture(ChromaConfig::default()).await;
    let mut groups = fx.session.regroup();
    let shared = groups
        .iter_mut()
        .find(|g| g.count() == 2)
        .expect("shared color group");
    fx.session
        .recolor_group(shared, ColorVector::new(0.0, 1.0, 0.0), SyncPolicy::Disabled)
        .expect("recolor");
    fx.converter.fail_import(&fx.b);
    fx.session.commit().await;

    fx.session.close().expect("close");

    assert!(!fx.a.with_extension("json").exists());
    assert!(fx.b.with_extension("json").exists());
    assert!(fx.session.entries().is_empty());
}

#[tokio::test]
async fn import_that_writes_no_asset_fails_and_restores_it() {
    let mut fx = fixture(ChromaConfig::default()).await;
    let mut groups = fx.session.regroup();
    let shared = groups
        .iter_mut()
        .find(|g| g.count() == 2)
        .expect("shared color group");
    fx.session
        .recolor_group(shared, ColorVector::new(0.0, 0.0, 1.0), SyncPolicy::Disabled)
        .expect("recolor");
    fx.converter.silent_import(&fx.a);

    let report = fx.session.commit().await;

    let failed: Vec<_> = report.failed().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].asset_path, fx.a);
    let reason = failed[0].result.as_ref().err().map(ToString::to_string).unwrap_or_default();
    assert!(reason.contains("did not rebuild"), "{reason}");
    assert_eq!(std::fs::read(&fx.a).expect("read a"), original_bytes("P_A.uasset"));
    assert!(fx.a.with_extension("json").exists());
    assert_eq!(fx.session.touched_documents().len(), 1);

    let leftovers: Vec<String> = std::fs::read_dir(fx.a.parent().expect("parent"))
        .expect("read dir")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".orig"))
        .collect();
    assert_eq!(leftovers, Vec::<String>::new());
}
