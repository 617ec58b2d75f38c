//! Run manifests on the filesystem store: layout, reload across engine
//! instances, and fingerprint stability.

use std::sync::Arc;

use serde_json::{json, Value};
use upe_core::{
    ArtifactKind, CompileRequest, Engine, EngineConfig, FeedbackRequest, RunStatus,
    ScriptedOracle,
};
use upe_state::FsRunStore;

fn output() -> Value {
    json!({
        "title": "Launch Plan",
        "sections": [
            { "heading": "Executive Summary", "blocks": [{ "kind": "para", "text": "Ship in May to three regions" }] },
            { "heading": "Risks", "blocks": [{ "type": "table", "rows": [["Risk", "Owner"], ["Supply", "Ops"]] }] }
        ]
    })
}

fn engine_at(root: &std::path::Path) -> Engine {
    let store = FsRunStore::new(root).expect("store");
    Engine::new(
        EngineConfig::default().with_storage_dir(root),
        Arc::new(ScriptedOracle::constant(output())),
        Arc::new(store),
    )
}

#[tokio::test]
async fn compile_writes_run_directory() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_at(dir.path());
    let req = CompileRequest::new("Plan the launch", "turbo", ArtifactKind::Html).with_seed(9);
    let resp = engine.compile(req).await.unwrap();

    let run_dir = dir.path().join(&resp.manifest_id);
    for name in ["manifest.json", "ledger.json", "artifact.html"] {
        assert!(run_dir.join(name).is_file(), "missing {name}");
    }

    let raw: Value =
        serde_json::from_str(&std::fs::read_to_string(run_dir.join("manifest.json")).unwrap())
            .unwrap();
    assert_eq!(raw["status"], "OK");
    assert_eq!(raw["request"]["artifact"]["primary"], "html");

    let html = std::fs::read_to_string(run_dir.join("artifact.html")).unwrap();
    assert!(html.contains("<td>Supply</td>"));
}

#[tokio::test]
async fn runs_survive_a_new_engine() {
    let dir = tempfile::tempdir().unwrap();
    let resp = engine_at(dir.path())
        .compile(CompileRequest::new("Plan", "turbo", ArtifactKind::Html))
        .await
        .unwrap();

    let reopened = engine_at(dir.path());
    let runs = reopened.list_runs().await.unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].as_str(), resp.manifest_id);

    let manifest = reopened.get_run(&resp.manifest_id).await.unwrap();
    assert_eq!(manifest.status, RunStatus::Ok);
    assert_eq!(manifest.engine.unwrap().seed, resp.seed);

    let out = reopened
        .feedback(
            &resp.manifest_id,
            FeedbackRequest::new(vec![json!({ "op": "remove", "target": "risks" })]),
        )
        .await
        .unwrap();
    assert!(out.artifact.byte_size > 0);
    let edited = reopened.get_run(&resp.manifest_id).await.unwrap();
    assert_eq!(edited.document.unwrap().sections.len(), 1);
}

#[tokio::test]
async fn fingerprint_is_stable_until_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_at(dir.path());
    let resp = engine
        .compile(CompileRequest::new("Plan", "turbo", ArtifactKind::Html).with_seed(5))
        .await
        .unwrap();

    let first = engine.get_run(&resp.manifest_id).await.unwrap().fingerprint().unwrap();
    let second = engine.get_run(&resp.manifest_id).await.unwrap().fingerprint().unwrap();
    assert_eq!(first, second);

    engine
        .feedback(
            &resp.manifest_id,
            FeedbackRequest::new(vec![json!({ "op": "rewrite", "target": "tone", "to": "brief" })]),
        )
        .await
        .unwrap();
    let after = engine.get_run(&resp.manifest_id).await.unwrap().fingerprint().unwrap();
    assert_ne!(first, after);
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let engine = engine_at(dir.path());
    let err = engine.get_run("run-nope").await.unwrap_err();
    assert_eq!(err.code(), "run_not_found");
    let err = engine.get_ledger("run-nope").await.unwrap_err();
    assert_eq!(err.code(), "run_not_found");
}
