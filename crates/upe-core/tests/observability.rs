//! Observability tests for the UPE run lifecycle.
//!
//! The emitters are exercised directly and through a full compile; the
//! assertions on captured log lines live next to the emitters in `obs.rs`.

use std::sync::Arc;

use serde_json::json;
use tracing_test::traced_test;
use upe_core::{
    emit_artifact_rendered, emit_candidate_scored, emit_compile_started, emit_feedback_applied,
    emit_gate_evaluated, emit_run_finished, emit_run_persist_error, ArtifactKind, CompileRequest,
    Engine, EngineConfig, FeedbackRequest, RunStatus, ScriptedOracle,
};
use upe_state::fakes::MemoryRunStore;

#[traced_test]
#[test]
fn test_emit_compile_started() {
    emit_compile_started("run-123", "turbo", ArtifactKind::Html, 42);
}

#[traced_test]
#[test]
fn test_emit_candidate_scored_for_failed_candidate() {
    emit_candidate_scored("run-123", "C2", 0.0, true);
}

#[traced_test]
#[test]
fn test_emit_gate_evaluated() {
    emit_gate_evaluated("run-gate-001", "format", true, "ok");
}

#[traced_test]
#[test]
fn test_emit_artifact_rendered() {
    emit_artifact_rendered("run-123", ArtifactKind::Pdf, 1024, false);
}

#[traced_test]
#[test]
fn test_emit_run_finished() {
    emit_run_finished("run-456", RunStatus::Ok, 5000);
}

#[traced_test]
#[test]
fn test_emit_feedback_applied() {
    emit_feedback_applied("run-789", 3);
}

#[traced_test]
#[test]
fn test_emit_run_persist_error() {
    let error_msg = "disk full";
    emit_run_persist_error("run-err-001", &error_msg);
}

/// A full compile plus feedback emits the whole lifecycle without panicking
/// inside the instrumented spans.
#[traced_test]
#[tokio::test]
async fn test_compile_and_feedback_under_subscriber() {
    let output = json!({
        "title": "Traced",
        "sections": [
            { "heading": "One", "blocks": [{ "kind": "para", "text": "a b c" }] },
            { "heading": "Two", "blocks": [] }
        ]
    });
    let engine = Engine::new(
        EngineConfig::default(),
        Arc::new(ScriptedOracle::constant(output)),
        Arc::new(MemoryRunStore::new()),
    );
    let req = CompileRequest::new("trace me", "mentor", ArtifactKind::Html).with_seed(3);
    let resp = engine.compile(req).await.expect("compile");
    assert_eq!(resp.status, RunStatus::Ok);

    let feedback = FeedbackRequest::new(vec![json!({ "op": "focus", "topic": "margins" })]);
    let out = engine
        .feedback(&resp.manifest_id, feedback)
        .await
        .expect("feedback");
    assert_eq!(out.touched, vec![Some("focus".to_string())]);
}
