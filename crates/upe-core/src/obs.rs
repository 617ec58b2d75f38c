//! Structured observability hooks for the UPE run lifecycle.
//!
//! Every event carries an `event` field naming it (`compile.started`,
//! `gate.evaluated`, ...) and the `run_id` it belongs to, so a JSON log
//! stream can be filtered per run without parsing messages.
//!
//! Set `UPE_LOG_FORMAT=json` for JSON output; `RUST_LOG` controls filtering.

use tracing::{info, warn};

use crate::domain::manifest::{ArtifactKind, RunStatus};

/// Emit event: compile accepted and a run id allocated.
pub fn emit_compile_started(run_id: &str, mode: &str, primary: ArtifactKind, seed: u64) {
    info!(
        event = "compile.started",
        run_id = %run_id,
        mode = %mode,
        primary = %primary,
        seed = seed,
    );
}

/// Emit event: one committee candidate scored.
pub fn emit_candidate_scored(run_id: &str, candidate_id: &str, score: f64, failed: bool) {
    info!(
        event = "candidate.scored",
        run_id = %run_id,
        candidate_id = %candidate_id,
        score = score,
        failed = failed,
    );
}

/// Emit event: a gate produced a verdict.
pub fn emit_gate_evaluated(run_id: &str, gate: &str, passed: bool, reason: &str) {
    info!(
        event = "gate.evaluated",
        run_id = %run_id,
        gate = %gate,
        passed = passed,
        reason = %reason,
    );
}

/// Emit event: an artifact was rendered, validated and stored.
pub fn emit_artifact_rendered(run_id: &str, kind: ArtifactKind, byte_size: u64, primary: bool) {
    info!(
        event = "artifact.rendered",
        run_id = %run_id,
        kind = %kind,
        byte_size = byte_size,
        primary = primary,
    );
}

/// Emit event: terminal status reached.
pub fn emit_run_finished(run_id: &str, status: RunStatus, duration_ms: u64) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        status = %status,
        duration_ms = duration_ms,
    );
}

/// Emit event: edit ops applied to a stored run.
pub fn emit_feedback_applied(run_id: &str, op_count: usize) {
    info!(event = "feedback.applied", run_id = %run_id, op_count = op_count);
}

/// Emit event: the manifest of a failed run could not be written (warning level).
pub fn emit_run_persist_error(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.persist_error", run_id = %run_id, error = %error);
}
