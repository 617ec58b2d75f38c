//! Next-action suggestions attached to every successful run.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Dimension a suggestion is expected to improve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Impact {
    Quality,
    Latency,
    Safety,
    Accuracy,
    Cost,
    Format,
    Automation,
}

/// Route plus request body that carries the suggestion out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupAction {
    pub route: String,
    pub request_body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Followup {
    pub id: String,
    pub label: String,
    pub rationale: String,
    pub action: FollowupAction,
    pub impact: Vec<Impact>,
}

/// Word budget used by the `tighten_scope` suggestion.
pub const TIGHTEN_MAX_WORDS: usize = 180;

/// The fixed suggestion set: verify claims, export as PDF, tighten scope.
///
/// `goal` and `mode` are accepted for parity with the request that produced
/// the run; the current set does not vary with them.
pub fn followups_for(_goal: &str, _mode: &str, run_id: &str) -> Vec<Followup> {
    vec![
        Followup {
            id: "verify_claims".to_string(),
            label: "Verify claims".to_string(),
            rationale: "Increase evidence thresholds and re-run judge.".to_string(),
            action: FollowupAction {
                route: "/upe/compile".to_string(),
                request_body: json!({ "mode": "proof" }),
            },
            impact: vec![Impact::Accuracy, Impact::Safety, Impact::Quality],
        },
        Followup {
            id: "transform_pdf".to_string(),
            label: "Also export as PDF".to_string(),
            rationale: "Share a read-only version.".to_string(),
            action: FollowupAction {
                route: "/upe/compile".to_string(),
                request_body: json!({ "artifact": { "secondaries": ["pdf"] } }),
            },
            impact: vec![Impact::Format],
        },
        Followup {
            id: "tighten_scope".to_string(),
            label: "Tighten scope".to_string(),
            rationale: "Reduce length, enforce must-include list.".to_string(),
            action: FollowupAction {
                route: format!("/upe/runs/{run_id}/feedback"),
                request_body: json!({
                    "ops": [{ "op": "limit", "section": "Executive Summary", "max_words": TIGHTEN_MAX_WORDS }]
                }),
            },
            impact: vec![Impact::Quality, Impact::Latency],
        },
    ]
}
