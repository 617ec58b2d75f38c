//! Evidence and format gates.
//!
//! Both gates are pure functions from their inputs to a verdict carrying a
//! stable reason code. The pipeline decides what a failure means: an evidence
//! miss ends the run as `INSUFFICIENT_CONTEXT`, a format miss is fatal.

use serde::{Deserialize, Serialize};

use crate::domain::manifest::ArtifactKind;
use crate::gear::GearProfile;

// ---------------------------------------------------------------------------
// Evidence gate
// ---------------------------------------------------------------------------

/// Thresholds of the evidence gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidencePolicy {
    pub rubric_minimum: f64,
    pub min_citations: u32,
}

impl EvidencePolicy {
    /// Thresholds of a gated profile, with defaults for unset values.
    pub fn for_profile(profile: &GearProfile) -> Self {
        Self {
            rubric_minimum: profile.effective_rubric_minimum(),
            min_citations: profile.effective_min_citations(),
        }
    }
}

/// What the gate looks at: the winning candidate plus the judge's triangulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceInput {
    pub score: f64,
    pub citation_count: usize,
    pub triangulated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceReason {
    Ok,
    ScoreBelowThreshold,
    NotEnoughEvidence,
    NoDualPathAgreement,
}

impl EvidenceReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceReason::Ok => "ok",
            EvidenceReason::ScoreBelowThreshold => "score_below_threshold",
            EvidenceReason::NotEnoughEvidence => "not_enough_evidence",
            EvidenceReason::NoDualPathAgreement => "no_dual_path_agreement",
        }
    }
}

impl std::fmt::Display for EvidenceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceVerdict {
    pub passed: bool,
    pub reason: EvidenceReason,
}

/// Checks run in order and the first failure wins: score, then citation
/// count, then triangulation.
pub fn evidence_gate(policy: &EvidencePolicy, input: &EvidenceInput) -> EvidenceVerdict {
    let reason = if input.score < policy.rubric_minimum {
        EvidenceReason::ScoreBelowThreshold
    } else if input.citation_count < policy.min_citations as usize {
        EvidenceReason::NotEnoughEvidence
    } else if !input.triangulated {
        EvidenceReason::NoDualPathAgreement
    } else {
        EvidenceReason::Ok
    };
    EvidenceVerdict {
        passed: reason == EvidenceReason::Ok,
        reason,
    }
}

// ---------------------------------------------------------------------------
// Format gate
// ---------------------------------------------------------------------------

pub const FORMAT_OK: &str = "ok";
pub const MISSING_PRIMARY_ARTIFACT: &str = "missing_primary_artifact";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatVerdict {
    pub passed: bool,
    pub reason: &'static str,
}

/// Pass iff the requested primary kind is among the produced kinds.
pub fn format_gate(primary: ArtifactKind, produced: &[ArtifactKind]) -> FormatVerdict {
    if produced.contains(&primary) {
        FormatVerdict {
            passed: true,
            reason: FORMAT_OK,
        }
    } else {
        FormatVerdict {
            passed: false,
            reason: MISSING_PRIMARY_ARTIFACT,
        }
    }
}
