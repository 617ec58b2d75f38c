//! Compile and feedback request/response contracts.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, UpeError};
use crate::domain::manifest::{ArtifactKind, ArtifactMeta, RunStatus};
use crate::followups::Followup;
use crate::retrieval::SnapshotEntry;

/// Wire version accepted and emitted by the engine.
pub const PROTOCOL_VERSION: &str = "1.0.0";

fn protocol_version() -> String {
    PROTOCOL_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

/// Quality hint carried with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Fast,
    Balanced,
    TInf,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Fast => "fast",
            Quality::Balanced => "balanced",
            Quality::TInf => "t_inf",
        }
    }
}

impl FromStr for Quality {
    type Err = UpeError;

    fn from_str(s: &str) -> Result<Self> {
        [Quality::Fast, Quality::Balanced, Quality::TInf]
            .into_iter()
            .find(|q| q.as_str() == s)
            .ok_or_else(|| UpeError::InvalidRequest(format!("unsupported quality: {s}")))
    }
}

/// Which artifacts to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ArtifactRequest {
    pub primary: ArtifactKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondaries: Vec<ArtifactKind>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layout_hints: BTreeMap<String, String>,
}

impl ArtifactRequest {
    pub fn new(primary: ArtifactKind) -> Self {
        Self {
            primary,
            secondaries: Vec::new(),
            layout_hints: BTreeMap::new(),
        }
    }

    /// Secondaries in request order, without duplicates or the primary kind.
    pub fn secondary_kinds(&self) -> Vec<ArtifactKind> {
        let mut kinds = Vec::new();
        for kind in &self.secondaries {
            if *kind != self.primary && !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }
}

/// Input of [`crate::Engine::compile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompileRequest {
    #[serde(default = "protocol_version")]
    pub v: String,
    pub goal: String,
    #[serde(default = "default_true")]
    pub yafa_on: bool,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<Quality>,
    /// Free-form named values folded into the prompt context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub slots: BTreeMap<String, String>,
    /// Run this one revises, for lineage only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub artifact: ArtifactRequest,
}

impl CompileRequest {
    pub fn new(goal: impl Into<String>, mode: impl Into<String>, primary: ArtifactKind) -> Self {
        Self {
            v: protocol_version(),
            goal: goal.into(),
            yafa_on: true,
            mode: mode.into(),
            seed: None,
            quality: None,
            slots: BTreeMap::new(),
            parent_id: None,
            artifact: ArtifactRequest::new(primary),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_secondaries(mut self, kinds: impl IntoIterator<Item = ArtifactKind>) -> Self {
        self.artifact.secondaries = kinds.into_iter().collect();
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_slot(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.slots.insert(key.into(), value.into());
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Reject requests the pipeline cannot act on.
    pub fn validate(&self) -> Result<()> {
        if self.v != PROTOCOL_VERSION {
            return Err(UpeError::InvalidRequest(format!(
                "unsupported version {:?}, expected {PROTOCOL_VERSION}",
                self.v
            )));
        }
        if self.goal.trim().is_empty() {
            return Err(UpeError::InvalidRequest("goal must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Reproduction bundle handed back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub engineered_prompt: String,
    pub run_instructions: String,
    pub followups: Vec<Followup>,
}

/// Evidence summary of the winning candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSummary {
    pub rubric_score: f64,
    pub sources: Vec<SnapshotEntry>,
    pub judge_note: String,
}

/// Output of [`crate::Engine::compile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResponse {
    pub v: String,
    pub bundle: Bundle,
    pub manifest_id: String,
    pub seed: u64,
    pub model: String,
    pub cartridge: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof: Option<ProofSummary>,
    pub status: RunStatus,
}

/// Input of [`crate::Engine::feedback`]. Ops stay raw JSON and are parsed
/// leniently by [`crate::edit::EditOp::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub ops: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

impl FeedbackRequest {
    pub fn new(ops: Vec<serde_json::Value>) -> Self {
        Self {
            scope: None,
            ops,
            rationale: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub status: RunStatus,
    /// The `op` tag of every submitted op, recognized or not.
    pub touched: Vec<Option<String>>,
    /// Re-rendered primary artifact.
    pub artifact: ArtifactMeta,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_parses_camel_case_wire_form() {
        let req: CompileRequest = serde_json::from_value(json!({
            "v": "1.0.0",
            "goal": "Q3 board deck",
            "mode": "mentor",
            "seed": 7,
            "parentId": "run-0",
            "artifact": { "primary": "pptx", "secondaries": ["pdf"], "layoutHints": { "theme": "dark" } }
        }))
        .unwrap();
        assert_eq!(req.seed, Some(7));
        assert_eq!(req.parent_id.as_deref(), Some("run-0"));
        assert_eq!(req.artifact.primary, ArtifactKind::Pptx);
        assert_eq!(req.artifact.layout_hints["theme"], "dark");
        req.validate().unwrap();
    }

    #[test]
    fn version_defaults_when_absent() {
        let req: CompileRequest = serde_json::from_value(json!({
            "goal": "g",
            "mode": "turbo",
            "artifact": { "primary": "html" }
        }))
        .unwrap();
        assert_eq!(req.v, PROTOCOL_VERSION);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let res = serde_json::from_value::<CompileRequest>(json!({
            "goal": "g",
            "mode": "turbo",
            "artifact": { "primary": "html" },
            "extra": true
        }));
        assert!(res.is_err());
    }

    #[test]
    fn yafa_and_quality_are_accepted() {
        let req: CompileRequest = serde_json::from_value(json!({
            "v": "1.0.0",
            "goal": "g",
            "yafaOn": false,
            "mode": "proof",
            "quality": "t_inf",
            "artifact": { "primary": "html" }
        }))
        .unwrap();
        assert!(!req.yafa_on);
        assert_eq!(req.quality, Some(Quality::TInf));

        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["yafaOn"], false);
        assert_eq!(json["quality"], "t_inf");
    }

    #[test]
    fn yafa_defaults_on_and_quality_is_closed() {
        let req: CompileRequest = serde_json::from_value(json!({
            "goal": "g",
            "mode": "turbo",
            "artifact": { "primary": "html" }
        }))
        .unwrap();
        assert!(req.yafa_on);
        assert_eq!(req.quality, None);
        assert_eq!("balanced".parse::<Quality>().unwrap(), Quality::Balanced);
        assert!("max".parse::<Quality>().is_err());

        let res = serde_json::from_value::<CompileRequest>(json!({
            "goal": "g",
            "mode": "turbo",
            "quality": "max",
            "artifact": { "primary": "html" }
        }));
        assert!(res.is_err());
    }

    #[test]
    fn validate_rejects_blank_goal_and_bad_version() {
        let blank = CompileRequest::new("  ", "turbo", ArtifactKind::Html);
        assert!(matches!(blank.validate(), Err(UpeError::InvalidRequest(_))));

        let mut old = CompileRequest::new("g", "turbo", ArtifactKind::Html);
        old.v = "0.9.0".to_string();
        assert!(matches!(old.validate(), Err(UpeError::InvalidRequest(ref m)) if m.contains("0.9.0")));
    }

    #[test]
    fn secondary_kinds_skip_primary_and_duplicates() {
        let req = CompileRequest::new("g", "turbo", ArtifactKind::Pdf).with_secondaries([
            ArtifactKind::Html,
            ArtifactKind::Pdf,
            ArtifactKind::Html,
            ArtifactKind::Docx,
        ]);
        assert_eq!(
            req.artifact.secondary_kinds(),
            vec![ArtifactKind::Html, ArtifactKind::Docx]
        );
    }
}
