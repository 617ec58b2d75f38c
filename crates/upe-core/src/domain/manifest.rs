//! Run manifest: the persisted provenance record of one compile.
//!
//! JSON keys are camelCase and the status enum serializes as
//! `OK | INSUFFICIENT_CONTEXT | POLICY_BLOCK | TOOL_ERROR`. Both are consumed
//! by feedback and suggestion calls and by anything reading the store
//! directly, so treat the layout as a public contract.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use upe_state::{ContentDigest, RunId, RunStore, StorageError, StoredObject};

use crate::domain::digest::digest_of;
use crate::domain::document::Document;
use crate::domain::error::{Result, UpeError};
use crate::domain::request::CompileRequest;
use crate::retrieval::SnapshotEntry;

/// Object name of the manifest inside a run namespace.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Object name of the judge ledger inside a run namespace.
pub const LEDGER_FILE: &str = "ledger.json";

/// Terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Ok,
    InsufficientContext,
    PolicyBlock,
    ToolError,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Ok => "OK",
            RunStatus::InsufficientContext => "INSUFFICIENT_CONTEXT",
            RunStatus::PolicyBlock => "POLICY_BLOCK",
            RunStatus::ToolError => "TOOL_ERROR",
        }
    }

    /// Parse the wire form; `None` for anything else.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "OK" => Some(RunStatus::Ok),
            "INSUFFICIENT_CONTEXT" => Some(RunStatus::InsufficientContext),
            "POLICY_BLOCK" => Some(RunStatus::PolicyBlock),
            "TOOL_ERROR" => Some(RunStatus::ToolError),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output formats the engine knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Pptx,
    Docx,
    Xlsx,
    Pdf,
    Html,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 5] = [
        ArtifactKind::Pptx,
        ArtifactKind::Docx,
        ArtifactKind::Xlsx,
        ArtifactKind::Pdf,
        ArtifactKind::Html,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Pptx => "pptx",
            ArtifactKind::Docx => "docx",
            ArtifactKind::Xlsx => "xlsx",
            ArtifactKind::Pdf => "pdf",
            ArtifactKind::Html => "html",
        }
    }

    /// Object name of the rendered artifact in the run namespace.
    pub fn file_name(&self) -> String {
        format!("artifact.{}", self.as_str())
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = UpeError;

    fn from_str(s: &str) -> Result<Self> {
        ArtifactKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UpeError::InvalidRequest(format!("unsupported artifact kind: {s}")))
    }
}

/// One rendered and validated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMeta {
    pub kind: ArtifactKind,
    pub path: String,
    pub byte_size: u64,
    pub content_hash: ContentDigest,
    pub is_primary: bool,
}

impl ArtifactMeta {
    pub fn from_stored(kind: ArtifactKind, stored: StoredObject, is_primary: bool) -> Self {
        Self {
            kind,
            path: stored.path,
            byte_size: stored.byte_size,
            content_hash: stored.content_hash,
            is_primary,
        }
    }
}

/// Engine parameters the run was compiled with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineRecord {
    pub gear: String,
    pub model: String,
    pub cartridge: String,
    pub seed: u64,
    pub candidate_count: usize,
    pub temperatures: Vec<f64>,
    /// SHA-256 of the compiled prompt BOM.
    pub prompt_digest: ContentDigest,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalRecord {
    pub top_k: usize,
    pub snapshot: Vec<SnapshotEntry>,
}

/// Per-candidate outcome, stored in generation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    pub id: String,
    pub seed: u64,
    pub temperature: f64,
    pub score: f64,
    pub section_count: usize,
    pub citation_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JudgeRecord {
    pub winner_id: String,
    pub score: f64,
    pub triangulated: bool,
    pub note: String,
}

/// Wall-clock phase durations in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    pub committee_ms: f64,
    pub render_ms: f64,
    pub total_ms: f64,
}

/// Diagnostic attached to TOOL_ERROR manifests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
}

impl From<&UpeError> for RunError {
    fn from(err: &UpeError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Full persisted run record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunManifest {
    pub id: RunId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub request: CompileRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineRecord>,
    #[serde(default)]
    pub retrieval: RetrievalRecord,
    #[serde(default)]
    pub committee: Vec<CandidateRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub judge: Option<JudgeRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactMeta>,
    #[serde(default)]
    pub timings: Timings,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl RunManifest {
    /// SHA-256 of the canonical (key-sorted, compact) JSON encoding.
    pub fn fingerprint(&self) -> Result<ContentDigest> {
        digest_of(self)
    }

    pub fn primary_artifact(&self) -> Option<&ArtifactMeta> {
        self.artifacts.iter().find(|a| a.is_primary)
    }

    /// Check the OK-manifest invariant: exactly one primary artifact, of the
    /// requested primary kind.
    pub fn check_primary(&self) -> std::result::Result<(), String> {
        let primaries: Vec<&ArtifactMeta> = self.artifacts.iter().filter(|a| a.is_primary).collect();
        match primaries.as_slice() {
            [only] if only.kind == self.request.artifact.primary => Ok(()),
            [only] => Err(format!(
                "primary artifact is {}, requested {}",
                only.kind, self.request.artifact.primary
            )),
            other => Err(format!("expected one primary artifact, found {}", other.len())),
        }
    }
}

/// Accumulates manifest fields while a compile is in flight.
///
/// Sealing consumes the draft, so each run gets exactly one terminal status.
#[derive(Debug, Clone)]
pub struct ManifestDraft {
    pub id: RunId,
    pub created_at: DateTime<Utc>,
    pub request: CompileRequest,
    pub engine: Option<EngineRecord>,
    pub retrieval: RetrievalRecord,
    pub committee: Vec<CandidateRecord>,
    pub judge: Option<JudgeRecord>,
    pub document: Option<Document>,
    pub artifacts: Vec<ArtifactMeta>,
    pub timings: Timings,
}

impl ManifestDraft {
    pub fn new(id: RunId, request: CompileRequest) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            request,
            engine: None,
            retrieval: RetrievalRecord::default(),
            committee: Vec::new(),
            judge: None,
            document: None,
            artifacts: Vec::new(),
            timings: Timings::default(),
        }
    }

    pub fn seal(self, status: RunStatus, error: Option<RunError>) -> RunManifest {
        RunManifest {
            parent_id: self.request.parent_id.clone(),
            id: self.id,
            created_at: self.created_at,
            request: self.request,
            engine: self.engine,
            retrieval: self.retrieval,
            committee: self.committee,
            judge: self.judge,
            document: self.document,
            artifacts: self.artifacts,
            timings: self.timings,
            status,
            error,
        }
    }
}

// ---------------------------------------------------------------------------
// Store helpers
// ---------------------------------------------------------------------------

/// Persist a new manifest. Fails if one already exists for the run.
pub async fn create_manifest(store: &dyn RunStore, manifest: &RunManifest) -> Result<StoredObject> {
    let value = serde_json::to_value(manifest)?;
    Ok(store.create_json(&manifest.id, MANIFEST_FILE, &value).await?)
}

/// Replace an existing manifest (feedback path).
pub async fn replace_manifest(store: &dyn RunStore, manifest: &RunManifest) -> Result<StoredObject> {
    let value = serde_json::to_value(manifest)?;
    Ok(store.write_json(&manifest.id, MANIFEST_FILE, &value).await?)
}

/// Load a manifest; a missing manifest is [`UpeError::RunNotFound`].
pub async fn load_manifest(store: &dyn RunStore, run_id: &RunId) -> Result<RunManifest> {
    match store.read_json(run_id, MANIFEST_FILE).await {
        Ok(value) => Ok(serde_json::from_value(value)?),
        Err(StorageError::NotFound { .. }) => Err(UpeError::RunNotFound(run_id.to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Parse a caller-supplied run id; malformed ids cannot name a run.
pub fn parse_run_id(raw: &str) -> Result<RunId> {
    RunId::parse(raw).map_err(|_| UpeError::RunNotFound(raw.to_string()))
}
