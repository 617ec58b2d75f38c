//! UPE Core Library
//!
//! Compiles a natural-language goal into validated document artifacts:
//! gear profiles, the concurrent candidate committee, evidence and format
//! gates, the shared document model, renderers and the edit engine.

pub mod committee;
pub mod config;
pub mod domain;
pub mod edit;
pub mod followups;
pub mod gate;
pub mod gear;
pub mod ledger;
pub mod normalize;
pub mod obs;
pub mod oracle;
pub mod pipeline;
pub mod prompt;
pub mod render;
pub mod report;
pub mod retrieval;
pub mod telemetry;

/// Crate version, recorded by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use committee::{judge, run_committee, Candidate, Committee, Judgement, RankedCandidate};
pub use config::EngineConfig;
pub use domain::{
    ArtifactKind, ArtifactMeta, ArtifactRequest, Block, Bundle, Claim, CompileRequest,
    CompileResponse, Document, FeedbackRequest, FeedbackResponse, ManifestDraft, ProofSummary,
    Quality, Result, RunManifest, RunStatus, Section, UpeError,
};
pub use edit::{apply_edits, parse_ops, EditOp};
pub use followups::{followups_for, Followup, FollowupAction, Impact};
pub use gate::{
    evidence_gate, format_gate, EvidenceInput, EvidencePolicy, EvidenceReason, EvidenceVerdict,
    FormatVerdict,
};
pub use gear::{GearProfile, GearRegistry};
pub use ledger::Ledger;
pub use normalize::normalize;
pub use obs::{
    emit_artifact_rendered, emit_candidate_scored, emit_compile_started, emit_feedback_applied,
    emit_gate_evaluated, emit_run_finished, emit_run_persist_error,
};
pub use oracle::{CommandOracle, HttpOracle, Oracle, OracleError, ScriptedOracle};
pub use pipeline::Engine;
pub use prompt::{compile_prompt, PromptInputs};
pub use render::{RenderRegistry, Renderer, ValidationOutcome, Validator};
pub use report::{render_run_summary_md, write_run_summary_md};
pub use retrieval::{DirCorpus, SnapshotEntry, SourceCorpus, SourceDoc, StaticCorpus};
pub use telemetry::{init_tracing, LogFormat};
