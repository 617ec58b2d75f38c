//! Domain models for UPE.
//!
//! Canonical definitions shared by every pipeline stage:
//! - `Document`: structured intermediate representation of generated content
//! - `CompileRequest` / `CompileResponse`: the compile contract
//! - `RunManifest`: persisted provenance record of a run

pub mod digest;
pub mod document;
pub mod error;
pub mod manifest;
pub mod request;

pub use document::{Block, Claim, Document, Section};
pub use error::{Result, UpeError};
pub use manifest::{
    ArtifactKind, ArtifactMeta, CandidateRecord, EngineRecord, JudgeRecord, ManifestDraft,
    RetrievalRecord, RunError, RunManifest, RunStatus, Timings,
};
pub use request::{
    ArtifactRequest, Bundle, CompileRequest, CompileResponse, FeedbackRequest, FeedbackResponse,
    ProofSummary, Quality,
};
