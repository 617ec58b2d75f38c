//! Pipeline-level error taxonomy for UPE.

use crate::domain::manifest::RunStatus;

/// UPE pipeline errors.
///
/// Per-candidate oracle failures never appear here: the committee absorbs
/// them. Evidence-gate misses are not errors either; they are a terminal
/// `INSUFFICIENT_CONTEXT` outcome.
#[derive(Debug, thiserror::Error)]
pub enum UpeError {
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model output failed schema validation: {0}")]
    Schema(String),

    #[error("format gate failed: {reason}")]
    FormatGate { reason: String },

    #[error("{kind} validator: {reason}")]
    ArtifactInvalid { kind: String, reason: String },

    #[error("{kind} renderer failed: {message}")]
    Render { kind: String, message: String },

    #[error("all {count} committee candidates failed")]
    CommitteeFailed { count: usize },

    #[error("run not found: {0}")]
    RunNotFound(String),

    #[error("run {0} has no document to edit")]
    NoDocument(String),

    #[error("storage error: {0}")]
    Storage(#[from] upe_state::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpeError {
    /// Terminal run status this error maps to at the pipeline boundary.
    pub fn status(&self) -> RunStatus {
        RunStatus::ToolError
    }

    /// Stable diagnostic code recorded in failed manifests.
    pub fn code(&self) -> &'static str {
        match self {
            UpeError::UnknownMode(_) => "unknown_mode",
            UpeError::InvalidRequest(_) => "invalid_request",
            UpeError::Schema(_) => "schema_error",
            UpeError::FormatGate { .. } => "missing_primary_artifact",
            UpeError::ArtifactInvalid { .. } => "artifact_invalid",
            UpeError::Render { .. } => "render_error",
            UpeError::CommitteeFailed { .. } => "committee_failed",
            UpeError::RunNotFound(_) => "run_not_found",
            UpeError::NoDocument(_) => "no_document",
            UpeError::Storage(_) => "storage_error",
            UpeError::Serialization(_) => "serialization_error",
            UpeError::Io(_) => "io_error",
        }
    }
}

/// Result type for UPE operations.
pub type Result<T> = std::result::Result<T, UpeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_detail() {
        let err = UpeError::UnknownMode("warp".to_string());
        assert_eq!(err.to_string(), "unknown mode: warp");

        let err = UpeError::ArtifactInvalid {
            kind: "pdf".to_string(),
            reason: "bad_magic".to_string(),
        };
        assert_eq!(err.to_string(), "pdf validator: bad_magic");
    }

    #[test]
    fn fatal_errors_map_to_tool_error() {
        let errs = [
            UpeError::Schema("sections must be a list".to_string()),
            UpeError::FormatGate {
                reason: "missing_primary_artifact".to_string(),
            },
            UpeError::CommitteeFailed { count: 3 },
        ];
        for err in errs {
            assert_eq!(err.status(), RunStatus::ToolError);
        }
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            UpeError::FormatGate {
                reason: "missing_primary_artifact".to_string()
            }
            .code(),
            "missing_primary_artifact"
        );
        assert_eq!(UpeError::RunNotFound("x".to_string()).code(), "run_not_found");
    }
}
