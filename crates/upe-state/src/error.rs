//! Error types for upe-state

use thiserror::Error;

/// Errors that can occur in the run storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// No object stored under `name` for this run
    #[error("object not found: {run_id}/{name}")]
    NotFound { run_id: String, name: String },

    /// Refused to overwrite an object created with create-once semantics
    #[error("object already exists: {run_id}/{name}")]
    AlreadyExists { run_id: String, name: String },

    /// Run id is not a usable storage namespace
    #[error("invalid run id: {run_id}")]
    InvalidRunId { run_id: String },

    /// Object name is not a plain file name
    #[error("invalid object name: {name}")]
    InvalidName { name: String },

    /// Digest string is not 64 hex chars
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding/decoding error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
