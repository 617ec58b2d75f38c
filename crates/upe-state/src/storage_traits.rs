//! Storage trait definitions for UPE
//!
//! A run owns a flat namespace of named objects (manifest, ledger, rendered
//! artifacts). `RunStore` is the only capability the engine needs:
//! - bytes and JSON read/write keyed by `(RunId, name)`
//! - create-once writes for records that must never be replaced silently
//! - listing of known runs
//!
//! All methods are async and backend-agnostic. An in-memory fake lives in
//! the `fakes` module; `fs::FsRunStore` is the filesystem backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// SHA-256 hex digest of stored content.
///
/// The inner field is private so the string is always lowercase hex produced
/// by `from_bytes` or validated through `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl From<ContentDigest> for String {
    fn from(d: ContentDigest) -> Self {
        d.0
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// Globally unique identifier of a compile run; doubles as its storage namespace.
///
/// Ids are UUID strings in practice, but any non-empty string made of ASCII
/// alphanumerics, `-` and `_` is accepted so ids never escape the store root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    /// Generate a new random RunId
    pub fn new() -> Self {
        RunId(uuid::Uuid::new_v4().to_string())
    }

    /// Validate and wrap an existing id.
    pub fn parse(s: &str) -> StorageResult<Self> {
        Self::try_from(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<String> for RunId {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        let valid = !s.is_empty()
            && s.len() <= 128
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidRunId { run_id: s });
        }
        Ok(RunId(s))
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object names are plain file names: no separators, no parent references.
pub(crate) fn check_name(name: &str) -> StorageResult<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(StorageError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// RunStore
// ---------------------------------------------------------------------------

/// Location and identity of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Backend-specific location (a filesystem path, or `mem://run/name`).
    pub path: String,
    pub byte_size: u64,
    pub content_hash: ContentDigest,
}

impl StoredObject {
    pub(crate) fn describe(path: String, data: &[u8]) -> Self {
        Self {
            path,
            byte_size: data.len() as u64,
            content_hash: ContentDigest::from_bytes(data),
        }
    }
}

/// Run-scoped object store.
///
/// Guarantees:
/// - `read_*` returns exactly what the last successful write stored.
/// - `create_json` never replaces an existing object.
/// - Writes to different runs never interfere; concurrent writes to the same
///   `(run, name)` are last-writer-wins and need external coordination.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Store bytes under `name`, replacing any previous content.
    async fn write_bytes(&self, run_id: &RunId, name: &str, data: &[u8])
        -> StorageResult<StoredObject>;

    /// Read bytes. Returns `StorageError::NotFound` if absent.
    async fn read_bytes(&self, run_id: &RunId, name: &str) -> StorageResult<Vec<u8>>;

    /// Whether `name` exists for this run.
    async fn exists(&self, run_id: &RunId, name: &str) -> StorageResult<bool>;

    /// Store bytes only if `name` does not exist yet (`AlreadyExists` otherwise).
    async fn create_bytes(
        &self,
        run_id: &RunId,
        name: &str,
        data: &[u8],
    ) -> StorageResult<StoredObject>;

    /// All run ids that have at least one object, sorted.
    async fn list_runs(&self) -> StorageResult<Vec<RunId>>;

    /// Pretty-printed JSON write (overwrites).
    async fn write_json(
        &self,
        run_id: &RunId,
        name: &str,
        value: &serde_json::Value,
    ) -> StorageResult<StoredObject> {
        let data = serde_json::to_vec_pretty(value)?;
        self.write_bytes(run_id, name, &data).await
    }

    /// Pretty-printed JSON write that refuses to replace an existing object.
    async fn create_json(
        &self,
        run_id: &RunId,
        name: &str,
        value: &serde_json::Value,
    ) -> StorageResult<StoredObject> {
        let data = serde_json::to_vec_pretty(value)?;
        self.create_bytes(run_id, name, &data).await
    }

    async fn read_json(&self, run_id: &RunId, name: &str) -> StorageResult<serde_json::Value> {
        let data = self.read_bytes(run_id, name).await?;
        Ok(serde_json::from_slice(&data)?)
    }
}
