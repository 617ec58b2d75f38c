//! upe-state: run-scoped persistence for UPE
//!
//! Every compile run owns a namespace keyed by its [`RunId`]. The engine
//! stores the run manifest, the judge ledger and rendered artifacts there.
//!
//! ## Key Components
//!
//! - [`RunStore`]: async storage capability (bytes + JSON, create-once writes)
//! - [`FsRunStore`]: filesystem backend rooted at an injected directory
//! - [`fakes::MemoryRunStore`]: in-memory backend for tests
//! - [`ContentDigest`]: SHA-256 hex digest used for artifacts and sources

mod error;
pub mod fakes;
pub mod fs;
pub mod storage_traits;

pub use error::StorageError;
pub use fs::FsRunStore;
pub use storage_traits::{ContentDigest, RunId, RunStore, StorageResult, StoredObject};
