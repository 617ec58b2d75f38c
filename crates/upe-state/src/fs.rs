use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::{check_name, RunId, RunStore, StorageResult, StoredObject};

/// Filesystem-backed run store.
///
/// Layout: `<root>/<run_id>/<name>`. The root is injected by the caller so
/// tests and deployments can use isolated directories.
#[derive(Debug, Clone)]
pub struct FsRunStore {
    root: PathBuf,
}

impl FsRunStore {
    /// Create a store rooted at `root`. Creates the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, run_id: &RunId, name: &str) -> StorageResult<PathBuf> {
        check_name(name)?;
        Ok(self.root.join(run_id.as_str()).join(name))
    }

    /// Write to a temp file in the run directory, then move it into place.
    fn stage(path: &Path, data: &[u8]) -> StorageResult<NamedTempFile> {
        let run_dir = path.parent().ok_or_else(|| StorageError::InvalidName {
            name: path.display().to_string(),
        })?;
        fs::create_dir_all(run_dir)?;
        let mut tmp = NamedTempFile::new_in(run_dir)?;
        tmp.write_all(data)?;
        tmp.flush()?;
        Ok(tmp)
    }
}

/// Run synchronous tempfile work off the async worker threads.
async fn blocking<T, F>(f: F) -> StorageResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StorageResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StorageError::Io(io::Error::other(e)))?
}

#[async_trait]
impl RunStore for FsRunStore {
    async fn write_bytes(
        &self,
        run_id: &RunId,
        name: &str,
        data: &[u8],
    ) -> StorageResult<StoredObject> {
        let path = self.object_path(run_id, name)?;
        let (target, bytes) = (path.clone(), data.to_vec());
        blocking(move || {
            let tmp = FsRunStore::stage(&target, &bytes)?;
            tmp.persist(&target).map_err(|e| StorageError::Io(e.error))?;
            Ok(())
        })
        .await?;
        debug!(run_id = %run_id, name, bytes = data.len(), "object written");
        Ok(StoredObject::describe(path.display().to_string(), data))
    }

    async fn read_bytes(&self, run_id: &RunId, name: &str) -> StorageResult<Vec<u8>> {
        let path = self.object_path(run_id, name)?;
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound {
                    run_id: run_id.to_string(),
                    name: name.to_string(),
                }
            } else {
                StorageError::Io(e)
            }
        })
    }

    async fn exists(&self, run_id: &RunId, name: &str) -> StorageResult<bool> {
        let path = self.object_path(run_id, name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_bytes(
        &self,
        run_id: &RunId,
        name: &str,
        data: &[u8],
    ) -> StorageResult<StoredObject> {
        let path = self.object_path(run_id, name)?;
        let (target, bytes) = (path.clone(), data.to_vec());
        let (run, object) = (run_id.to_string(), name.to_string());
        blocking(move || {
            let tmp = FsRunStore::stage(&target, &bytes)?;
            tmp.persist_noclobber(&target).map_err(|e| {
                if e.error.kind() == io::ErrorKind::AlreadyExists {
                    StorageError::AlreadyExists { run_id: run, name: object }
                } else {
                    StorageError::Io(e.error)
                }
            })?;
            Ok(())
        })
        .await?;
        debug!(run_id = %run_id, name, bytes = data.len(), "object created");
        Ok(StoredObject::describe(path.display().to_string(), data))
    }

    async fn list_runs(&self) -> StorageResult<Vec<RunId>> {
        let mut runs = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            // Foreign directories under the root are not runs.
            if let Some(id) = entry
                .file_name()
                .to_str()
                .and_then(|name| RunId::parse(name).ok())
            {
                runs.push(id);
            }
        }
        runs.sort();
        Ok(runs)
    }
}
