//! In-memory fake for the storage trait (testing only)
//!
//! `MemoryRunStore` satisfies the `RunStore` contract without touching disk.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::storage_traits::*;

/// In-memory run store backed by a `BTreeMap<(run, name), bytes>`.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn location(run_id: &RunId, name: &str) -> String {
        format!("mem://{}/{}", run_id, name)
    }

    /// Number of stored objects across all runs.
    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn write_bytes(
        &self,
        run_id: &RunId,
        name: &str,
        data: &[u8],
    ) -> StorageResult<StoredObject> {
        check_name(name)?;
        let mut objects = self.objects.lock().unwrap();
        objects.insert((run_id.to_string(), name.to_string()), data.to_vec());
        Ok(StoredObject::describe(Self::location(run_id, name), data))
    }

    async fn read_bytes(&self, run_id: &RunId, name: &str) -> StorageResult<Vec<u8>> {
        check_name(name)?;
        let objects = self.objects.lock().unwrap();
        objects
            .get(&(run_id.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                run_id: run_id.to_string(),
                name: name.to_string(),
            })
    }

    async fn exists(&self, run_id: &RunId, name: &str) -> StorageResult<bool> {
        check_name(name)?;
        let objects = self.objects.lock().unwrap();
        Ok(objects.contains_key(&(run_id.to_string(), name.to_string())))
    }

    async fn create_bytes(
        &self,
        run_id: &RunId,
        name: &str,
        data: &[u8],
    ) -> StorageResult<StoredObject> {
        check_name(name)?;
        let mut objects = self.objects.lock().unwrap();
        let key = (run_id.to_string(), name.to_string());
        if objects.contains_key(&key) {
            return Err(StorageError::AlreadyExists {
                run_id: run_id.to_string(),
                name: name.to_string(),
            });
        }
        objects.insert(key, data.to_vec());
        Ok(StoredObject::describe(Self::location(run_id, name), data))
    }

    async fn list_runs(&self) -> StorageResult<Vec<RunId>> {
        let objects = self.objects.lock().unwrap();
        let mut runs: Vec<RunId> = Vec::new();
        for (run, _) in objects.keys() {
            let id = RunId::parse(run)?;
            if runs.last() != Some(&id) {
                runs.push(id);
            }
        }
        Ok(runs)
    }
}
