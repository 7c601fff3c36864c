//! In-memory storage backend and store.
//!
//! [`InMemoryBackend`] is a thread-safe [`StorageBackend`] over
//! `DashMap<String, (Vec<u8>, u64)>`; shard-level locking means writers to
//! different records never contend on a global lock. [`InMemoryStore`] is
//! [`GenericStore`] over it.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use fnstore::store::{InMemoryStore, Store};
//!
//! let store: Arc<dyn Store> = Arc::new(InMemoryStore::in_memory());
//! ```

use async_trait::async_trait;
use dashmap::DashMap;

use super::backend::{StorageBackend, StorageError, VersionedRecord};
use super::generic::GenericStore;

/// Thread-safe in-memory storage backend using [`DashMap`].
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: DashMap<String, (Vec<u8>, u64)>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<VersionedRecord, StorageError> {
        let entry = self.data.get(key).ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })?;
        let (data, version) = entry.value();
        Ok(VersionedRecord {
            data: data.clone(),
            version: *version,
        })
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<u64, StorageError> {
        let mut entry = self
            .data
            .entry(key.to_string())
            .or_insert_with(|| (Vec::new(), 0));
        let new_version = entry.value().1 + 1;
        *entry.value_mut() = (data.to_vec(), new_version);
        Ok(new_version)
    }

    async fn put_if_version(
        &self,
        key: &str,
        data: &[u8],
        expected_version: u64,
    ) -> Result<u64, StorageError> {
        let mut entry = self
            .data
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })?;
        let current_version = entry.value().1;
        if current_version != expected_version {
            return Err(StorageError::VersionConflict {
                key: key.to_string(),
                expected: expected_version,
                actual: current_version,
            });
        }
        let new_version = current_version + 1;
        *entry.value_mut() = (data.to_vec(), new_version);
        Ok(new_version)
    }

    async fn delete(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.remove(key).is_some())
    }

    async fn list_by_prefix(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, VersionedRecord)>, StorageError> {
        let results = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| {
                let (data, version) = entry.value();
                (
                    entry.key().clone(),
                    VersionedRecord {
                        data: data.clone(),
                        version: *version,
                    },
                )
            })
            .collect();
        Ok(results)
    }
}

/// [`GenericStore`] over an [`InMemoryBackend`].
pub type InMemoryStore = GenericStore<InMemoryBackend>;

impl GenericStore<InMemoryBackend> {
    /// Creates an empty in-memory store.
    pub fn in_memory() -> Self {
        GenericStore::new(InMemoryBackend::new())
    }
}

impl Default for GenericStore<InMemoryBackend> {
    fn default() -> Self {
        Self::in_memory()
    }
}
