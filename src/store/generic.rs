//! Generic record store delegating persistence to a [`StorageBackend`].
//!
//! [`GenericStore`] implements the [`Store`] record operations (identity
//! allocation, JSON serialization at the storage boundary, job query
//! filtering and ordering, version-checked updates) on top of any
//! [`StorageBackend`]. Backends remain dumb key-value stores.
//!
//! # CAS Semantics
//!
//! `update_job` and `update_collection` use
//! [`StorageBackend::put_if_version`] with the version carried on the
//! record. A mismatch surfaces as
//! [`FunctionError::ConcurrentModification`].

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{FunctionError, RecordKind, Result};
use crate::store::backend::{make_key, make_prefix, StorageBackend, StorageError};
use crate::store::{JobFilter, Store};
use crate::types::{
    CollectionId, Function, FunctionId, FunctionSpec, Job, JobCollection, JobId, NewCollection,
    NewJob,
};

const FUNCTION_KIND: &str = "function";
const JOB_KIND: &str = "job";
const COLLECTION_KIND: &str = "collection";

/// Record store that delegates all storage to a [`StorageBackend`].
///
/// Identities come from per-kind counters starting at 1, so ids are
/// strictly increasing in creation order for the lifetime of the store.
///
/// # Type Parameters
///
/// * `B` - A [`StorageBackend`] implementation
#[derive(Debug)]
pub struct GenericStore<B: StorageBackend> {
    backend: B,
    next_function: AtomicU64,
    next_job: AtomicU64,
    next_collection: AtomicU64,
}

impl<B: StorageBackend> GenericStore<B> {
    /// Creates a store over `backend` with fresh id counters.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            next_function: AtomicU64::new(1),
            next_job: AtomicU64::new(1),
            next_collection: AtomicU64::new(1),
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    // ---- Serialization helpers (private) ----

    fn serialize<T: Serialize>(record: &T, kind: RecordKind) -> Result<Vec<u8>> {
        serde_json::to_vec(record)
            .map_err(|e| FunctionError::Store(format!("failed to serialize {kind}: {e}")))
    }

    fn deserialize<T: DeserializeOwned>(data: &[u8], kind: RecordKind) -> Result<T> {
        serde_json::from_slice(data)
            .map_err(|e| FunctionError::Store(format!("failed to deserialize {kind}: {e}")))
    }

    fn map_storage_error(err: StorageError, kind: RecordKind, id: u64) -> FunctionError {
        match err {
            StorageError::NotFound { .. } => FunctionError::not_found(kind, id),
            StorageError::VersionConflict {
                key,
                expected,
                actual,
            } => FunctionError::ConcurrentModification {
                key,
                expected,
                actual,
            },
            StorageError::Backend { message, .. } => FunctionError::Store(message),
        }
    }

    async fn list_kind<T: DeserializeOwned>(
        &self,
        prefix_kind: &str,
        kind: RecordKind,
    ) -> Result<Vec<(T, u64)>> {
        let records = self
            .backend
            .list_by_prefix(&make_prefix(prefix_kind))
            .await
            .map_err(|e| FunctionError::Store(e.to_string()))?;
        records
            .into_iter()
            .map(|(_, record)| Ok((Self::deserialize(&record.data, kind)?, record.version)))
            .collect()
    }
}

#[async_trait]
impl<B: StorageBackend + 'static> Store for GenericStore<B> {
    async fn save_function(&self, spec: FunctionSpec) -> Result<Function> {
        let id = FunctionId::new(self.next_function.fetch_add(1, Ordering::SeqCst));
        let function = Function::from_spec(id, spec);
        let data = Self::serialize(&function, RecordKind::Function)?;
        self.backend
            .put(&make_key(FUNCTION_KIND, id.get()), &data)
            .await
            .map_err(|e| Self::map_storage_error(e, RecordKind::Function, id.get()))?;
        Ok(function)
    }

    async fn get_function(&self, id: FunctionId) -> Result<Function> {
        let record = self
            .backend
            .get(&make_key(FUNCTION_KIND, id.get()))
            .await
            .map_err(|e| Self::map_storage_error(e, RecordKind::Function, id.get()))?;
        Self::deserialize(&record.data, RecordKind::Function)
    }

    async fn list_functions(&self) -> Result<Vec<Function>> {
        let mut functions: Vec<Function> = self
            .list_kind(FUNCTION_KIND, RecordKind::Function)
            .await?
            .into_iter()
            .map(|(function, _)| function)
            .collect();
        functions.sort_by_key(|f: &Function| f.id);
        Ok(functions)
    }

    async fn delete_all_functions(&self) -> Result<usize> {
        let records = self
            .backend
            .list_by_prefix(&make_prefix(FUNCTION_KIND))
            .await
            .map_err(|e| FunctionError::Store(e.to_string()))?;
        let mut removed = 0;
        for (key, _) in records {
            if self
                .backend
                .delete(&key)
                .await
                .map_err(|e| FunctionError::Store(e.to_string()))?
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn save_job(&self, job: NewJob) -> Result<Job> {
        let id = JobId::new(self.next_job.fetch_add(1, Ordering::SeqCst));
        let mut job = Job::from_new(id, job, Utc::now());
        let data = Self::serialize(&job, RecordKind::Job)?;
        job.version = self
            .backend
            .put(&make_key(JOB_KIND, id.get()), &data)
            .await
            .map_err(|e| Self::map_storage_error(e, RecordKind::Job, id.get()))?;
        Ok(job)
    }

    async fn get_job(&self, id: JobId) -> Result<Job> {
        let record = self
            .backend
            .get(&make_key(JOB_KIND, id.get()))
            .await
            .map_err(|e| Self::map_storage_error(e, RecordKind::Job, id.get()))?;
        let mut job: Job = Self::deserialize(&record.data, RecordKind::Job)?;
        job.version = record.version;
        Ok(job)
    }

    async fn update_job(&self, job: &Job) -> Result<Job> {
        let data = Self::serialize(job, RecordKind::Job)?;
        let version = self
            .backend
            .put_if_version(&make_key(JOB_KIND, job.id.get()), &data, job.version)
            .await
            .map_err(|e| Self::map_storage_error(e, RecordKind::Job, job.id.get()))?;
        let mut updated = job.clone();
        updated.version = version;
        Ok(updated)
    }

    async fn query_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        let mut jobs: Vec<Job> = self
            .list_kind(JOB_KIND, RecordKind::Job)
            .await?
            .into_iter()
            .map(|(mut job, version): (Job, u64)| {
                job.version = version;
                job
            })
            .filter(|job| filter.matches(job))
            .collect();

        // Newest first; ids break ties between jobs created in the same instant.
        jobs.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    async fn save_collection(&self, collection: NewCollection) -> Result<JobCollection> {
        let id = CollectionId::new(self.next_collection.fetch_add(1, Ordering::SeqCst));
        let mut collection = JobCollection::from_new(id, collection, Utc::now());
        let data = Self::serialize(&collection, RecordKind::Collection)?;
        collection.version = self
            .backend
            .put(&make_key(COLLECTION_KIND, id.get()), &data)
            .await
            .map_err(|e| Self::map_storage_error(e, RecordKind::Collection, id.get()))?;
        Ok(collection)
    }

    async fn get_collection(&self, id: CollectionId) -> Result<JobCollection> {
        let record = self
            .backend
            .get(&make_key(COLLECTION_KIND, id.get()))
            .await
            .map_err(|e| Self::map_storage_error(e, RecordKind::Collection, id.get()))?;
        let mut collection: JobCollection =
            Self::deserialize(&record.data, RecordKind::Collection)?;
        collection.version = record.version;
        Ok(collection)
    }

    async fn update_collection(&self, collection: &JobCollection) -> Result<JobCollection> {
        let data = Self::serialize(collection, RecordKind::Collection)?;
        let version = self
            .backend
            .put_if_version(
                &make_key(COLLECTION_KIND, collection.id.get()),
                &data,
                collection.version,
            )
            .await
            .map_err(|e| Self::map_storage_error(e, RecordKind::Collection, collection.id.get()))?;
        let mut updated = collection.clone();
        updated.version = version;
        Ok(updated)
    }

    async fn list_collections(&self) -> Result<Vec<JobCollection>> {
        let mut collections: Vec<JobCollection> = self
            .list_kind(COLLECTION_KIND, RecordKind::Collection)
            .await?
            .into_iter()
            .map(|(mut collection, version): (JobCollection, u64)| {
                collection.version = version;
                collection
            })
            .collect();
        collections.sort_by_key(|c| c.id);
        Ok(collections)
    }
}
