//! Persistence seam for functions, jobs, and collections.
//!
//! # Architecture
//!
//! The storage system has three layers:
//!
//! 1. **[`Store`]** -- The record-level interface the engine uses, held as
//!    `Arc<dyn Store>` by the lifecycle manager, batch runner, collection
//!    aggregator, and service.
//!
//! 2. **[`GenericStore<B>`](generic::GenericStore)** -- Id allocation, JSON
//!    serialization, query filtering, and version-checked updates on top of
//!    any backend.
//!
//! 3. **[`StorageBackend`]** -- Dumb versioned key-value trait. No domain
//!    logic.
//!
//! [`InMemoryStore`] is `GenericStore` over the `DashMap`-based
//! [`InMemoryBackend`](memory::InMemoryBackend).
//!
//! # Consistency
//!
//! A job is only ever mutated by the operation that owns it, and every
//! update is a compare-and-swap on the record version read just before. A
//! stale writer gets [`FunctionError::ConcurrentModification`] rather than
//! silently overwriting a newer state.
//!
//! [`FunctionError::ConcurrentModification`]: crate::error::FunctionError::ConcurrentModification

pub mod backend;
pub mod generic;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use backend::{StorageBackend, StorageError, VersionedRecord};
pub use generic::GenericStore;
pub use memory::{InMemoryBackend, InMemoryStore};

use crate::error::Result;
use crate::types::{
    CollectionId, Function, FunctionId, FunctionSpec, Job, JobCollection, JobId, JobStatus,
    NewCollection, NewJob,
};

/// Filter and pagination for job queries.
///
/// Results are ordered newest first; `offset` and `limit` apply after
/// filtering and ordering.
///
/// # Examples
///
/// ```
/// use fnstore::{FunctionId, JobFilter, JobStatus};
///
/// let filter = JobFilter::new()
///     .with_status(JobStatus::Failed)
///     .with_function(FunctionId::new(3))
///     .with_limit(20);
/// assert_eq!(filter.limit, Some(20));
/// assert!(filter.offset.is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    /// Only jobs in this status.
    pub status: Option<JobStatus>,
    /// Only jobs of this function.
    pub function_id: Option<FunctionId>,
    /// Only jobs created at or after this instant.
    pub created_after: Option<DateTime<Utc>>,
    /// Only jobs created at or before this instant.
    pub created_before: Option<DateTime<Utc>>,
    /// Number of matching jobs to skip.
    pub offset: Option<usize>,
    /// Maximum number of jobs to return.
    pub limit: Option<usize>,
}

impl JobFilter {
    /// A filter matching every job.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one status.
    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restricts to one function.
    pub fn with_function(mut self, function_id: FunctionId) -> Self {
        self.function_id = Some(function_id);
        self
    }

    /// Restricts to jobs created at or after `at`.
    pub fn created_after(mut self, at: DateTime<Utc>) -> Self {
        self.created_after = Some(at);
        self
    }

    /// Restricts to jobs created at or before `at`.
    pub fn created_before(mut self, at: DateTime<Utc>) -> Self {
        self.created_before = Some(at);
        self
    }

    /// Skips the first `offset` matches.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Returns at most `limit` matches.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns `true` if `job` passes the non-pagination criteria.
    pub fn matches(&self, job: &Job) -> bool {
        self.status.is_none_or(|status| job.status == status)
            && self.function_id.is_none_or(|id| job.function_id == id)
            && self.created_after.is_none_or(|at| job.created_at >= at)
            && self.created_before.is_none_or(|at| job.created_at <= at)
    }
}

/// Record-level persistence used by the engine.
///
/// Identities are assigned by the store on save and increase strictly per
/// record kind. Implementations must be `Send + Sync` and must give
/// read-your-writes consistency for a single record.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persists a new function and returns it with its identity.
    async fn save_function(&self, spec: FunctionSpec) -> Result<Function>;

    /// Fetches a function.
    ///
    /// # Errors
    ///
    /// [`FunctionError::NotFound`](crate::error::FunctionError::NotFound) if
    /// the id is unknown.
    async fn get_function(&self, id: FunctionId) -> Result<Function>;

    /// All functions, in id order.
    async fn list_functions(&self) -> Result<Vec<Function>>;

    /// Removes every function and returns how many were removed.
    async fn delete_all_functions(&self) -> Result<usize>;

    /// Persists a new job and returns it with its identity and version.
    async fn save_job(&self, job: NewJob) -> Result<Job>;

    /// Fetches a job with its current version.
    async fn get_job(&self, id: JobId) -> Result<Job>;

    /// Writes `job` if its `version` is still current, returning the job
    /// with the new version.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the job does not exist.
    /// - `ConcurrentModification` if the job changed since it was read.
    async fn update_job(&self, job: &Job) -> Result<Job>;

    /// Jobs matching `filter`, newest first.
    async fn query_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>>;

    /// Persists a new collection.
    async fn save_collection(&self, collection: NewCollection) -> Result<JobCollection>;

    /// Fetches a collection with its current version.
    async fn get_collection(&self, id: CollectionId) -> Result<JobCollection>;

    /// Writes `collection` if its version is still current.
    async fn update_collection(&self, collection: &JobCollection) -> Result<JobCollection>;

    /// All collections, in id order.
    async fn list_collections(&self) -> Result<Vec<JobCollection>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FunctionId, Job, JobId, NewJob};
    use chrono::Duration;
    use serde_json::json;

    fn job_at(status: JobStatus, function: u64, created_at: DateTime<Utc>) -> Job {
        let mut job = Job::from_new(
            JobId::new(1),
            NewJob::pending(FunctionId::new(function), json!({})),
            created_at,
        );
        job.status = status;
        job
    }

    #[test]
    fn empty_filter_matches_everything() {
        let job = job_at(JobStatus::Running, 1, Utc::now());
        assert!(JobFilter::new().matches(&job));
    }

    #[test]
    fn filter_criteria_combine() {
        let now = Utc::now();
        let job = job_at(JobStatus::Completed, 2, now);

        assert!(JobFilter::new()
            .with_status(JobStatus::Completed)
            .with_function(FunctionId::new(2))
            .matches(&job));
        assert!(!JobFilter::new()
            .with_status(JobStatus::Completed)
            .with_function(FunctionId::new(3))
            .matches(&job));
        assert!(JobFilter::new()
            .created_after(now - Duration::seconds(1))
            .created_before(now)
            .matches(&job));
        assert!(!JobFilter::new()
            .created_after(now + Duration::seconds(1))
            .matches(&job));
    }
}
