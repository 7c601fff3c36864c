//! Collection creation and status roll-up.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{FunctionError, Result};
use crate::store::Store;
use crate::types::{
    CollectionId, CollectionReport, CollectionStatus, JobCollection, JobId, MemberStatus,
    NewCollection,
};

/// Groups jobs into collections and derives their status.
#[derive(Clone)]
pub struct CollectionAggregator {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for CollectionAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionAggregator").finish_non_exhaustive()
    }
}

impl CollectionAggregator {
    /// Creates an aggregator over `store`.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Creates a collection with fixed membership.
    ///
    /// Member ids are not checked for existence; ids that do not resolve are
    /// reported as missing by [`collection_status`](Self::collection_status).
    /// The stored status is derived from whatever members exist right now.
    pub async fn create_collection(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        job_ids: Vec<JobId>,
    ) -> Result<JobCollection> {
        let (members, _) = self.member_statuses(&job_ids).await?;
        let status = CollectionStatus::derive(members.iter().map(|m| m.status));
        let collection = self
            .store
            .save_collection(NewCollection {
                name: name.into(),
                description,
                job_ids,
                status,
            })
            .await?;
        info!(
            collection_id = %collection.id,
            members = collection.job_ids.len(),
            status = %collection.status,
            "collection created"
        );
        Ok(collection)
    }

    /// Re-reads every member job, derives the collection status, and stores
    /// it as the collection's snapshot.
    ///
    /// Members that no longer resolve are listed in
    /// [`CollectionReport::missing`] and take no part in the derivation. A
    /// collection none of whose members resolve derives `Completed`, the
    /// same as an empty one.
    ///
    /// # Errors
    ///
    /// [`FunctionError::NotFound`] if the collection does not exist.
    pub async fn collection_status(&self, id: CollectionId) -> Result<CollectionReport> {
        let mut collection = self.store.get_collection(id).await?;
        let (jobs, missing) = self.member_statuses(&collection.job_ids).await?;
        let status = CollectionStatus::derive(jobs.iter().map(|m| m.status));

        if status != collection.status {
            collection.status = status;
            collection = match self.store.update_collection(&collection).await {
                Ok(updated) => updated,
                // A concurrent reader stored its snapshot first.
                Err(FunctionError::ConcurrentModification { .. }) => {
                    debug!(collection_id = %id, "collection snapshot raced, keeping derived status");
                    collection
                },
                Err(err) => return Err(err),
            };
        }

        Ok(CollectionReport {
            collection,
            jobs,
            missing,
        })
    }

    /// All collections with their stored status snapshots.
    pub async fn list_collections(&self) -> Result<Vec<JobCollection>> {
        self.store.list_collections().await
    }

    async fn member_statuses(&self, job_ids: &[JobId]) -> Result<(Vec<MemberStatus>, Vec<JobId>)> {
        let mut members = Vec::with_capacity(job_ids.len());
        let mut missing = Vec::new();
        for &job_id in job_ids {
            match self.store.get_job(job_id).await {
                Ok(job) => members.push(MemberStatus {
                    job_id,
                    status: job.status,
                }),
                Err(FunctionError::NotFound { .. }) => missing.push(job_id),
                Err(err) => return Err(err),
            }
        }
        Ok((members, missing))
    }
}
