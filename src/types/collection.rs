//! Job collections and the status roll-up.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CollectionId, JobId};
use super::job::JobStatus;

/// Aggregate status of a collection, derived from its member jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionStatus {
    /// At least one member is still pending or running, and none failed.
    Running,
    /// Every member completed.
    Completed,
    /// At least one member failed.
    Failed,
}

impl fmt::Display for CollectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl CollectionStatus {
    /// Reduces member statuses to the collection status.
    ///
    /// The rules apply in order:
    /// 1. any `Failed` member makes the collection `Failed`,
    /// 2. all members `Completed` makes it `Completed`,
    /// 3. otherwise it is `Running`.
    ///
    /// A collection with no members has nothing outstanding and derives
    /// `Completed`.
    ///
    /// # Examples
    ///
    /// ```
    /// use fnstore::{CollectionStatus, JobStatus};
    ///
    /// let status = CollectionStatus::derive([JobStatus::Completed, JobStatus::Failed]);
    /// assert_eq!(status, CollectionStatus::Failed);
    ///
    /// let status = CollectionStatus::derive([JobStatus::Completed, JobStatus::Running]);
    /// assert_eq!(status, CollectionStatus::Running);
    ///
    /// let status = CollectionStatus::derive([JobStatus::Completed, JobStatus::Completed]);
    /// assert_eq!(status, CollectionStatus::Completed);
    /// ```
    pub fn derive<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = JobStatus>,
    {
        let mut all_completed = true;
        for status in statuses {
            match status {
                JobStatus::Failed => return Self::Failed,
                JobStatus::Completed => {},
                JobStatus::Pending | JobStatus::Running => all_completed = false,
            }
        }
        if all_completed {
            Self::Completed
        } else {
            Self::Running
        }
    }
}

/// Fields supplied when creating a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCollection {
    /// Collection name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Member jobs, in caller order.
    pub job_ids: Vec<JobId>,
    /// Status derived at creation time.
    pub status: CollectionStatus,
}

/// A named, fixed group of jobs.
///
/// `status` is a snapshot taken the last time the status was derived; it is
/// not kept in sync with member jobs. Use
/// [`CollectionAggregator::collection_status`](crate::collection::CollectionAggregator::collection_status)
/// to get a current value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCollection {
    /// Store-assigned identity.
    pub id: CollectionId,

    /// Collection name.
    pub name: String,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Member jobs, fixed at creation.
    pub job_ids: Vec<JobId>,

    /// Status snapshot from the last derivation.
    pub status: CollectionStatus,

    /// When the collection was created.
    pub created_at: DateTime<Utc>,

    /// Storage version for optimistic concurrency.
    #[serde(skip)]
    pub version: u64,
}

impl JobCollection {
    /// Builds the stored form of `new` under `id`.
    pub fn from_new(id: CollectionId, new: NewCollection, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: new.name,
            description: new.description,
            job_ids: new.job_ids,
            status: new.status,
            created_at: now,
            version: 0,
        }
    }
}

/// Current status of one member job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberStatus {
    /// The member job.
    pub job_id: JobId,
    /// Its status at read time.
    pub status: JobStatus,
}

/// A freshly derived collection status with per-member detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionReport {
    /// The collection, with `status` set to the derived value.
    pub collection: JobCollection,

    /// Member statuses in membership order.
    pub jobs: Vec<MemberStatus>,

    /// Member ids that no longer resolve to a job. They do not take part in
    /// the derivation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<JobId>,
}

impl CollectionReport {
    /// The derived status.
    pub fn status(&self) -> CollectionStatus {
        self.collection.status
    }
}
