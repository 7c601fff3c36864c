//! Bounded-concurrency batch runs.
//!
//! [`BatchRunner::map`] turns N inputs for one function into N jobs, created
//! in input order, and hands back the created jobs right away. The pending
//! ones run in the background on a driver task that gates executions with a
//! per-batch [`Semaphore`]: a permit is acquired before each job task is
//! spawned and held by the task until it finishes, so at most `workers` jobs
//! execute at once.
//!
//! A job's failure never affects its siblings. When the batch itself fails
//! (a job could not be created or written, a worker could not be scheduled,
//! the driver died), every batch job that is still pending or running is
//! failed with a systemic detail and the error is reported to the caller.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info, warn};

use crate::error::{FunctionError, Result};
use crate::lifecycle::JobLifecycle;
use crate::types::{FailureDetail, FailureKind, Function, Job, JobId, JobStatus};

/// Final state of every job of a batch, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    /// The batch's jobs as re-read after the run.
    pub jobs: Vec<Job>,
}

impl BatchReport {
    /// Number of completed jobs.
    pub fn completed(&self) -> usize {
        self.count(JobStatus::Completed)
    }

    /// Number of failed jobs.
    pub fn failed(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|job| job.status == status).count()
    }
}

/// A running batch.
///
/// Dropping the handle detaches the driver; the jobs keep running.
#[derive(Debug)]
pub struct BatchHandle {
    jobs: Vec<Job>,
    task: JoinHandle<Result<BatchReport>>,
    lifecycle: JobLifecycle,
}

impl BatchHandle {
    /// The jobs as created, in input order.
    ///
    /// Jobs rejected by the input schema are already `Failed`; the rest are
    /// `Pending` as of creation.
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// The created job ids, in input order.
    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|job| job.id).collect()
    }

    /// Returns `true` once the driver has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for every job to reach a terminal state.
    ///
    /// # Errors
    ///
    /// [`FunctionError::SystemicBatch`] if the driver failed, panicked, or
    /// was cancelled. The batch's unfinished jobs have been failed by then.
    pub async fn join(self) -> Result<BatchReport> {
        let Self {
            jobs,
            task,
            lifecycle,
        } = self;
        match task.await {
            Ok(result) => result,
            Err(join_err) => {
                error!(error = %join_err, "batch driver did not finish");
                let job_ids: Vec<JobId> = jobs.iter().map(|job| job.id).collect();
                fail_unfinished(&lifecycle, &job_ids, &join_err.to_string()).await;
                Err(FunctionError::SystemicBatch {
                    message: format!("batch driver did not finish: {join_err}"),
                })
            },
        }
    }
}

/// Creates and runs batches of jobs for one function.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    lifecycle: JobLifecycle,
}

impl BatchRunner {
    /// Creates a runner on top of `lifecycle`.
    pub fn new(lifecycle: JobLifecycle) -> Self {
        Self { lifecycle }
    }

    /// Creates one job per input, in input order, and runs the pending ones
    /// in the background with at most `workers` concurrent executions.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`FunctionError::InvalidInput`] if `workers` is zero. No job is
    ///   created.
    /// - [`FunctionError::SystemicBatch`] if a job could not be created. The
    ///   jobs created before it are failed with a systemic detail.
    pub async fn map(
        &self,
        function: Function,
        inputs: Vec<Value>,
        workers: usize,
    ) -> Result<BatchHandle> {
        if workers == 0 {
            return Err(FunctionError::InvalidInput(
                "max_workers must be at least 1".to_string(),
            ));
        }

        let mut jobs = Vec::with_capacity(inputs.len());
        for input in inputs {
            match self.lifecycle.create(&function, input).await {
                Ok(job) => jobs.push(job),
                Err(err) => {
                    error!(
                        function_id = %function.id,
                        created = jobs.len(),
                        error = %err,
                        "batch job creation failed"
                    );
                    let created: Vec<JobId> = jobs.iter().map(|job| job.id).collect();
                    fail_unfinished(&self.lifecycle, &created, &err.to_string()).await;
                    return Err(FunctionError::SystemicBatch {
                        message: err.to_string(),
                    });
                },
            }
        }

        let job_ids: Vec<JobId> = jobs.iter().map(|job| job.id).collect();
        let pending: Vec<JobId> = jobs
            .iter()
            .filter(|job| job.status == JobStatus::Pending)
            .map(|job| job.id)
            .collect();

        info!(
            function_id = %function.id,
            jobs = job_ids.len(),
            pending = pending.len(),
            workers,
            "starting batch"
        );

        let task = tokio::spawn(run_batch(
            self.lifecycle.clone(),
            Arc::new(function),
            job_ids,
            pending,
            workers,
        ));

        Ok(BatchHandle {
            jobs,
            task,
            lifecycle: self.lifecycle.clone(),
        })
    }
}

async fn run_batch(
    lifecycle: JobLifecycle,
    function: Arc<Function>,
    job_ids: Vec<JobId>,
    pending: Vec<JobId>,
    workers: usize,
) -> Result<BatchReport> {
    if let Err(err) = drive(&lifecycle, &function, pending, workers).await {
        error!(function_id = %function.id, error = %err, "batch driver failed");
        fail_unfinished(&lifecycle, &job_ids, &err.to_string()).await;
        return Err(FunctionError::SystemicBatch {
            message: err.to_string(),
        });
    }

    let mut jobs = Vec::with_capacity(job_ids.len());
    for job_id in job_ids {
        jobs.push(lifecycle.store().get_job(job_id).await?);
    }
    let report = BatchReport { jobs };
    info!(
        function_id = %function.id,
        completed = report.completed(),
        failed = report.failed(),
        "batch finished"
    );
    Ok(report)
}

/// Fails every job in `job_ids` that is still pending or running.
async fn fail_unfinished(lifecycle: &JobLifecycle, job_ids: &[JobId], cause: &str) {
    let detail = FailureDetail::systemic(format!("Background task error: {cause}"));
    for &job_id in job_ids {
        match lifecycle.fail_if_active(job_id, detail.clone()).await {
            Ok(Some(_)) => warn!(job_id = %job_id, "job failed by batch error"),
            Ok(None) => {},
            Err(e) => error!(job_id = %job_id, error = %e, "could not fail job"),
        }
    }
}

async fn drive(
    lifecycle: &JobLifecycle,
    function: &Arc<Function>,
    pending: Vec<JobId>,
    workers: usize,
) -> Result<()> {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();
    let mut owners = HashMap::with_capacity(pending.len());

    for job_id in pending {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                tasks.detach_all();
                return Err(FunctionError::SystemicBatch {
                    message: format!("worker pool closed: {e}"),
                });
            },
        };
        let lifecycle = lifecycle.clone();
        let function = Arc::clone(function);
        let handle = tasks.spawn(async move {
            let _permit = permit;
            lifecycle.execute(&function, job_id).await
        });
        owners.insert(handle.id(), job_id);
    }

    let mut first_error = None;
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((_, Ok(_))) => {},
            Ok((task_id, Err(err))) => {
                let job_id = owners.get(&task_id).copied();
                error!(job_id = ?job_id, error = %err, "job could not be driven to completion");
                first_error.get_or_insert(err);
            },
            Err(join_err) => {
                let Some(&job_id) = owners.get(&join_err.id()) else {
                    continue;
                };
                warn!(job_id = %job_id, error = %join_err, "worker panicked");
                let detail = FailureDetail::new(
                    FailureKind::Execution,
                    format!("error executing function: worker panicked: {join_err}"),
                );
                if let Err(err) = lifecycle.fail_if_active(job_id, detail).await {
                    first_error.get_or_insert(err);
                }
            },
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
