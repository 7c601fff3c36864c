//! Job creation and state transitions.
//!
//! [`JobLifecycle`] is the only component that writes job records. Every
//! transition is a read-modify-write: the job is re-read, the transition is
//! checked against [`JobStatus::can_transition_to`], and the update is
//! written with the version that was read. Executor failures end up on the
//! job as a [`FailureDetail`]; only store-level problems are returned as
//! errors.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::constants::RESULT_KEY;
use crate::error::{FunctionError, Result, SchemaContext};
use crate::executor::ExecutorRegistry;
use crate::schema::{SchemaGate, SchemaViolation};
use crate::store::Store;
use crate::types::{FailureDetail, Function, Job, JobId, JobStatus, NewJob};

/// Drives jobs through `PENDING -> RUNNING -> {COMPLETED, FAILED}`.
///
/// Cheap to clone; clones share the store, registry, and schema gate.
#[derive(Clone)]
pub struct JobLifecycle {
    store: Arc<dyn Store>,
    registry: Arc<ExecutorRegistry>,
    schemas: Arc<dyn SchemaGate>,
}

impl std::fmt::Debug for JobLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLifecycle")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

fn violation_error(context: SchemaContext, violation: SchemaViolation) -> FunctionError {
    FunctionError::Validation {
        context,
        path: violation.path,
        message: violation.message,
    }
}

impl JobLifecycle {
    /// Creates a lifecycle manager over shared components.
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<ExecutorRegistry>,
        schemas: Arc<dyn SchemaGate>,
    ) -> Self {
        Self {
            store,
            registry,
            schemas,
        }
    }

    /// The store jobs are written to.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The executor registry used by [`execute`](Self::execute).
    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    /// Creates a job for `function` with `input`.
    ///
    /// If the function declares an input schema and `input` violates it, the
    /// job is stored directly as `Failed` with a validation detail and never
    /// runs.
    pub async fn create(&self, function: &Function, input: Value) -> Result<Job> {
        let new_job = match self.check_input(function, &input) {
            Ok(()) => NewJob::pending(function.id, input),
            Err(err) => NewJob::rejected(function.id, input, FailureDetail::from_error(&err)),
        };
        let job = self.store.save_job(new_job).await?;
        match &job.failure {
            Some(failure) => warn!(
                job_id = %job.id,
                function_id = %function.id,
                error = %failure.error,
                "job rejected by input schema"
            ),
            None => debug!(job_id = %job.id, function_id = %function.id, "job created"),
        }
        Ok(job)
    }

    fn check_input(&self, function: &Function, input: &Value) -> Result<()> {
        match &function.input_schema {
            Some(schema) => self
                .schemas
                .validate(input, schema)
                .map_err(|v| violation_error(SchemaContext::Input, v)),
            None => Ok(()),
        }
    }

    /// Moves a pending job to `Running`.
    ///
    /// # Errors
    ///
    /// [`FunctionError::InvalidTransition`] if the job is not `Pending`.
    pub async fn start(&self, job_id: JobId) -> Result<Job> {
        self.transition(job_id, JobStatus::Running, |_| {}).await
    }

    /// Completes a running job with `output`, stored as `{"result": output}`.
    ///
    /// If the function declares an output schema and the wrapped output
    /// violates it, the job is failed with a validation detail instead.
    pub async fn complete(&self, function: &Function, job_id: JobId, output: Value) -> Result<Job> {
        let mut fields = Map::new();
        fields.insert(RESULT_KEY.to_string(), output);
        let wrapped = Value::Object(fields);
        if let Some(schema) = &function.output_schema {
            if let Err(violation) = self.schemas.validate(&wrapped, schema) {
                let err = violation_error(SchemaContext::Output, violation);
                return self.fail(job_id, FailureDetail::from_error(&err)).await;
            }
        }
        self.transition(job_id, JobStatus::Completed, move |job| {
            job.output = Some(wrapped);
        })
        .await
    }

    /// Fails a pending or running job with `detail`.
    pub async fn fail(&self, job_id: JobId, detail: FailureDetail) -> Result<Job> {
        self.transition(job_id, JobStatus::Failed, move |job| {
            job.failure = Some(detail);
        })
        .await
    }

    /// Runs a pending job to a terminal state.
    ///
    /// Executor errors (unsupported type, load, execution) are recorded on
    /// the job. The returned error is reserved for failures to read or write
    /// the job itself. When such a failure happens after the job was
    /// started, the job is failed with a systemic detail before the error is
    /// returned, so it does not stay `Running`.
    pub async fn execute(&self, function: &Function, job_id: JobId) -> Result<Job> {
        self.start(job_id).await?;
        match self.run_started(function, job_id).await {
            Ok(job) => Ok(job),
            Err(err) => {
                error!(job_id = %job_id, error = %err, "job could not be recorded");
                let detail = FailureDetail::systemic(format!("Background task error: {err}"));
                if let Err(e) = self.fail_if_active(job_id, detail).await {
                    error!(job_id = %job_id, error = %e, "could not fail job");
                }
                Err(err)
            },
        }
    }

    async fn run_started(&self, function: &Function, job_id: JobId) -> Result<Job> {
        let job = self.store.get_job(job_id).await?;

        match self
            .registry
            .dispatch(&function.type_tag, &function.target, &job.input)
            .await
        {
            Ok(output) => {
                let job = self.complete(function, job_id, output).await?;
                if let Some(failure) = &job.failure {
                    warn!(job_id = %job_id, error = %failure.error, "job output rejected");
                } else {
                    info!(job_id = %job_id, function_id = %function.id, "job completed");
                }
                Ok(job)
            },
            Err(err) => {
                warn!(
                    job_id = %job_id,
                    function_id = %function.id,
                    kind = %err.kind(),
                    error = %err,
                    "job failed"
                );
                self.fail(job_id, FailureDetail::from_error(&err)).await
            },
        }
    }

    /// Fails the job if it has not reached a terminal state yet.
    ///
    /// Returns the failed job, or `None` if it was already terminal. Retries
    /// when the job changes underneath, so a job finishing concurrently is
    /// left as it finished.
    pub async fn fail_if_active(
        &self,
        job_id: JobId,
        detail: FailureDetail,
    ) -> Result<Option<Job>> {
        loop {
            let mut job = self.store.get_job(job_id).await?;
            if job.is_terminal() {
                return Ok(None);
            }
            job.status = JobStatus::Failed;
            job.failure = Some(detail.clone());
            job.updated_at = Utc::now();
            match self.store.update_job(&job).await {
                Ok(job) => return Ok(Some(job)),
                Err(FunctionError::ConcurrentModification { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
    }

    async fn transition<F>(&self, job_id: JobId, next: JobStatus, apply: F) -> Result<Job>
    where
        F: FnOnce(&mut Job),
    {
        let mut job = self.store.get_job(job_id).await?;
        let from = job.status;
        from.validate_transition(job_id, next)?;

        job.status = next;
        apply(&mut job);
        job.updated_at = Utc::now();

        let job = self.store.update_job(&job).await?;
        debug!(job_id = %job_id, from = %from, to = %next, "job transition");
        Ok(job)
    }
}
