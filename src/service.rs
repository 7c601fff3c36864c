//! The [`FunctionService`] facade.
//!
//! The service wires the store, executor registry, schema gate, lifecycle
//! manager, batch runner, and collection aggregator together and exposes the
//! operations callers use: registering and searching functions, running one
//! input or many, querying jobs, and grouping jobs into collections.
//!
//! Lookups and argument checks happen before anything is written: an unknown
//! function, an unsupported type tag, a malformed raw input, or a zero
//! worker bound is returned as an error and no job is created.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::info;

use crate::batch::{BatchHandle, BatchRunner};
use crate::collection::CollectionAggregator;
use crate::config::EngineConfig;
use crate::error::{FunctionError, Result, SchemaContext};
use crate::executor::local::{CodeLoader, ModuleTable};
use crate::executor::ExecutorRegistry;
use crate::lifecycle::JobLifecycle;
use crate::schema::{JsonSchemaGate, SchemaGate};
use crate::store::{InMemoryStore, JobFilter, Store};
use crate::types::{
    CollectionId, CollectionReport, Function, FunctionId, FunctionSpec, Job, JobCollection, JobId,
    MemberStatus,
};

/// Parses raw JSON input payloads.
///
/// Every payload is parsed before any is used, so one malformed payload
/// rejects the whole request.
///
/// ```
/// use fnstore::service::parse_raw_inputs;
/// use serde_json::json;
///
/// let inputs = parse_raw_inputs(&[r#"{"x": 1}"#, r#"{"x": 2}"#]).unwrap();
/// assert_eq!(inputs, vec![json!({"x": 1}), json!({"x": 2})]);
///
/// let err = parse_raw_inputs(&["{\"x\": 1}", "{oops"]).unwrap_err();
/// assert!(err.to_string().contains("{oops"));
/// ```
pub fn parse_raw_inputs<S: AsRef<str>>(raw: &[S]) -> Result<Vec<Value>> {
    raw.iter()
        .enumerate()
        .map(|(index, payload)| {
            let payload = payload.as_ref();
            serde_json::from_str(payload).map_err(|e| {
                FunctionError::InvalidInput(format!(
                    "input {index} is not valid JSON ({e}): {payload}"
                ))
            })
        })
        .collect()
}

/// A batch together with the collection grouping its jobs.
#[derive(Debug)]
pub struct BatchRun {
    /// The collection holding every job of the batch, in input order.
    pub collection: JobCollection,
    /// The running batch.
    pub handle: BatchHandle,
}

/// Builder for [`FunctionService`].
///
/// Every component is optional. The defaults are an in-memory store, the
/// `jsonschema`-backed gate, an empty [`ModuleTable`], and a registry with
/// the `local.code` and `remote.network` executors.
#[derive(Default)]
pub struct FunctionServiceBuilder {
    store: Option<Arc<dyn Store>>,
    registry: Option<Arc<ExecutorRegistry>>,
    schemas: Option<Arc<dyn SchemaGate>>,
    loader: Option<Arc<dyn CodeLoader>>,
    config: Option<EngineConfig>,
}

impl std::fmt::Debug for FunctionServiceBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionServiceBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl FunctionServiceBuilder {
    /// Uses `store` for all records.
    pub fn store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Uses a caller-built registry. The code loader is then ignored.
    pub fn registry(mut self, registry: Arc<ExecutorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Uses `schemas` for input/output validation.
    pub fn schema_gate(mut self, schemas: Arc<dyn SchemaGate>) -> Self {
        self.schemas = Some(schemas);
        self
    }

    /// Resolves `local.code` targets through `loader`.
    pub fn code_loader(mut self, loader: Arc<dyn CodeLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Sets the engine configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Builds the service.
    ///
    /// # Errors
    ///
    /// [`FunctionError::Config`] if the configuration is out of range or
    /// the HTTP client for the remote executor cannot be created.
    pub fn build(self) -> Result<FunctionService> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryStore::in_memory()) as Arc<dyn Store>);
        let schemas = self
            .schemas
            .unwrap_or_else(|| Arc::new(JsonSchemaGate::new()) as Arc<dyn SchemaGate>);
        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let loader = self
                    .loader
                    .unwrap_or_else(|| Arc::new(ModuleTable::new()) as Arc<dyn CodeLoader>);
                Arc::new(ExecutorRegistry::with_defaults(loader, &config)?)
            },
        };

        let lifecycle = JobLifecycle::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&schemas),
        );
        Ok(FunctionService {
            batches: BatchRunner::new(lifecycle.clone()),
            collections: CollectionAggregator::new(Arc::clone(&store)),
            lifecycle,
            store,
            registry,
            schemas,
            config: RwLock::new(config),
        })
    }
}

/// Function registry and job execution engine.
///
/// # Examples
///
/// ```rust,no_run
/// use fnstore::{FunctionService, FunctionSpec, JobStatus, REMOTE_NETWORK_TYPE};
/// use serde_json::json;
///
/// # async fn demo() -> fnstore::Result<()> {
/// let service = FunctionService::new()?;
/// let function = service
///     .register_function(FunctionSpec::new(
///         "score",
///         REMOTE_NETWORK_TYPE,
///         "https://models.internal/score",
///     ))
///     .await?;
///
/// let run = service
///     .batch(function.id, "nightly", vec![json!({"id": 1}), json!({"id": 2})], Some(2))
///     .await?;
/// let report = run.handle.join().await?;
/// assert!(report.jobs.iter().all(|job| job.status != JobStatus::Pending));
///
/// let status = service.collection_status(run.collection.id).await?;
/// println!("collection is {}", status.status());
/// # Ok(())
/// # }
/// ```
pub struct FunctionService {
    store: Arc<dyn Store>,
    registry: Arc<ExecutorRegistry>,
    schemas: Arc<dyn SchemaGate>,
    lifecycle: JobLifecycle,
    batches: BatchRunner,
    collections: CollectionAggregator,
    config: RwLock<EngineConfig>,
}

impl std::fmt::Debug for FunctionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionService")
            .field("registry", &self.registry)
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}

impl FunctionService {
    /// Starts building a service.
    pub fn builder() -> FunctionServiceBuilder {
        FunctionServiceBuilder::default()
    }

    /// A service with every default component.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// The executor registry, for registering additional type tags.
    pub fn registry(&self) -> &Arc<ExecutorRegistry> {
        &self.registry
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The lifecycle manager.
    pub fn lifecycle(&self) -> &JobLifecycle {
        &self.lifecycle
    }

    // ---- Function catalogue ----

    /// Registers a function.
    ///
    /// The type tag does not need an executor yet; running the function
    /// before one is registered fails with
    /// [`FunctionError::UnsupportedFunctionType`].
    ///
    /// # Errors
    ///
    /// [`FunctionError::InvalidSchema`] if a declared schema does not compile.
    pub async fn register_function(&self, spec: FunctionSpec) -> Result<Function> {
        let declared = [
            (SchemaContext::Input, &spec.input_schema),
            (SchemaContext::Output, &spec.output_schema),
        ];
        for (context, schema) in declared {
            if let Some(schema) = schema {
                self.schemas
                    .check_schema(schema)
                    .map_err(|message| FunctionError::InvalidSchema { context, message })?;
            }
        }

        let function = self.store.save_function(spec).await?;
        info!(
            function_id = %function.id,
            name = %function.name,
            type_tag = %function.type_tag,
            "function registered"
        );
        Ok(function)
    }

    /// Fetches a function.
    pub async fn get_function(&self, id: FunctionId) -> Result<Function> {
        self.store.get_function(id).await
    }

    /// All functions, in id order.
    pub async fn list_functions(&self) -> Result<Vec<Function>> {
        self.store.list_functions().await
    }

    /// Removes every function and returns how many were removed. Jobs and
    /// collections are kept.
    pub async fn delete_all_functions(&self) -> Result<usize> {
        let removed = self.store.delete_all_functions().await?;
        info!(removed, "functions deleted");
        Ok(removed)
    }

    /// Functions whose name contains `fragment` (case-sensitive).
    pub async fn search_functions_by_name(&self, fragment: &str) -> Result<Vec<Function>> {
        let mut functions = self.store.list_functions().await?;
        functions.retain(|f| f.name.contains(fragment));
        Ok(functions)
    }

    /// Functions carrying any of `tags`, or all of them with `match_all`.
    pub async fn search_functions_by_tags<S: AsRef<str>>(
        &self,
        tags: &[S],
        match_all: bool,
    ) -> Result<Vec<Function>> {
        let mut functions = self.store.list_functions().await?;
        functions.retain(|f| f.matches_tags(tags, match_all));
        Ok(functions)
    }

    // ---- Running ----

    async fn runnable(&self, function_id: FunctionId) -> Result<Function> {
        let function = self.store.get_function(function_id).await?;
        if !self.registry.supports(&function.type_tag) {
            return Err(FunctionError::UnsupportedFunctionType {
                type_tag: function.type_tag,
            });
        }
        Ok(function)
    }

    /// Runs `function_id` once with `input` and waits for the job to finish.
    ///
    /// The returned job is terminal. Input validation, load, and execution
    /// failures are reported on the job, not as an error.
    ///
    /// # Errors
    ///
    /// - [`FunctionError::NotFound`] for an unknown function.
    /// - [`FunctionError::UnsupportedFunctionType`] if no executor handles
    ///   the function's type tag.
    pub async fn run(&self, function_id: FunctionId, input: Value) -> Result<Job> {
        let function = self.runnable(function_id).await?;
        let job = self.lifecycle.create(&function, input).await?;
        if job.is_terminal() {
            return Ok(job);
        }
        self.lifecycle.execute(&function, job.id).await
    }

    /// Maps `inputs` over `function_id` as a background batch.
    ///
    /// `max_workers` defaults to the configured `max_parallel_jobs`.
    pub async fn map(
        &self,
        function_id: FunctionId,
        inputs: Vec<Value>,
        max_workers: Option<usize>,
    ) -> Result<BatchHandle> {
        let workers = max_workers.unwrap_or_else(|| self.config.read().max_parallel_jobs);
        if workers == 0 {
            return Err(FunctionError::InvalidInput(
                "max_workers must be at least 1".to_string(),
            ));
        }
        let function = self.runnable(function_id).await?;
        self.batches.map(function, inputs, workers).await
    }

    /// Like [`map`](Self::map), with inputs given as raw JSON strings.
    pub async fn map_raw<S: AsRef<str>>(
        &self,
        function_id: FunctionId,
        raw_inputs: &[S],
        max_workers: Option<usize>,
    ) -> Result<BatchHandle> {
        let inputs = parse_raw_inputs(raw_inputs)?;
        self.map(function_id, inputs, max_workers).await
    }

    /// Maps `inputs` over `function_id` and groups the jobs into a new
    /// collection named `collection_name`.
    ///
    /// If the collection cannot be stored, the error is returned and the
    /// batch keeps running detached, like a dropped [`BatchHandle`].
    pub async fn batch(
        &self,
        function_id: FunctionId,
        collection_name: impl Into<String>,
        inputs: Vec<Value>,
        max_workers: Option<usize>,
    ) -> Result<BatchRun> {
        let handle = self.map(function_id, inputs, max_workers).await?;
        let collection = self
            .collections
            .create_collection(
                collection_name,
                Some(format!("Batch execution of function {function_id}")),
                handle.job_ids(),
            )
            .await?;
        Ok(BatchRun { collection, handle })
    }

    /// Like [`batch`](Self::batch), with inputs given as raw JSON strings.
    pub async fn batch_raw<S: AsRef<str>>(
        &self,
        function_id: FunctionId,
        collection_name: impl Into<String>,
        raw_inputs: &[S],
        max_workers: Option<usize>,
    ) -> Result<BatchRun> {
        let inputs = parse_raw_inputs(raw_inputs)?;
        self.batch(function_id, collection_name, inputs, max_workers)
            .await
    }

    // ---- Jobs ----

    /// Fetches a job.
    pub async fn get_job(&self, id: JobId) -> Result<Job> {
        self.store.get_job(id).await
    }

    /// Current statuses of `ids`, in the given order. Unknown ids are
    /// skipped.
    pub async fn jobs_status(&self, ids: &[JobId]) -> Result<Vec<MemberStatus>> {
        let mut statuses = Vec::with_capacity(ids.len());
        for &job_id in ids {
            match self.store.get_job(job_id).await {
                Ok(job) => statuses.push(MemberStatus {
                    job_id,
                    status: job.status,
                }),
                Err(FunctionError::NotFound { .. }) => {},
                Err(err) => return Err(err),
            }
        }
        Ok(statuses)
    }

    /// Jobs matching `filter`, newest first.
    pub async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>> {
        self.store.query_jobs(filter).await
    }

    /// Jobs of one function, newest first.
    ///
    /// Without an explicit limit, at most the configured
    /// `default_job_page_size` jobs are returned.
    ///
    /// # Errors
    ///
    /// [`FunctionError::NotFound`] for an unknown function.
    pub async fn function_jobs(&self, function_id: FunctionId, filter: JobFilter) -> Result<Vec<Job>> {
        self.store.get_function(function_id).await?;
        let mut filter = filter.with_function(function_id);
        if filter.limit.is_none() {
            filter.limit = Some(self.config.read().default_job_page_size);
        }
        self.store.query_jobs(&filter).await
    }

    // ---- Collections ----

    /// Creates a collection over existing jobs.
    pub async fn create_collection(
        &self,
        name: impl Into<String>,
        description: Option<String>,
        job_ids: Vec<JobId>,
    ) -> Result<JobCollection> {
        self.collections
            .create_collection(name, description, job_ids)
            .await
    }

    /// All collections with their stored status snapshots.
    pub async fn list_collections(&self) -> Result<Vec<JobCollection>> {
        self.collections.list_collections().await
    }

    /// Derives the current status of a collection.
    pub async fn collection_status(&self, id: CollectionId) -> Result<CollectionReport> {
        self.collections.collection_status(id).await
    }

    // ---- Configuration ----

    /// A copy of the current configuration.
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// Changes the default worker bound for later batches.
    ///
    /// # Errors
    ///
    /// [`FunctionError::InvalidInput`] if `workers` is zero.
    pub fn set_max_parallel_jobs(&self, workers: usize) -> Result<()> {
        if workers == 0 {
            return Err(FunctionError::InvalidInput(
                "max_parallel_jobs must be at least 1".to_string(),
            ));
        }
        self.config.write().max_parallel_jobs = workers;
        info!(max_parallel_jobs = workers, "configuration updated");
        Ok(())
    }
}
