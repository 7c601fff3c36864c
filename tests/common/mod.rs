//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use fnstore::executor::local::{CodeUnit, ModuleTable};
use fnstore::store::{InMemoryStore, JobFilter, Store};
use fnstore::{
    CollectionId, Function, FunctionError, FunctionId, FunctionService, FunctionSpec, Job,
    JobCollection, JobId, JobStatus, NewCollection, NewJob, LOCAL_CODE_TYPE,
};
use serde_json::{json, Value};

/// Object schema requiring numeric `x` and `y`.
pub fn xy_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "x": {"type": "number"},
            "y": {"type": "number"}
        },
        "required": ["x", "y"]
    })
}

/// Wrapped-output schema requiring a numeric `result`.
pub fn numeric_result_schema() -> Value {
    json!({
        "type": "object",
        "properties": {"result": {"type": "number"}},
        "required": ["result"]
    })
}

/// `math.rs` with `add` (integers in, integer out) and `fail` (always errors).
pub fn math_module() -> CodeUnit {
    CodeUnit::new("math.rs")
        .with_symbol("add", |args| {
            let x = args.get("x").and_then(Value::as_i64).ok_or("x must be an integer")?;
            let y = args.get("y").and_then(Value::as_i64).ok_or("y must be an integer")?;
            Ok(json!(x + y))
        })
        .with_symbol("fail", |_| Err("deliberate failure".to_string()))
        .with_symbol("text", |_| Ok(json!("not a number")))
}

/// A service whose module table holds [`math_module`], plus the table.
pub fn service() -> (FunctionService, Arc<ModuleTable>) {
    let modules = Arc::new(ModuleTable::new());
    modules.install(math_module());
    let service = FunctionService::builder()
        .code_loader(modules.clone())
        .build()
        .unwrap();
    (service, modules)
}

/// Registers `addXY` with input and output schemas.
pub async fn register_add(service: &FunctionService) -> Function {
    service
        .register_function(
            FunctionSpec::new("addXY", LOCAL_CODE_TYPE, "math.rs:add")
                .with_description("Adds x and y")
                .with_input_schema(xy_schema())
                .with_output_schema(numeric_result_schema())
                .with_tags(["math", "arithmetic"]),
        )
        .await
        .unwrap()
}

/// A service over `store` whose module table holds [`math_module`].
pub fn service_with_store(store: Arc<dyn Store>) -> FunctionService {
    let modules = Arc::new(ModuleTable::new());
    modules.install(math_module());
    FunctionService::builder()
        .store(store)
        .code_loader(modules)
        .build()
        .unwrap()
}

// ─── Fault injection ────────────────────────────────────────────────────────

/// The one failure a [`FaultyStore`] injects.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// The first attempt to move this job to `Running` fails.
    StartOnce(JobId),
    /// The nth `save_job` call (counting from 1) fails.
    SaveJob(usize),
    /// Every write that would complete a job fails.
    CompleteJob,
    /// The first n `get_job` calls panic.
    PanicOnRead(usize),
}

/// In-memory store that injects a single [`Fault`].
pub struct FaultyStore {
    inner: InMemoryStore,
    fault: Fault,
    hits: AtomicUsize,
}

impl FaultyStore {
    pub fn new(fault: Fault) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryStore::in_memory(),
            fault,
            hits: AtomicUsize::new(0),
        })
    }

    fn hit(&self) -> usize {
        self.hits.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn disk_full() -> FunctionError {
    FunctionError::Store("disk full".to_string())
}

#[async_trait]
impl Store for FaultyStore {
    async fn save_function(&self, spec: FunctionSpec) -> fnstore::Result<Function> {
        self.inner.save_function(spec).await
    }

    async fn get_function(&self, id: FunctionId) -> fnstore::Result<Function> {
        self.inner.get_function(id).await
    }

    async fn list_functions(&self) -> fnstore::Result<Vec<Function>> {
        self.inner.list_functions().await
    }

    async fn delete_all_functions(&self) -> fnstore::Result<usize> {
        self.inner.delete_all_functions().await
    }

    async fn save_job(&self, job: NewJob) -> fnstore::Result<Job> {
        if let Fault::SaveJob(nth) = self.fault {
            if self.hit() == nth {
                return Err(disk_full());
            }
        }
        self.inner.save_job(job).await
    }

    async fn get_job(&self, id: JobId) -> fnstore::Result<Job> {
        if let Fault::PanicOnRead(times) = self.fault {
            if self.hit() <= times {
                panic!("store read of job {id} panicked");
            }
        }
        self.inner.get_job(id).await
    }

    async fn update_job(&self, job: &Job) -> fnstore::Result<Job> {
        match self.fault {
            Fault::StartOnce(victim)
                if job.id == victim && job.status == JobStatus::Running && self.hit() == 1 =>
            {
                return Err(disk_full());
            },
            Fault::CompleteJob if job.status == JobStatus::Completed => {
                return Err(disk_full());
            },
            _ => {},
        }
        self.inner.update_job(job).await
    }

    async fn query_jobs(&self, filter: &JobFilter) -> fnstore::Result<Vec<Job>> {
        self.inner.query_jobs(filter).await
    }

    async fn save_collection(&self, collection: NewCollection) -> fnstore::Result<JobCollection> {
        self.inner.save_collection(collection).await
    }

    async fn get_collection(&self, id: CollectionId) -> fnstore::Result<JobCollection> {
        self.inner.get_collection(id).await
    }

    async fn update_collection(
        &self,
        collection: &JobCollection,
    ) -> fnstore::Result<JobCollection> {
        self.inner.update_collection(collection).await
    }

    async fn list_collections(&self) -> fnstore::Result<Vec<JobCollection>> {
        self.inner.list_collections().await
    }
}
