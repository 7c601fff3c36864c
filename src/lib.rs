//! Function registry and job execution engine.
//!
//! `fnstore` lets callers register *functions* (a type tag plus an
//! invocation target such as local code or a remote endpoint), run them with
//! JSON inputs, and track each invocation as a *job* that moves through a
//! small state machine:
//!
//! ```text
//! PENDING -> RUNNING -> COMPLETED
//!                    -> FAILED
//! PENDING -> FAILED              (input rejected by the declared schema)
//! ```
//!
//! Many inputs for one function can be mapped into a batch that runs under a
//! worker bound, and job ids can be grouped into collections whose status is
//! derived from their members on every read.
//!
//! # Module Organization
//!
//! - [`types`] - Functions, jobs, collections, and their identifiers
//! - [`executor`] - The [`Executor`] trait, the type-tag registry, and the
//!   local-code and remote-network executors
//! - [`schema`] - The [`SchemaGate`] validation seam and its `jsonschema` backend
//! - [`store`] - The [`Store`] trait with a versioned in-memory implementation
//! - [`lifecycle`] - Job creation and state transitions
//! - [`batch`] - Bounded-concurrency batch runs
//! - [`collection`] - Collection creation and status roll-up
//! - [`service`] - The [`FunctionService`] facade tying it all together
//! - [`config`] - Engine configuration
//! - [`error`] - The crate error type
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fnstore::executor::local::{CodeUnit, ModuleTable};
//! use fnstore::{FunctionService, FunctionSpec, LOCAL_CODE_TYPE};
//! use serde_json::json;
//!
//! # async fn demo() -> fnstore::Result<()> {
//! let modules = Arc::new(ModuleTable::new());
//! modules.install(CodeUnit::new("math.rs").with_symbol("add", |args| {
//!     let x = args.get("x").and_then(|v| v.as_f64()).unwrap_or_default();
//!     let y = args.get("y").and_then(|v| v.as_f64()).unwrap_or_default();
//!     Ok(json!(x + y))
//! }));
//!
//! let service = FunctionService::builder().code_loader(modules).build()?;
//! let function = service
//!     .register_function(FunctionSpec::new("add", LOCAL_CODE_TYPE, "math.rs:add"))
//!     .await?;
//! let job = service.run(function.id, json!({"x": 1, "y": 2})).await?;
//! assert_eq!(job.output, Some(json!({"result": 3.0})));
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod collection;
pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod lifecycle;
#[cfg(feature = "logging")]
pub mod logging;
pub mod schema;
pub mod service;
pub mod store;
pub mod types;

// Re-exports for ergonomic access
pub use batch::{BatchHandle, BatchReport, BatchRunner};
pub use collection::CollectionAggregator;
pub use config::EngineConfig;
pub use constants::*;
pub use error::{FunctionError, Result};
pub use executor::{Executor, ExecutorRegistry};
pub use lifecycle::JobLifecycle;
pub use schema::{JsonSchemaGate, SchemaGate, SchemaViolation};
pub use service::{BatchRun, FunctionService, FunctionServiceBuilder};
pub use store::{InMemoryStore, JobFilter, Store};
pub use types::*;
