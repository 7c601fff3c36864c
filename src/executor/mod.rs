//! Executors: the pluggable strategies that actually invoke a function.
//!
//! An [`Executor`] takes a function's invocation target and an input value
//! and produces a raw output. Executors know nothing about jobs, schemas, or
//! storage; the [`ExecutorRegistry`] maps a function's type tag to the
//! executor that handles it.
//!
//! Two executors ship with the crate:
//!
//! - [`LocalCodeExecutor`](local::LocalCodeExecutor) (`local.code`) resolves
//!   `path:symbol` targets through a [`CodeLoader`](local::CodeLoader) and
//!   calls the symbol with the input's fields as named arguments.
//! - [`RemoteNetworkExecutor`](remote::RemoteNetworkExecutor)
//!   (`remote.network`) POSTs the input as JSON to the target URL.

pub mod local;
pub mod registry;
pub mod remote;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use registry::ExecutorRegistry;

/// A strategy that invokes a function target with an input value.
///
/// Implementations report resolution failures as
/// [`FunctionError::Load`](crate::error::FunctionError::Load) and runtime
/// failures as [`FunctionError::Execution`](crate::error::FunctionError::Execution).
/// They may run concurrently for different jobs and must not keep per-call
/// state.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Invokes `target` with `input` and returns the raw (unwrapped) output.
    async fn execute(&self, target: &str, input: &Value) -> Result<Value>;
}
