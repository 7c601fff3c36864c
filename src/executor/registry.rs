//! Type-tag to executor mapping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;

use super::local::{CodeLoader, LocalCodeExecutor};
use super::remote::RemoteNetworkExecutor;
use super::Executor;
use crate::config::EngineConfig;
use crate::constants::{LOCAL_CODE_TYPE, REMOTE_NETWORK_TYPE};
use crate::error::{FunctionError, Result};

/// Maps function type tags to executors.
///
/// Registering a tag that is already present replaces the previous executor.
/// The registry is safe to share and to extend while jobs are running; a
/// dispatch uses whichever executor was registered when it looked the tag up.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use fnstore::{Executor, ExecutorRegistry};
/// use serde_json::{json, Value};
///
/// struct Echo;
///
/// #[async_trait]
/// impl Executor for Echo {
///     async fn execute(&self, _target: &str, input: &Value) -> fnstore::Result<Value> {
///         Ok(input.clone())
///     }
/// }
///
/// let registry = ExecutorRegistry::new();
/// registry.register("echo", Echo);
/// assert!(registry.supports("echo"));
/// assert!(!registry.supports("wasm"));
/// ```
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn Executor>>>,
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("type_tags", &self.type_tags())
            .finish()
    }
}

impl ExecutorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the `local.code` and `remote.network`
    /// executors installed.
    pub fn with_defaults(loader: Arc<dyn CodeLoader>, config: &EngineConfig) -> Result<Self> {
        let registry = Self::new();
        registry.register(LOCAL_CODE_TYPE, LocalCodeExecutor::new(loader));
        registry.register(
            REMOTE_NETWORK_TYPE,
            RemoteNetworkExecutor::new(config.remote_timeout())?,
        );
        Ok(registry)
    }

    /// Registers `executor` for `type_tag`, replacing any previous one.
    pub fn register<E>(&self, type_tag: impl Into<String>, executor: E)
    where
        E: Executor + 'static,
    {
        self.register_arc(type_tag, Arc::new(executor));
    }

    /// Registers an already shared executor.
    pub fn register_arc(&self, type_tag: impl Into<String>, executor: Arc<dyn Executor>) {
        let type_tag = type_tag.into();
        tracing::debug!(type_tag = %type_tag, "registering executor");
        self.executors.write().insert(type_tag, executor);
    }

    /// The executor for `type_tag`, if any.
    pub fn get(&self, type_tag: &str) -> Option<Arc<dyn Executor>> {
        self.executors.read().get(type_tag).cloned()
    }

    /// Returns `true` if an executor is registered for `type_tag`.
    pub fn supports(&self, type_tag: &str) -> bool {
        self.executors.read().contains_key(type_tag)
    }

    /// Registered type tags, sorted.
    pub fn type_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.executors.read().keys().cloned().collect();
        tags.sort();
        tags
    }

    /// Runs `target` with `input` on the executor registered for `type_tag`.
    ///
    /// # Errors
    ///
    /// [`FunctionError::UnsupportedFunctionType`] if no executor is
    /// registered, otherwise whatever the executor returns.
    pub async fn dispatch(&self, type_tag: &str, target: &str, input: &Value) -> Result<Value> {
        // The lock guard must be gone before awaiting the executor.
        let executor = self
            .get(type_tag)
            .ok_or_else(|| FunctionError::UnsupportedFunctionType {
                type_tag: type_tag.to_string(),
            })?;
        executor.execute(target, input).await
    }
}
