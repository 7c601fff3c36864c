//! The `local.code` executor.
//!
//! Targets have the form `path:symbol`, optionally prefixed with `file://`.
//! The path names a [`CodeUnit`] that a [`CodeLoader`] resolves; the symbol
//! names a callable inside it. The callable receives the input object's
//! fields as named arguments and runs on the blocking thread pool, so slow or
//! CPU-bound code never stalls the async runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use super::Executor;
use crate::error::{FunctionError, Result};

/// A callable exposed by a code unit.
///
/// Receives the input object's fields by name. An `Err` is reported as an
/// execution failure with the returned text.
pub type NativeFn = Arc<dyn Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync>;

/// A loadable unit of code: a path and the symbols it exports.
///
/// # Examples
///
/// ```
/// use fnstore::executor::local::CodeUnit;
/// use serde_json::json;
///
/// let unit = CodeUnit::new("strings.rs").with_symbol("upper", |args| {
///     let text = args.get("text").and_then(|v| v.as_str()).ok_or("text is required")?;
///     Ok(json!(text.to_uppercase()))
/// });
/// assert!(unit.symbol("upper").is_some());
/// assert!(unit.symbol("lower").is_none());
/// ```
#[derive(Clone)]
pub struct CodeUnit {
    path: String,
    symbols: HashMap<String, NativeFn>,
}

impl std::fmt::Debug for CodeUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut symbols: Vec<&String> = self.symbols.keys().collect();
        symbols.sort();
        f.debug_struct("CodeUnit")
            .field("path", &self.path)
            .field("symbols", &symbols)
            .finish()
    }
}

impl CodeUnit {
    /// An empty unit at `path`.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            symbols: HashMap::new(),
        }
    }

    /// Exports `f` as `name`.
    pub fn with_symbol<F>(mut self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.symbols.insert(name.into(), Arc::new(f));
        self
    }

    /// The unit's path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Looks up an exported symbol.
    pub fn symbol(&self, name: &str) -> Option<NativeFn> {
        self.symbols.get(name).cloned()
    }
}

/// Resolves a code path to a loaded [`CodeUnit`].
pub trait CodeLoader: Send + Sync {
    /// Loads the unit at `path`.
    ///
    /// # Errors
    ///
    /// [`FunctionError::Load`] if nothing can be loaded from `path`.
    fn load(&self, path: &str) -> Result<Arc<CodeUnit>>;
}

/// A [`CodeLoader`] over units installed in memory.
#[derive(Debug, Default)]
pub struct ModuleTable {
    modules: DashMap<String, Arc<CodeUnit>>,
}

impl ModuleTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `unit` under its path, replacing any unit already there.
    pub fn install(&self, unit: CodeUnit) {
        tracing::debug!(path = %unit.path, "installing code unit");
        self.modules.insert(unit.path.clone(), Arc::new(unit));
    }

    /// Removes the unit at `path`, returning whether one was installed.
    pub fn uninstall(&self, path: &str) -> bool {
        self.modules.remove(path).is_some()
    }
}

impl CodeLoader for ModuleTable {
    fn load(&self, path: &str) -> Result<Arc<CodeUnit>> {
        self.modules
            .get(path)
            .map(|unit| Arc::clone(unit.value()))
            .ok_or_else(|| FunctionError::load(path, "no code unit at this path"))
    }
}

/// Splits a `local.code` target into its path and symbol.
///
/// The split is on the last `:`, so paths may contain colons themselves. A
/// leading `file://` is stripped.
///
/// ```
/// use fnstore::executor::local::parse_target;
///
/// assert_eq!(parse_target("file://lib/math.rs:add").unwrap(), ("lib/math.rs", "add"));
/// assert_eq!(parse_target("c:/code/math.rs:add").unwrap(), ("c:/code/math.rs", "add"));
/// assert!(parse_target("math.rs").is_err());
/// ```
pub fn parse_target(target: &str) -> Result<(&str, &str)> {
    let location = target.strip_prefix("file://").unwrap_or(target);
    match location.rsplit_once(':') {
        Some((path, symbol)) if !path.is_empty() && !symbol.is_empty() => Ok((path, symbol)),
        _ => Err(FunctionError::load(
            target,
            "expected a target of the form path:symbol",
        )),
    }
}

/// Executes in-process code resolved through a [`CodeLoader`].
pub struct LocalCodeExecutor {
    loader: Arc<dyn CodeLoader>,
}

impl std::fmt::Debug for LocalCodeExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCodeExecutor").finish_non_exhaustive()
    }
}

impl LocalCodeExecutor {
    /// Creates an executor resolving code through `loader`.
    pub fn new(loader: Arc<dyn CodeLoader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Executor for LocalCodeExecutor {
    async fn execute(&self, target: &str, input: &Value) -> Result<Value> {
        let (path, symbol) = parse_target(target)?;
        let unit = self.loader.load(path)?;
        let callable = unit.symbol(symbol).ok_or_else(|| {
            FunctionError::load(target, format!("symbol {symbol} not found in {path}"))
        })?;

        let Value::Object(args) = input else {
            return Err(FunctionError::execution(format!(
                "local function {symbol} expects an object of named arguments"
            )));
        };
        let args = args.clone();

        let outcome = tokio::task::spawn_blocking(move || callable(&args))
            .await
            .map_err(|e| {
                if e.is_panic() {
                    let payload = e.into_panic();
                    let reason = payload
                        .downcast_ref::<&str>()
                        .map(|s| (*s).to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    FunctionError::execution(format!("function panicked: {reason}"))
                } else {
                    FunctionError::execution(format!("function task was cancelled: {e}"))
                }
            })?;

        outcome.map_err(|e| {
            FunctionError::execution(format!("error executing local function {symbol}: {e}"))
        })
    }
}
