//! Optional `tracing` subscriber setup.
//!
//! The engine only emits `tracing` events; binaries decide where they go.
//! This helper installs a formatted subscriber filtered by `RUST_LOG`
//! (default `info`).

use tracing_subscriber::EnvFilter;

use crate::error::{FunctionError, Result};

/// Installs a global formatted subscriber.
///
/// Fails with [`FunctionError::Config`] if a global subscriber is already set.
pub fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| FunctionError::Config(format!("failed to install subscriber: {e}")))
}
