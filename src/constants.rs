//! Built-in type tags and engine defaults.

/// Type tag for functions implemented as native code loaded by path and symbol.
pub const LOCAL_CODE_TYPE: &str = "local.code";

/// Type tag for functions invoked by POSTing JSON to a URL.
pub const REMOTE_NETWORK_TYPE: &str = "remote.network";

/// Key under which an executor's output is stored on a completed job.
///
/// A job's output is always `{"result": <executor output>}`, and output
/// schemas are checked against that wrapped value.
pub const RESULT_KEY: &str = "result";

/// Worker bound used by batch runs when the caller gives none.
pub const DEFAULT_MAX_PARALLEL_JOBS: usize = 10;

/// Per-request timeout for the remote-network executor, in milliseconds.
pub const DEFAULT_REMOTE_TIMEOUT_MS: u64 = 30_000;

/// Page size for per-function job listings when no limit is given.
pub const DEFAULT_JOB_PAGE_SIZE: usize = 100;
