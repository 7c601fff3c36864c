//! Error types for function registration, execution, and job tracking.
//!
//! [`FunctionError`] is the single error type of the crate. Some variants are
//! surfaced synchronously to callers (`NotFound`, `UnsupportedFunctionType`,
//! `InvalidInput`), while the execution-side variants (`Load`, `Execution`,
//! `Validation`) are normally caught by the lifecycle manager and recorded on
//! the job as a [`FailureDetail`](crate::types::FailureDetail). Use
//! [`FunctionError::kind`] to get the failure classification that ends up on
//! the job.

use std::fmt;

use thiserror::Error;

use crate::types::{FailureKind, JobId, JobStatus};

/// Which side of a function call a schema check applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaContext {
    /// The value supplied by the caller.
    Input,
    /// The wrapped value produced by the executor.
    Output,
}

impl fmt::Display for SchemaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => write!(f, "Input"),
            Self::Output => write!(f, "Output"),
        }
    }
}

/// The kind of record a lookup was made for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// A registered function.
    Function,
    /// A job.
    Job,
    /// A job collection.
    Collection,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function => write!(f, "function"),
            Self::Job => write!(f, "function job"),
            Self::Collection => write!(f, "function job collection"),
        }
    }
}

/// Errors that can occur while registering, running, or tracking functions.
///
/// # Examples
///
/// ```
/// use fnstore::error::RecordKind;
/// use fnstore::{FailureKind, FunctionError};
///
/// let err = FunctionError::not_found(RecordKind::Function, 7u64);
/// assert_eq!(err.to_string(), "function not found: 7");
///
/// let err = FunctionError::execution("division by zero");
/// assert_eq!(err.kind(), FailureKind::Execution);
/// ```
#[derive(Error, Debug)]
pub enum FunctionError {
    /// No executor is registered for the function's type tag.
    #[error("unsupported function type: {type_tag}")]
    UnsupportedFunctionType {
        /// The unrecognized type tag.
        type_tag: String,
    },

    /// The invocation target could not be resolved to callable code.
    #[error("error loading function {target}: {reason}")]
    Load {
        /// The target that failed to resolve.
        target: String,
        /// Why it failed.
        reason: String,
    },

    /// The underlying callable or remote call failed.
    #[error("error executing function: {message}")]
    Execution {
        /// The failure text from the callable or transport.
        message: String,
    },

    /// A value violates the schema the function declared for it.
    #[error("{context} validation failed at {path}: {message}")]
    Validation {
        /// Whether the input or the output was rejected.
        context: SchemaContext,
        /// Location of the violation, `root` for the value itself.
        path: String,
        /// The validator's message.
        message: String,
    },

    /// A referenced function, job, or collection does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// What was looked up.
        kind: RecordKind,
        /// The unknown identifier.
        id: u64,
    },

    /// The batch driver itself failed outside any single job.
    #[error("background task error: {message}")]
    SystemicBatch {
        /// Description of the systemic cause.
        message: String,
    },

    /// A raw input payload or call parameter was malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A declared schema is not a valid JSON Schema document.
    #[error("invalid {context} schema: {message}")]
    InvalidSchema {
        /// Which schema was rejected.
        context: SchemaContext,
        /// Why the schema does not compile.
        message: String,
    },

    /// A job transition outside the lifecycle state machine was attempted.
    #[error("invalid transition from {from} to {to} for job {job_id}")]
    InvalidTransition {
        /// The job being transitioned.
        job_id: JobId,
        /// Its current status.
        from: JobStatus,
        /// The rejected target status.
        to: JobStatus,
    },

    /// A record changed between read and write.
    #[error("concurrent modification of {key}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        /// Storage key of the record.
        key: String,
        /// Version the writer read.
        expected: u64,
        /// Version found at write time.
        actual: u64,
    },

    /// Backend storage failure.
    #[error("store error: {0}")]
    Store(String),

    /// Configuration could not be loaded or is out of range.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias used throughout the crate.
pub type Result<T, E = FunctionError> = std::result::Result<T, E>;

impl FunctionError {
    /// Shorthand for an [`Execution`](Self::Execution) error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }

    /// Shorthand for a [`Load`](Self::Load) error.
    pub fn load(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Load {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`NotFound`](Self::NotFound) error.
    pub fn not_found(kind: RecordKind, id: impl Into<u64>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Classifies this error for the failure detail recorded on a job.
    ///
    /// Errors that never end up on a job (lookups, configuration, storage)
    /// classify as [`FailureKind::Systemic`].
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation { .. } => FailureKind::Validation,
            Self::Load { .. } => FailureKind::Load,
            Self::Execution { .. } => FailureKind::Execution,
            Self::UnsupportedFunctionType { .. } => FailureKind::UnsupportedType,
            Self::NotFound { .. }
            | Self::SystemicBatch { .. }
            | Self::InvalidInput(_)
            | Self::InvalidSchema { .. }
            | Self::InvalidTransition { .. }
            | Self::ConcurrentModification { .. }
            | Self::Store(_)
            | Self::Config(_) => FailureKind::Systemic,
        }
    }

    /// Returns `true` if the error is the caller's fault rather than the engine's.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::UnsupportedFunctionType { .. }
                | Self::InvalidInput(_)
                | Self::InvalidSchema { .. }
                | Self::Validation { .. }
        )
    }
}
