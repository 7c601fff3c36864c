//! Jobs and the job lifecycle state machine.
//!
//! # State Machine
//!
//! ```text
//! Pending -> Running, Failed
//! Running -> Completed, Failed
//! Completed -> (terminal, no transitions)
//! Failed -> (terminal, no transitions)
//! ```
//!
//! `Pending -> Failed` is the input-validation short circuit and the
//! systemic force-fail of a batch; a job that never started never reports
//! `Running`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::{FunctionId, JobId};
use crate::error::FunctionError;

/// Job lifecycle status.
///
/// # Examples
///
/// ```
/// use fnstore::JobStatus;
///
/// assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
/// assert!(JobStatus::Pending.can_transition_to(JobStatus::Failed));
/// assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
/// assert!(!JobStatus::Completed.can_transition_to(JobStatus::Failed));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Created, not yet handed to an executor.
    Pending,
    /// An executor is working on it.
    Running,
    /// Finished with an output (terminal).
    Completed,
    /// Finished with a failure detail (terminal).
    Failed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = FunctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            other => Err(FunctionError::InvalidInput(format!(
                "unknown job status: {other}"
            ))),
        }
    }
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 4] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Failed,
    ];

    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns `true` if moving from this status to `next` is allowed.
    ///
    /// Self-transitions are rejected.
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Pending => matches!(next, Self::Running | Self::Failed),
            Self::Running => matches!(next, Self::Completed | Self::Failed),
            Self::Completed | Self::Failed => false,
        }
    }

    /// Validates a transition, returning
    /// [`FunctionError::InvalidTransition`] when it is not allowed.
    pub fn validate_transition(self, job_id: JobId, next: Self) -> Result<(), FunctionError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(FunctionError::InvalidTransition {
                job_id,
                from: self,
                to: next,
            })
        }
    }
}

/// Why a job failed.
///
/// Callers rely on this to tell "my input was invalid" apart from "the
/// function itself failed" and "this kind of function cannot run here".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Input or output violated the function's declared schema.
    Validation,
    /// The local code or symbol could not be resolved.
    Load,
    /// The callable raised or the remote call failed.
    Execution,
    /// No executor is registered for the function's type tag.
    UnsupportedType,
    /// The batch driver failed around the job.
    Systemic,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Load => write!(f, "load"),
            Self::Execution => write!(f, "execution"),
            Self::UnsupportedType => write!(f, "unsupported_type"),
            Self::Systemic => write!(f, "systemic"),
        }
    }
}

/// Failure information attached to a `Failed` job.
///
/// Serializes as `{"kind": "...", "error": "...", "path": "..."}`, with
/// `path` present only for validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    /// Failure classification.
    pub kind: FailureKind,

    /// Human-readable cause.
    pub error: String,

    /// Location of a schema violation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl FailureDetail {
    /// Creates a detail with no path.
    pub fn new(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            kind,
            error: error.into(),
            path: None,
        }
    }

    /// Detail for a batch-level failure that swept this job.
    pub fn systemic(error: impl Into<String>) -> Self {
        Self::new(FailureKind::Systemic, error)
    }

    /// Records `err` as a job failure, keeping the violation path of
    /// validation errors.
    ///
    /// ```
    /// use fnstore::error::SchemaContext;
    /// use fnstore::{FailureDetail, FailureKind, FunctionError};
    ///
    /// let detail = FailureDetail::from_error(&FunctionError::Validation {
    ///     context: SchemaContext::Input,
    ///     path: "x".to_string(),
    ///     message: "\"a\" is not of type \"number\"".to_string(),
    /// });
    /// assert_eq!(detail.kind, FailureKind::Validation);
    /// assert_eq!(detail.path.as_deref(), Some("x"));
    /// assert!(detail.error.starts_with("Input validation failed at x"));
    /// ```
    pub fn from_error(err: &FunctionError) -> Self {
        let path = match err {
            FunctionError::Validation { path, .. } => Some(path.clone()),
            _ => None,
        };
        Self {
            kind: err.kind(),
            error: err.to_string(),
            path,
        }
    }
}

/// Fields the lifecycle manager supplies when creating a job.
///
/// The store assigns the identity and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewJob {
    /// The function this job invokes.
    pub function_id: FunctionId,
    /// Initial status, `Pending` or `Failed`.
    pub status: JobStatus,
    /// The input value.
    pub input: Value,
    /// Set when the job is created already failed.
    pub failure: Option<FailureDetail>,
}

impl NewJob {
    /// A job waiting to run.
    pub fn pending(function_id: FunctionId, input: Value) -> Self {
        Self {
            function_id,
            status: JobStatus::Pending,
            input,
            failure: None,
        }
    }

    /// A job rejected before it could run.
    pub fn rejected(function_id: FunctionId, input: Value, failure: FailureDetail) -> Self {
        Self {
            function_id,
            status: JobStatus::Failed,
            input,
            failure: Some(failure),
        }
    }
}

/// One invocation of a function with a specific input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Store-assigned identity.
    pub id: JobId,

    /// The function this job invokes.
    pub function_id: FunctionId,

    /// Current lifecycle status.
    pub status: JobStatus,

    /// The input value.
    pub input: Value,

    /// `{"result": ...}`, set only when `Completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Set only when `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// When the job last changed.
    pub updated_at: DateTime<Utc>,

    /// Storage version for optimistic concurrency. Not serialized; the
    /// store fills it in on every read.
    #[serde(skip)]
    pub version: u64,
}

impl Job {
    /// Builds the stored form of `new` under `id`.
    pub fn from_new(id: JobId, new: NewJob, now: DateTime<Utc>) -> Self {
        Self {
            id,
            function_id: new.function_id,
            status: new.status,
            input: new.input,
            output: None,
            failure: new.failure,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Returns `true` once the job is `Completed` or `Failed`.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_display_matches_serde() {
        for status in JobStatus::ALL {
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                Value::String(status.to_string())
            );
        }
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("completed".parse::<JobStatus>().unwrap(), JobStatus::Completed);
        assert_eq!("RUNNING".parse::<JobStatus>().unwrap(), JobStatus::Running);
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn terminal_states_reject_everything() {
        for terminal in [JobStatus::Completed, JobStatus::Failed] {
            for target in JobStatus::ALL {
                assert!(!terminal.can_transition_to(target));
            }
        }
    }

    #[test]
    fn validate_transition_reports_both_ends() {
        let err = JobStatus::Completed
            .validate_transition(JobId::new(9), JobStatus::Running)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid transition from COMPLETED to RUNNING for job 9"
        );
    }

    #[test]
    fn failure_detail_omits_path_when_absent() {
        let detail = FailureDetail::from_error(&FunctionError::execution("boom"));
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["kind"], "execution");
        assert_eq!(json["error"], "error executing function: boom");
        assert!(json.get("path").is_none());
    }

    #[test]
    fn job_serialization_skips_version() {
        let mut job = Job::from_new(
            JobId::new(1),
            NewJob::pending(FunctionId::new(2), json!({"x": 1})),
            Utc::now(),
        );
        job.version = 7;
        let json = serde_json::to_value(&job).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["function_id"], 2);
        assert!(json.get("version").is_none());
        assert!(json.get("output").is_none());

        let back: Job = serde_json::from_value(json).unwrap();
        assert_eq!(back.version, 0);
    }
}
