//! Error taxonomy for job lifecycle operations
//!
//! Every error carries the identifiers needed to act on it (job id, run id,
//! last observed lifecycle state, backend message). Errors map to a
//! [`FailureKind`] which the CLI turns into its exit code.

use std::time::Duration;

use jobctl_protocol::{ApiError, JobId, LifeCycleState, ParseIdError, RunId};

use crate::transport::TransportError;

/// Errors surfaced by job and run operations.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {job_id} not found: {source}")]
    NotFound {
        job_id: JobId,
        /// Backend error, status normalized to 404.
        source: ApiError,
    },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("cannot get job {desired}: status of run {run_id} unavailable: {source}")]
    RunStatusUnavailable {
        run_id: RunId,
        desired: LifeCycleState,
        source: TransportError,
    },

    #[error("cannot get job {desired}: run {run_id} hit INTERNAL_ERROR: {message}")]
    TerminalRunFailure {
        run_id: RunId,
        desired: LifeCycleState,
        message: String,
    },

    #[error("timed out after {waited:?} waiting for run {run_id} to be {desired}: run is {last_state}: {message}")]
    Timeout {
        run_id: RunId,
        desired: LifeCycleState,
        last_state: LifeCycleState,
        message: String,
        waited: Duration,
    },

    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("cannot cancel run {run_id}: {source}")]
    CancelFailed { run_id: RunId, source: Box<JobError> },

    #[error("cannot start run of job {job_id}: {source}")]
    StartFailed { job_id: JobId, source: Box<JobError> },

    #[error("job {job_id} was created but did not start: {source}")]
    StartAfterCreate { job_id: JobId, source: Box<JobError> },

    #[error("interrupted while waiting for run {run_id} to be {desired}")]
    Interrupted { run_id: RunId, desired: LifeCycleState },

    #[error(transparent)]
    InvalidId(#[from] ParseIdError),

    #[error("invalid job settings: {0}")]
    InvalidSettings(String),
}

/// Failure kind for exit code mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Bad identifier or settings (exit code 2)
    Usage = 2,
    /// Job does not exist (exit code 4)
    NotFound = 4,
    /// Network or backend failure (exit code 20)
    Transport = 20,
    /// Run reached INTERNAL_ERROR (exit code 40)
    RunFailed = 40,
    /// Deadline exceeded while waiting on a run (exit code 50)
    Timeout = 50,
    /// Mode invariant violated (exit code 60)
    Precondition = 60,
    /// Wait interrupted by the operator (exit code 80)
    Interrupted = 80,
}

impl JobError {
    /// Map error to failure kind for exit code
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            JobError::NotFound { .. } => FailureKind::NotFound,
            JobError::Transport(_) => FailureKind::Transport,
            JobError::RunStatusUnavailable { .. } => FailureKind::Transport,
            JobError::TerminalRunFailure { .. } => FailureKind::RunFailed,
            JobError::Timeout { .. } => FailureKind::Timeout,
            JobError::PreconditionViolation(_) => FailureKind::Precondition,
            JobError::CancelFailed { source, .. } => source.failure_kind(),
            JobError::StartFailed { source, .. } => source.failure_kind(),
            JobError::StartAfterCreate { source, .. } => source.failure_kind(),
            JobError::Interrupted { .. } => FailureKind::Interrupted,
            JobError::InvalidId(_) => FailureKind::Usage,
            JobError::InvalidSettings(_) => FailureKind::Usage,
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        self.failure_kind() as i32
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, JobError::NotFound { .. })
    }

    /// Id of a job that exists remotely even though the operation failed.
    pub fn created_job_id(&self) -> Option<JobId> {
        match self {
            JobError::StartAfterCreate { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }
}

/// Result type for job operations
pub type JobResult<T> = Result<T, JobError>;
