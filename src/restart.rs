//! Restarting a job so it keeps exactly one active run.
//!
//! Cancel is requested and confirmed terminated before the replacement is
//! started. The active-run listing is a snapshot: another actor starting a
//! run concurrently is not guarded against and shows up as an ordinary
//! cancel or start failure.

use std::time::Duration;

use jobctl_protocol::{JobId, RunId};
use serde::Serialize;

use crate::error::{JobError, JobResult};
use crate::runs::RunController;

/// What a restart did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RestartOutcome {
    /// Run that was cancelled, if one was active
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<RunId>,
    /// Run started and confirmed running
    pub started: RunId,
}

/// Restart protocol for always-running jobs
#[derive(Clone)]
pub struct RestartOrchestrator {
    runs: RunController,
}

impl RestartOrchestrator {
    pub fn new(runs: RunController) -> Self {
        Self { runs }
    }

    /// Make `job_id` have exactly one fresh active run.
    ///
    /// `deadline` bounds the cancel confirmation and the start confirmation
    /// separately.
    pub fn restart(&self, job_id: JobId, deadline: Duration) -> JobResult<RestartOutcome> {
        let active = self.runs.api().active_runs(job_id)?;
        tracing::debug!(%job_id, active = active.len(), "active runs listed");

        let cancelled = match active.as_slice() {
            [] => None,
            [run] => {
                let run_id = run.run_id;
                self.runs
                    .cancel_run(run_id, deadline)
                    .map_err(|e| JobError::CancelFailed {
                        run_id,
                        source: Box::new(e),
                    })?;
                Some(run_id)
            }
            runs => {
                return Err(JobError::PreconditionViolation(format!(
                    "`always_running` must be specified only with `max_concurrent_runs = 1`. There are {} active runs",
                    runs.len()
                )));
            }
        };

        let started = self.runs.start_and_confirm(job_id, deadline)?;
        tracing::info!(%job_id, cancelled = ?cancelled, %started, "job restarted");
        Ok(RestartOutcome { cancelled, started })
    }
}
