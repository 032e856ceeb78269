//! Starting and cancelling runs, with confirmation.

use std::time::Duration;

use jobctl_protocol::{JobId, JobRun, LifeCycleState, RunId, RunParameters};

use crate::api::JobsApi;
use crate::error::{JobError, JobResult};
use crate::poll::RunStatePoller;

/// Run operations composed with the poller
#[derive(Clone)]
pub struct RunController {
    api: JobsApi,
    poller: RunStatePoller,
}

impl RunController {
    pub fn new(api: JobsApi, poller: RunStatePoller) -> Self {
        Self { api, poller }
    }

    pub fn api(&self) -> &JobsApi {
        &self.api
    }

    /// Start a run of `job_id` without overrides
    pub fn trigger_run(&self, job_id: JobId) -> JobResult<RunId> {
        self.trigger_run_with(&RunParameters::for_job(job_id))
    }

    /// Start a run with parameter overrides; returns the new run id
    pub fn trigger_run_with(&self, params: &RunParameters) -> JobResult<RunId> {
        let job_id = params.job_id.unwrap_or_default();
        let run_id = self
            .api
            .run_now(params)
            .map_err(|e| JobError::StartFailed {
                job_id,
                source: Box::new(e.into()),
            })?;
        tracing::info!(%job_id, %run_id, "run triggered");
        Ok(run_id)
    }

    /// Request cancellation, then wait for the run to terminate.
    ///
    /// A rejected cancel surfaces as a transport error; an accepted cancel
    /// that never lands within `deadline` surfaces as a timeout.
    pub fn cancel_run(&self, run_id: RunId, deadline: Duration) -> JobResult<JobRun> {
        self.api.runs_cancel(run_id)?;
        tracing::info!(%run_id, "cancel requested");
        self.poller
            .wait_for_state(&self.api, run_id, LifeCycleState::Terminated, deadline)
    }

    /// Start a run and wait until it is actually running
    pub fn start_and_confirm(&self, job_id: JobId, deadline: Duration) -> JobResult<RunId> {
        let run_id = self.trigger_run(job_id)?;
        self.poller
            .wait_for_state(&self.api, run_id, LifeCycleState::Running, deadline)?;
        tracing::info!(%job_id, %run_id, "run confirmed running");
        Ok(run_id)
    }
}
