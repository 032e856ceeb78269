//! Waiting for a run to reach a lifecycle state.
//!
//! [`RunStatePoller::wait_for_state`] is the only place that decides whether
//! a run got where it was asked to go. Outcomes per poll:
//!
//! - status fetch fails: give up at once with `RunStatusUnavailable`
//! - desired state: done
//! - `INTERNAL_ERROR`: give up at once with `TerminalRunFailure`
//! - anything else: sleep with backoff and poll again until the deadline
//!
//! The transport below retries transient network failures itself, so a
//! failed fetch here is never retried.

use std::sync::Arc;
use std::time::Duration;

use jobctl_protocol::{JobRun, LifeCycleState, RunId};

use crate::api::JobsApi;
use crate::clock::{Clock, SystemClock};
use crate::error::{JobError, JobResult};
use crate::signal::CancelFlag;

/// Longest uninterrupted sleep; bounds how late an operator interrupt is seen.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Poll interval settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Interval after the first poll
    pub initial_interval: Duration,
    /// Backoff cap
    pub max_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(10),
        }
    }
}

impl PollConfig {
    /// Delay after poll number `attempt` (1-based): doubles, capped
    pub fn interval(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }
}

/// Deadline-bounded run state poller
#[derive(Clone)]
pub struct RunStatePoller {
    clock: Arc<dyn Clock>,
    config: PollConfig,
    cancel: CancelFlag,
}

impl RunStatePoller {
    pub fn new(config: PollConfig) -> Self {
        Self {
            clock: Arc::new(SystemClock),
            config,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> PollConfig {
        self.config
    }

    /// Poll `run_id` until it reports `desired`, fails, or `deadline` passes.
    pub fn wait_for_state(
        &self,
        api: &JobsApi,
        run_id: RunId,
        desired: LifeCycleState,
        deadline: Duration,
    ) -> JobResult<JobRun> {
        let started = self.clock.now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return Err(JobError::Interrupted { run_id, desired });
            }

            let run = api
                .runs_get(run_id)
                .map_err(|source| JobError::RunStatusUnavailable {
                    run_id,
                    desired,
                    source,
                })?;
            let current = run.state.life_cycle_state;

            if current == desired {
                tracing::debug!(%run_id, lifecycle = %current, attempt, "run reached desired state");
                return Ok(run);
            }
            if current == LifeCycleState::InternalError {
                return Err(JobError::TerminalRunFailure {
                    run_id,
                    desired,
                    message: run.state.state_message,
                });
            }

            let waited = self.clock.now().saturating_duration_since(started);
            if waited >= deadline {
                return Err(JobError::Timeout {
                    run_id,
                    desired,
                    last_state: current,
                    message: run.state.state_message,
                    waited,
                });
            }

            let delay = self.config.interval(attempt).min(deadline - waited);
            tracing::debug!(
                %run_id,
                lifecycle = %current,
                desired = %desired,
                attempt,
                ?delay,
                message = %run.state.state_message,
                "run not yet in desired state"
            );
            if !self.sleep_unless_cancelled(delay) {
                return Err(JobError::Interrupted { run_id, desired });
            }
        }
    }

    /// Sleep in short slices; false if interrupted
    fn sleep_unless_cancelled(&self, total: Duration) -> bool {
        let mut remaining = total;
        while !remaining.is_zero() {
            if self.cancel.is_cancelled() {
                return false;
            }
            let slice = remaining.min(CANCEL_CHECK_INTERVAL);
            self.clock.sleep(slice);
            remaining -= slice;
        }
        !self.cancel.is_cancelled()
    }
}
