//! Mock Jobs Service State Management
//!
//! Manages jobs, runs and the call log for the mock service.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use jobctl_protocol::{
    ApiVersion, Job, JobId, JobRun, JobSettings, LifeCycleState, ResultState, RunId, RunState,
};
use serde_json::Value;

use super::failure::Endpoint;

/// A job stored by the mock service
#[derive(Debug, Clone)]
pub struct MockJob {
    pub job_id: JobId,
    /// Settings exactly as last written
    pub settings: JobSettings,
    /// Whether the job was written in the multi-task shape
    pub multi_task: bool,
    pub created_at: DateTime<Utc>,
}

impl MockJob {
    pub fn new(job_id: JobId, settings: JobSettings, multi_task: bool) -> Self {
        Self {
            job_id,
            settings,
            multi_task,
            created_at: Utc::now(),
        }
    }

    /// Wire representation of the job
    pub fn to_job(&self) -> Job {
        Job {
            job_id: self.job_id,
            creator_user_name: Some("mock@example.com".to_string()),
            settings: Some(self.settings.clone()),
            created_time: Some(self.created_at.timestamp_millis()),
        }
    }
}

/// A run tracked by the mock service
///
/// `upcoming` holds the lifecycle states the run will report on successive
/// `runs/get` calls; once drained the run stays in its current state.
#[derive(Debug, Clone)]
pub struct MockRun {
    pub run_id: RunId,
    pub job_id: JobId,
    pub number_in_job: i64,
    pub started_at: DateTime<Utc>,
    pub state: RunState,
    pub upcoming: VecDeque<LifeCycleState>,
    pub cancel_requested: bool,
    /// State history for debugging
    pub state_history: Vec<(LifeCycleState, DateTime<Utc>)>,
}

impl MockRun {
    /// Create a new run in the given state
    pub fn new(run_id: RunId, job_id: JobId, number_in_job: i64, initial: LifeCycleState) -> Self {
        let now = Utc::now();
        let mut run = Self {
            run_id,
            job_id,
            number_in_job,
            started_at: now,
            state: RunState::default(),
            upcoming: VecDeque::new(),
            cancel_requested: false,
            state_history: Vec::new(),
        };
        run.transition(initial);
        run
    }

    /// Move to a new lifecycle state, filling in the result when terminal
    pub fn transition(&mut self, next: LifeCycleState) {
        if self.state.life_cycle_state.is_terminal() {
            return;
        }
        self.state.life_cycle_state = next;
        self.state_history.push((next, Utc::now()));

        let (result, message) = match next {
            LifeCycleState::Terminated if self.cancel_requested => {
                (Some(ResultState::Canceled), "Run cancelled.")
            }
            LifeCycleState::Terminated => (Some(ResultState::Success), ""),
            LifeCycleState::InternalError => (None, "Run failed with an internal error."),
            LifeCycleState::Skipped => (None, "Run skipped."),
            LifeCycleState::Pending => (None, "Waiting for cluster."),
            LifeCycleState::Terminating if self.cancel_requested => (None, "Cancelling."),
            _ => (None, ""),
        };
        self.state.result_state = result;
        self.state.state_message = message.to_string();
    }

    /// Report the next scripted state, if any
    pub fn advance(&mut self) {
        if let Some(next) = self.upcoming.pop_front() {
            self.transition(next);
        }
    }

    /// Wire representation of the run
    pub fn to_run(&self) -> JobRun {
        JobRun {
            job_id: self.job_id,
            run_id: self.run_id,
            number_in_job: self.number_in_job,
            start_time: Some(self.started_at.timestamp_millis()),
            state: self.state.clone(),
            trigger: Some("ONE_TIME".to_string()),
            run_type: Some("JOB_RUN".to_string()),
            overriding_parameters: None,
        }
    }
}

/// A request the mock service received
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: Endpoint,
    pub version: ApiVersion,
    /// POST body or GET query as an object
    pub payload: Value,
}

/// Mock service state container
#[derive(Debug)]
pub struct MockState {
    /// Jobs by id
    pub jobs: BTreeMap<JobId, MockJob>,
    /// Runs by id
    pub runs: BTreeMap<RunId, MockRun>,
    /// Every request in arrival order
    pub calls: Vec<RecordedCall>,
    next_job_id: i64,
    next_run_id: i64,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            jobs: BTreeMap::new(),
            runs: BTreeMap::new(),
            calls: Vec::new(),
            next_job_id: 100,
            next_run_id: 1000,
        }
    }
}

impl MockState {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_job_id(&mut self) -> JobId {
        self.next_job_id += 1;
        JobId(self.next_job_id)
    }

    pub fn allocate_run_id(&mut self) -> RunId {
        self.next_run_id += 1;
        RunId(self.next_run_id)
    }

    /// Next run number for a job (1-based)
    pub fn next_number_in_job(&self, job_id: JobId) -> i64 {
        self.runs.values().filter(|r| r.job_id == job_id).count() as i64 + 1
    }

    /// Runs of a job that are not terminal, newest first
    pub fn active_runs(&self, job_id: JobId) -> Vec<&MockRun> {
        self.runs
            .values()
            .rev()
            .filter(|r| r.job_id == job_id && r.state.life_cycle_state.is_active())
            .collect()
    }
}
