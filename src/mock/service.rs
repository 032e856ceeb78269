//! Mock Jobs Service Implementation
//!
//! In-process fake of the remote jobs API. It answers the versioned GET/POST
//! calls a [`crate::transport::Transport`] issues and reproduces the quirks
//! the client has to cope with:
//!
//! - a missing job is reported as `400 INVALID_PARAMETER_VALUE` with the text
//!   `Job {id} does not exist.` instead of a 404
//! - the legacy protocol refuses multi-task settings
//! - multi-task reads come back with tasks in a different order than written
//! - runs move through scripted lifecycle progressions, one step per
//!   `runs/get`

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use jobctl_protocol::{
    ApiError, ApiVersion, CancelRunRequest, JobId, JobIdRequest, JobList, JobRunsList,
    JobSettings, LifeCycleState, RunId, RunParameters, UpdateJobRequest, FORMAT_MULTI_TASK,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use super::failure::{Endpoint, FailureConfig, FailureInjector};
use super::state::{MockJob, MockRun, MockState, RecordedCall};

/// Default page size of `runs/list`
const DEFAULT_RUNS_PAGE: usize = 25;

/// Behaviour knobs of the mock service
#[derive(Debug, Clone)]
struct MockOptions {
    /// States a new run goes through; the first is reported immediately
    new_run_progression: Vec<LifeCycleState>,
    /// States a run goes through after an accepted cancel
    cancel_progression: Vec<LifeCycleState>,
    /// Return multi-task task lists in reverse order
    reorder_tasks: bool,
    /// Page size when the request sets no limit
    runs_page_size: usize,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            new_run_progression: vec![LifeCycleState::Pending, LifeCycleState::Running],
            cancel_progression: vec![LifeCycleState::Terminating, LifeCycleState::Terminated],
            reorder_tasks: true,
            runs_page_size: DEFAULT_RUNS_PAGE,
        }
    }
}

/// Per-run overrides set by tests
#[derive(Debug, Default)]
struct Scripts {
    /// Progressions handed to the next runs started, in order
    next_runs: VecDeque<Vec<LifeCycleState>>,
    /// Runs that accept a cancel but never leave their state
    stuck_on_cancel: HashSet<RunId>,
}

/// Configurable in-process jobs service
#[derive(Clone, Default)]
pub struct MockJobsService {
    state: Arc<Mutex<MockState>>,
    failures: Arc<Mutex<FailureInjector>>,
    options: MockOptions,
    scripts: Arc<Mutex<Scripts>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn job_does_not_exist(job_id: JobId) -> ApiError {
    ApiError::invalid_parameter(format!("Job {job_id} does not exist."))
}

fn run_does_not_exist(run_id: RunId) -> ApiError {
    ApiError::not_found(format!("Run {run_id} does not exist."))
}

fn decode<T: DeserializeOwned>(body: &Value) -> Result<T, ApiError> {
    serde_json::from_value(body.clone())
        .map_err(|e| ApiError::invalid_parameter(format!("malformed request: {e}")))
}

fn query_param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn query_id(query: &[(String, String)], key: &str) -> Result<Option<i64>, ApiError> {
    match query_param(query, key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<i64>()
            .map(Some)
            .map_err(|_| ApiError::invalid_parameter(format!("{key} must be an integer, got {raw:?}"))),
    }
}

fn query_flag(query: &[(String, String)], key: &str) -> bool {
    query_param(query, key) == Some("true")
}

fn query_to_value(query: &[(String, String)]) -> Value {
    let map: Map<String, Value> = query
        .iter()
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect();
    Value::Object(map)
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::new(500, "INTERNAL_ERROR", e.to_string()))
}

impl MockJobsService {
    /// Create a new service with default options
    pub fn new() -> Self {
        Self::default()
    }

    // === Public API for test configuration ===

    /// Store a job directly, bypassing the API
    pub fn seed_job(&self, settings: JobSettings) -> JobId {
        let mut state = lock(&self.state);
        let job_id = state.allocate_job_id();
        let multi_task = settings.is_multi_task();
        state
            .jobs
            .insert(job_id, MockJob::new(job_id, settings, multi_task));
        job_id
    }

    /// Store a run of a job directly in the given state
    pub fn seed_run(&self, job_id: JobId, initial: LifeCycleState) -> RunId {
        let mut state = lock(&self.state);
        let run_id = state.allocate_run_id();
        let number = state.next_number_in_job(job_id);
        state
            .runs
            .insert(run_id, MockRun::new(run_id, job_id, number, initial));
        run_id
    }

    /// Replace the states a run will report on its next polls
    pub fn script_run(&self, run_id: RunId, upcoming: Vec<LifeCycleState>) {
        if let Some(run) = lock(&self.state).runs.get_mut(&run_id) {
            run.upcoming = upcoming.into();
        }
    }

    /// Progression for the next run started through `run-now`
    pub fn script_next_run(&self, progression: Vec<LifeCycleState>) {
        lock(&self.scripts).next_runs.push_back(progression);
    }

    /// Accept cancels of this run without ever terminating it
    pub fn hold_on_cancel(&self, run_id: RunId) {
        lock(&self.scripts).stuck_on_cancel.insert(run_id);
    }

    /// Inject a failure for an endpoint
    pub fn inject_failure(&self, endpoint: Endpoint, config: FailureConfig) {
        lock(&self.failures).inject(endpoint, config);
    }

    /// Inject an error returned by every call to an endpoint
    pub fn inject_error(&self, endpoint: Endpoint, error: ApiError) {
        self.inject_failure(endpoint, FailureConfig::error(error));
    }

    /// Remove a job behind the client's back
    pub fn remove_job(&self, job_id: JobId) {
        let mut state = lock(&self.state);
        state.jobs.remove(&job_id);
        state.runs.retain(|_, run| run.job_id != job_id);
    }

    // === Inspection ===

    /// Every request received, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.state).calls.clone()
    }

    /// Endpoints hit, in order
    pub fn endpoints_called(&self) -> Vec<Endpoint> {
        lock(&self.state).calls.iter().map(|c| c.endpoint).collect()
    }

    /// Number of requests to one endpoint
    pub fn call_count(&self, endpoint: Endpoint) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| c.endpoint == endpoint)
            .count()
    }

    /// Settings as stored, without any read-side reordering
    pub fn job_settings(&self, job_id: JobId) -> Option<JobSettings> {
        lock(&self.state)
            .jobs
            .get(&job_id)
            .map(|job| job.settings.clone())
    }

    pub fn job_exists(&self, job_id: JobId) -> bool {
        lock(&self.state).jobs.contains_key(&job_id)
    }

    /// Current lifecycle of a run, without advancing it
    pub fn run_state(&self, run_id: RunId) -> Option<LifeCycleState> {
        lock(&self.state)
            .runs
            .get(&run_id)
            .map(|run| run.state.life_cycle_state)
    }

    /// Ids of a job's non-terminal runs, newest first
    pub fn active_run_ids(&self, job_id: JobId) -> Vec<RunId> {
        lock(&self.state)
            .active_runs(job_id)
            .iter()
            .map(|run| run.run_id)
            .collect()
    }

    // === Request handling ===

    /// Handle a GET request
    pub fn handle_get(
        &self,
        version: ApiVersion,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let endpoint = Endpoint::for_get(path)
            .ok_or_else(|| ApiError::new(404, "ENDPOINT_NOT_FOUND", format!("no GET handler for {path}")))?;
        self.admit(endpoint, version, query_to_value(query))?;

        match endpoint {
            Endpoint::ListJobs => self.list_jobs(version),
            Endpoint::GetJob => {
                let job_id = query_id(query, "job_id")?
                    .ok_or_else(|| ApiError::invalid_parameter("job_id is required"))?;
                self.get_job(version, JobId(job_id))
            }
            Endpoint::ListRuns => self.list_runs(query),
            Endpoint::GetRun => {
                let run_id = query_id(query, "run_id")?
                    .ok_or_else(|| ApiError::invalid_parameter("run_id is required"))?;
                self.get_run(RunId(run_id))
            }
            _ => Err(ApiError::new(405, "METHOD_NOT_ALLOWED", path)),
        }
    }

    /// Handle a POST request
    pub fn handle_post(
        &self,
        version: ApiVersion,
        path: &str,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let endpoint = Endpoint::for_post(path)
            .ok_or_else(|| ApiError::new(404, "ENDPOINT_NOT_FOUND", format!("no POST handler for {path}")))?;
        self.admit(endpoint, version, body.clone())?;

        match endpoint {
            Endpoint::CreateJob => self.create_job(version, decode(body)?),
            Endpoint::ResetJob => self.reset_job(version, decode(body)?),
            Endpoint::DeleteJob => self.delete_job(decode(body)?),
            Endpoint::RunNow => self.run_now(decode(body)?),
            Endpoint::CancelRun => self.cancel_run(decode(body)?),
            _ => Err(ApiError::new(405, "METHOD_NOT_ALLOWED", path)),
        }
    }

    /// Record the call, then apply any injected failure
    fn admit(&self, endpoint: Endpoint, version: ApiVersion, payload: Value) -> Result<(), ApiError> {
        lock(&self.state).calls.push(RecordedCall {
            endpoint,
            version,
            payload,
        });
        match lock(&self.failures).check(endpoint) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn render_job(&self, version: ApiVersion, job: &MockJob) -> Result<Value, ApiError> {
        if job.multi_task && version == ApiVersion::Legacy {
            return Err(ApiError::invalid_parameter(format!(
                "Job {} is in {} format and must be read with API 2.1",
                job.job_id, FORMAT_MULTI_TASK
            )));
        }

        let mut rendered = job.to_job();
        if version == ApiVersion::MultiTask {
            if let Some(settings) = rendered.settings.as_mut() {
                settings.format = Some(FORMAT_MULTI_TASK.to_string());
                if self.options.reorder_tasks {
                    settings.tasks.reverse();
                }
            }
        }
        to_value(&rendered)
    }

    fn list_jobs(&self, version: ApiVersion) -> Result<Value, ApiError> {
        let jobs: Vec<MockJob> = lock(&self.state).jobs.values().cloned().collect();
        let mut list = JobList::default();
        for job in jobs.iter().filter(|j| version == ApiVersion::MultiTask || !j.multi_task) {
            list.jobs.push(serde_json::from_value(self.render_job(version, job)?).map_err(
                |e| ApiError::new(500, "INTERNAL_ERROR", e.to_string()),
            )?);
        }
        to_value(&list)
    }

    fn get_job(&self, version: ApiVersion, job_id: JobId) -> Result<Value, ApiError> {
        let job = lock(&self.state)
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| job_does_not_exist(job_id))?;
        self.render_job(version, &job)
    }

    fn create_job(&self, version: ApiVersion, settings: JobSettings) -> Result<Value, ApiError> {
        if version == ApiVersion::Legacy && !settings.tasks.is_empty() {
            return Err(ApiError::invalid_parameter(
                "Tasks are not supported by API 2.0, use API 2.1",
            ));
        }
        let mut state = lock(&self.state);
        let job_id = state.allocate_job_id();
        let multi_task = version == ApiVersion::MultiTask;
        state
            .jobs
            .insert(job_id, MockJob::new(job_id, settings, multi_task));
        Ok(json!({ "job_id": job_id }))
    }

    fn reset_job(&self, version: ApiVersion, request: UpdateJobRequest) -> Result<Value, ApiError> {
        if version == ApiVersion::Legacy && !request.new_settings.tasks.is_empty() {
            return Err(ApiError::invalid_parameter(
                "Tasks are not supported by API 2.0, use API 2.1",
            ));
        }
        let mut state = lock(&self.state);
        let job = state
            .jobs
            .get_mut(&request.job_id)
            .ok_or_else(|| job_does_not_exist(request.job_id))?;
        job.multi_task = version == ApiVersion::MultiTask;
        job.settings = request.new_settings;
        Ok(json!({}))
    }

    fn delete_job(&self, request: JobIdRequest) -> Result<Value, ApiError> {
        let mut state = lock(&self.state);
        if state.jobs.remove(&request.job_id).is_none() {
            return Err(job_does_not_exist(request.job_id));
        }
        state.runs.retain(|_, run| run.job_id != request.job_id);
        Ok(json!({}))
    }

    fn run_now(&self, params: RunParameters) -> Result<Value, ApiError> {
        let job_id = params
            .job_id
            .ok_or_else(|| ApiError::invalid_parameter("job_id is required"))?;

        let progression = lock(&self.scripts)
            .next_runs
            .pop_front()
            .unwrap_or_else(|| self.options.new_run_progression.clone());
        let mut progression: VecDeque<LifeCycleState> = progression.into();
        let initial = progression.pop_front().unwrap_or(LifeCycleState::Pending);

        let mut state = lock(&self.state);
        if !state.jobs.contains_key(&job_id) {
            return Err(job_does_not_exist(job_id));
        }
        let run_id = state.allocate_run_id();
        let number = state.next_number_in_job(job_id);
        let mut run = MockRun::new(run_id, job_id, number, initial);
        run.upcoming = progression;
        state.runs.insert(run_id, run);

        Ok(json!({ "run_id": run_id, "number_in_job": number }))
    }

    fn get_run(&self, run_id: RunId) -> Result<Value, ApiError> {
        let mut state = lock(&self.state);
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| run_does_not_exist(run_id))?;
        run.advance();
        to_value(&run.to_run())
    }

    fn list_runs(&self, query: &[(String, String)]) -> Result<Value, ApiError> {
        let job_id = query_id(query, "job_id")?.map(JobId);
        let active_only = query_flag(query, "active_only");
        let completed_only = query_flag(query, "completed_only");
        if active_only && completed_only {
            return Err(ApiError::invalid_parameter(
                "active_only and completed_only cannot both be true",
            ));
        }
        let offset = query_id(query, "offset")?.unwrap_or(0).max(0) as usize;
        let limit = match query_id(query, "limit")? {
            Some(limit) if limit > 0 => limit as usize,
            _ => self.options.runs_page_size,
        };

        let state = lock(&self.state);
        let matching: Vec<&MockRun> = state
            .runs
            .values()
            .rev()
            .filter(|run| job_id.map_or(true, |id| run.job_id == id))
            .filter(|run| {
                let terminal = run.state.life_cycle_state.is_terminal();
                !(active_only && terminal) && !(completed_only && !terminal)
            })
            .collect();

        let page = JobRunsList {
            runs: matching
                .iter()
                .skip(offset)
                .take(limit)
                .map(|run| run.to_run())
                .collect(),
            has_more: offset + limit < matching.len(),
        };
        to_value(&page)
    }

    fn cancel_run(&self, request: CancelRunRequest) -> Result<Value, ApiError> {
        let stuck = lock(&self.scripts).stuck_on_cancel.contains(&request.run_id);
        let cancel_progression = self.options.cancel_progression.clone();

        let mut state = lock(&self.state);
        let run = state
            .runs
            .get_mut(&request.run_id)
            .ok_or_else(|| run_does_not_exist(request.run_id))?;
        if run.state.life_cycle_state.is_terminal() {
            return Ok(json!({}));
        }

        run.cancel_requested = true;
        run.upcoming = if stuck {
            VecDeque::new()
        } else {
            cancel_progression.into()
        };
        Ok(json!({}))
    }
}
