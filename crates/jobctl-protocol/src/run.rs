//! Job runs: one execution of a job and its lifecycle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::job::{JobId, ParseIdError};

/// Identifier of one execution of a job. Never reused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(RunId)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

/// Lifecycle of a run.
///
/// Moves forward only: once a run is `TERMINATED`, `SKIPPED` or
/// `INTERNAL_ERROR` it stays there.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifeCycleState {
    Queued,
    Pending,
    Running,
    Blocked,
    WaitingForRetry,
    Terminating,
    Terminated,
    Skipped,
    InternalError,
    /// A state this client does not know about (or none reported yet).
    #[default]
    #[serde(other)]
    Unknown,
}

impl LifeCycleState {
    /// Whether the run can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifeCycleState::Terminated | LifeCycleState::Skipped | LifeCycleState::InternalError
        )
    }

    /// Whether the run counts toward the job's active runs.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifeCycleState::Queued => "QUEUED",
            LifeCycleState::Pending => "PENDING",
            LifeCycleState::Running => "RUNNING",
            LifeCycleState::Blocked => "BLOCKED",
            LifeCycleState::WaitingForRetry => "WAITING_FOR_RETRY",
            LifeCycleState::Terminating => "TERMINATING",
            LifeCycleState::Terminated => "TERMINATED",
            LifeCycleState::Skipped => "SKIPPED",
            LifeCycleState::InternalError => "INTERNAL_ERROR",
            LifeCycleState::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LifeCycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a terminal run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultState {
    Success,
    Failed,
    Timedout,
    Canceled,
    #[serde(other)]
    Unknown,
}

/// State of a run as reported by the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    #[serde(default)]
    pub life_cycle_state: LifeCycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_state: Option<ResultState>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub state_message: String,
}

impl RunState {
    pub fn new(life_cycle_state: LifeCycleState) -> Self {
        Self {
            life_cycle_state,
            ..Default::default()
        }
    }
}

/// Parameter overrides for one run; also the body of `/jobs/run-now`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notebook_params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jar_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub python_params: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub spark_submit_params: Vec<String>,
}

impl RunParameters {
    /// Run-now body for a job without overrides.
    pub fn for_job(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            ..Default::default()
        }
    }
}

/// A run of a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRun {
    #[serde(default)]
    pub job_id: JobId,
    #[serde(default)]
    pub run_id: RunId,
    #[serde(default)]
    pub number_in_job: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overriding_parameters: Option<RunParameters>,
}

/// Query of `/jobs/runs/list`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobRunsListRequest {
    pub job_id: Option<JobId>,
    pub active_only: bool,
    pub completed_only: bool,
    pub offset: u32,
    pub limit: u32,
}

impl JobRunsListRequest {
    /// Active runs of one job, first page.
    pub fn active(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            active_only: true,
            ..Default::default()
        }
    }

    /// Query parameters, omitting unset ones.
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if let Some(job_id) = self.job_id {
            query.push(("job_id".to_string(), job_id.to_string()));
        }
        if self.active_only {
            query.push(("active_only".to_string(), "true".to_string()));
        }
        if self.completed_only {
            query.push(("completed_only".to_string(), "true".to_string()));
        }
        if self.offset > 0 {
            query.push(("offset".to_string(), self.offset.to_string()));
        }
        if self.limit > 0 {
            query.push(("limit".to_string(), self.limit.to_string()));
        }
        query
    }
}

/// One page of runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunsList {
    #[serde(default)]
    pub runs: Vec<JobRun>,
    #[serde(default)]
    pub has_more: bool,
}

/// Body of `/jobs/runs/cancel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelRunRequest {
    pub run_id: RunId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_terminal_states() {
        assert!(LifeCycleState::Terminated.is_terminal());
        assert!(LifeCycleState::Skipped.is_terminal());
        assert!(LifeCycleState::InternalError.is_terminal());
        assert!(LifeCycleState::Pending.is_active());
        assert!(LifeCycleState::Terminating.is_active());
        assert!(LifeCycleState::Running.is_active());
    }

    #[test]
    fn test_unknown_lifecycle_tolerated() {
        let state: RunState =
            serde_json::from_value(json!({"life_cycle_state": "SOMETHING_NEW"})).unwrap();
        assert_eq!(state.life_cycle_state, LifeCycleState::Unknown);
    }

    #[test]
    fn test_run_decodes() {
        let run: JobRun = serde_json::from_value(json!({
            "job_id": 11,
            "run_id": 42,
            "number_in_job": 3,
            "state": {
                "life_cycle_state": "TERMINATED",
                "result_state": "CANCELED",
                "state_message": "Run cancelled."
            },
            "trigger": "ONE_TIME"
        }))
        .unwrap();
        assert_eq!(run.run_id, RunId(42));
        assert_eq!(run.state.life_cycle_state, LifeCycleState::Terminated);
        assert_eq!(run.state.result_state, Some(ResultState::Canceled));
    }

    #[test]
    fn test_runs_list_query() {
        let mut request = JobRunsListRequest::active(JobId(7));
        request.offset = 25;
        request.limit = 25;
        assert_eq!(
            request.to_query(),
            vec![
                ("job_id".to_string(), "7".to_string()),
                ("active_only".to_string(), "true".to_string()),
                ("offset".to_string(), "25".to_string()),
                ("limit".to_string(), "25".to_string()),
            ]
        );
    }

    #[test]
    fn test_run_now_body() {
        assert_eq!(
            serde_json::to_value(RunParameters::for_job(JobId(3))).unwrap(),
            json!({"job_id": 3})
        );
    }
}
