//! Jobs API wire types
//!
//! Defines the JSON shapes exchanged with the remote jobs service for both
//! the legacy single-task protocol (2.0) and the multi-task protocol (2.1).

pub mod error;
pub mod job;
pub mod run;
pub mod settings;
pub mod task;
pub mod version;

pub use error::ApiError;
pub use job::{Job, JobId, JobIdRequest, JobList, ParseIdError, UpdateJobRequest};
pub use run::{
    CancelRunRequest, JobRun, JobRunsList, JobRunsListRequest, LifeCycleState, ResultState,
    RunId, RunParameters, RunState,
};
pub use settings::{
    ClusterSpec, ClusterSpecError, CronSchedule, EmailNotifications, JobSettings,
    JobTaskSettings, Library, TaskDependency, PAUSE_STATUSES,
};
pub use task::{
    ConflictingTaskTypes, NotebookTask, PipelineTask, PythonWheelTask, SparkJarTask,
    SparkPythonTask, SparkSubmitTask, TaskDescriptor, TaskKind, TaskSlot,
};
pub use version::ApiVersion;

/// Value of the `format` marker on multi-task job settings.
pub const FORMAT_MULTI_TASK: &str = "MULTI_TASK";

/// Value of the `format` marker on legacy job settings.
pub const FORMAT_SINGLE_TASK: &str = "SINGLE_TASK";

/// Name given to jobs whose settings omit one.
pub const DEFAULT_JOB_NAME: &str = "Untitled";

/// Remote endpoint paths (relative to the versioned API root).
pub mod paths {
    pub const JOBS_LIST: &str = "/jobs/list";
    pub const JOBS_CREATE: &str = "/jobs/create";
    pub const JOBS_GET: &str = "/jobs/get";
    pub const JOBS_RESET: &str = "/jobs/reset";
    pub const JOBS_DELETE: &str = "/jobs/delete";
    pub const RUN_NOW: &str = "/jobs/run-now";
    pub const RUNS_LIST: &str = "/jobs/runs/list";
    pub const RUNS_GET: &str = "/jobs/runs/get";
    pub const RUNS_CANCEL: &str = "/jobs/runs/cancel";
}
