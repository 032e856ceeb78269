//! Job resource lifecycle: create, read, update, delete.
//!
//! Every operation picks the API version from the settings it is given
//! (desired settings for writes, the last known settings for reads and
//! deletes). In always-running mode create starts a run and update
//! restarts the job once the settings are in place.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jobctl_protocol::{
    ApiVersion, ClusterSpec, Job, JobId, JobSettings, JobTaskSettings, DEFAULT_JOB_NAME,
    PAUSE_STATUSES,
};
use serde::{Deserialize, Serialize};

use crate::api::JobsApi;
use crate::error::{JobError, JobResult};
use crate::normalize::{fingerprint, normalize};
use crate::poll::RunStatePoller;
use crate::restart::{RestartOrchestrator, RestartOutcome};
use crate::runs::RunController;
use crate::transport::Transport;

/// Default create/update deadline (cluster provisioning can be slow)
pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Deadlines for waits inside lifecycle operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceTimeouts {
    pub create: Duration,
    pub update: Duration,
}

impl Default for ResourceTimeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_RESOURCE_TIMEOUT,
            update: DEFAULT_RESOURCE_TIMEOUT,
        }
    }
}

/// Desired state of a job resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResourceSpec {
    #[serde(default)]
    pub settings: JobSettings,
    /// Keep exactly one run active, restarting it on every update
    #[serde(default)]
    pub always_running: bool,
}

impl JobResourceSpec {
    pub fn new(settings: JobSettings) -> Self {
        Self {
            settings,
            always_running: false,
        }
    }

    pub fn always_running(mut self) -> Self {
        self.always_running = true;
        self
    }

    /// Settings with service defaults filled in and tasks normalized
    pub fn desired_settings(&self) -> JobSettings {
        let mut settings = normalize(self.settings.clone());
        if settings.name.is_empty() {
            settings.name = DEFAULT_JOB_NAME.to_string();
        }
        if settings.max_concurrent_runs.is_none() {
            settings.max_concurrent_runs = Some(1);
        }
        settings
    }
}

/// Check a desired resource before anything is sent.
pub fn validate(spec: &JobResourceSpec) -> JobResult<()> {
    let settings = &spec.settings;

    if let Some(limit) = settings.max_concurrent_runs {
        if limit < 1 {
            return Err(JobError::InvalidSettings(format!(
                "max_concurrent_runs must be at least 1, got {limit}"
            )));
        }
    }
    if spec.always_running && settings.concurrency_limit() > 1 {
        return Err(JobError::PreconditionViolation(
            "`always_running` must be specified only with `max_concurrent_runs = 1`".to_string(),
        ));
    }

    if let Some(schedule) = &settings.schedule {
        if let Some(status) = schedule.pause_status.as_deref() {
            if !PAUSE_STATUSES.contains(&status) {
                return Err(JobError::InvalidSettings(format!(
                    "schedule.pause_status must be one of {PAUSE_STATUSES:?}, got {status:?}"
                )));
            }
        }
    }

    validate_compute(
        "job",
        settings.existing_cluster_id.as_deref(),
        settings.new_cluster.as_ref(),
    )?;

    if !settings.tasks.is_empty() && !settings.task.is_empty() {
        return Err(JobError::InvalidSettings(
            "job-level task fields cannot be combined with `tasks`".to_string(),
        ));
    }
    validate_tasks(&settings.tasks)
}

fn validate_compute(
    scope: &str,
    existing_cluster_id: Option<&str>,
    new_cluster: Option<&ClusterSpec>,
) -> JobResult<()> {
    if existing_cluster_id.is_some() && new_cluster.is_some() {
        return Err(JobError::InvalidSettings(format!(
            "{scope}: existing_cluster_id and new_cluster are mutually exclusive"
        )));
    }
    if let Some(cluster) = new_cluster {
        cluster
            .validate()
            .map_err(|e| JobError::PreconditionViolation(format!("{scope}: new_cluster: {e}")))?;
    }
    Ok(())
}

fn validate_tasks(tasks: &[JobTaskSettings]) -> JobResult<()> {
    let mut keys = HashSet::new();
    for task in tasks {
        if task.task_key.is_empty() {
            return Err(JobError::InvalidSettings("every task needs a task_key".to_string()));
        }
        if !keys.insert(task.task_key.as_str()) {
            return Err(JobError::InvalidSettings(format!(
                "duplicate task_key {:?}",
                task.task_key
            )));
        }
    }

    for task in tasks {
        let scope = format!("task {:?}", task.task_key);
        validate_compute(
            &scope,
            task.existing_cluster_id.as_deref(),
            task.new_cluster.as_ref(),
        )?;
        if let Some(dep) = task.depends_on.iter().find(|d| !keys.contains(d.task_key.as_str())) {
            return Err(JobError::InvalidSettings(format!(
                "{scope} depends on unknown task {:?}",
                dep.task_key
            )));
        }
    }
    Ok(())
}

/// A job as seen by the lifecycle layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub job_id: JobId,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creator_user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    pub settings: JobSettings,
}

/// Result of comparing desired settings with the remote job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub job_id: JobId,
    pub exists: bool,
    pub in_sync: bool,
    pub desired_fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_fingerprint: Option<String>,
}

/// Fingerprint ignoring the `format` marker, which the service fills in.
fn drift_fingerprint(settings: &JobSettings) -> JobResult<String> {
    let mut settings = settings.clone();
    settings.format = None;
    fingerprint(&settings)
}

/// CRUD surface for one kind of remote job resource
#[derive(Clone)]
pub struct JobResource {
    transport: Arc<dyn Transport>,
    poller: RunStatePoller,
    host: String,
    timeouts: ResourceTimeouts,
}

impl JobResource {
    pub fn new(transport: Arc<dyn Transport>, poller: RunStatePoller) -> Self {
        Self {
            transport,
            poller,
            host: String::new(),
            timeouts: ResourceTimeouts::default(),
        }
    }

    /// Workspace URL used to build job links
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_timeouts(mut self, timeouts: ResourceTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn api_for(&self, settings: &JobSettings) -> JobsApi {
        JobsApi::for_settings(Arc::clone(&self.transport), settings)
    }

    fn runs_for(&self, settings: &JobSettings) -> RunController {
        RunController::new(self.api_for(settings), self.poller.clone())
    }

    /// Browser link to a job
    pub fn url(&self, job_id: JobId) -> String {
        format!("{}/#job/{}", self.host.trim_end_matches('/'), job_id)
    }

    /// Create the job; in always-running mode also start it.
    ///
    /// If the start fails the job still exists: the error is
    /// [`JobError::StartAfterCreate`] carrying the new id.
    pub fn create(&self, spec: &JobResourceSpec) -> JobResult<JobId> {
        validate(spec)?;
        let settings = spec.desired_settings();
        let job_id = self.api_for(&settings).create(&settings)?;

        if spec.always_running {
            self.runs_for(&settings)
                .start_and_confirm(job_id, self.timeouts.create)
                .map_err(|e| JobError::StartAfterCreate {
                    job_id,
                    source: Box::new(e),
                })?;
        }
        Ok(job_id)
    }

    /// Read a job using the version its last known settings call for
    pub fn read(&self, job_id: JobId, known: &JobSettings) -> JobResult<JobView> {
        self.read_with_version(job_id, crate::routing::select_version(known))
    }

    /// Read a job with an explicit API version
    pub fn read_with_version(&self, job_id: JobId, version: ApiVersion) -> JobResult<JobView> {
        let api = JobsApi::with_version(Arc::clone(&self.transport), version);
        let job: Job = api.read(job_id)?;
        Ok(JobView {
            job_id: job.job_id,
            url: self.url(job.job_id),
            creator_user_name: job.creator_user_name,
            created_time: job.created_time,
            settings: job.settings.unwrap_or_default(),
        })
    }

    /// Replace the job's settings; in always-running mode restart it.
    pub fn update(&self, job_id: JobId, spec: &JobResourceSpec) -> JobResult<Option<RestartOutcome>> {
        validate(spec)?;
        let settings = spec.desired_settings();
        self.api_for(&settings).update(job_id, &settings)?;

        if !spec.always_running {
            return Ok(None);
        }
        let outcome = RestartOrchestrator::new(self.runs_for(&settings))
            .restart(job_id, self.timeouts.update)?;
        Ok(Some(outcome))
    }

    /// Delete the job; a job that is already gone counts as deleted
    pub fn delete(&self, job_id: JobId, known: &JobSettings) -> JobResult<()> {
        match self.api_for(known).delete(job_id) {
            Err(JobError::NotFound { .. }) => {
                tracing::info!(%job_id, "job already gone");
                Ok(())
            }
            other => other,
        }
    }

    /// Restart an always-running job outside of an update
    pub fn restart(&self, job_id: JobId, known: &JobSettings) -> JobResult<RestartOutcome> {
        RestartOrchestrator::new(self.runs_for(known)).restart(job_id, self.timeouts.update)
    }

    /// Compare desired settings with the remote job
    pub fn plan(&self, job_id: JobId, spec: &JobResourceSpec) -> JobResult<Plan> {
        validate(spec)?;
        let desired = spec.desired_settings();
        let desired_fingerprint = drift_fingerprint(&desired)?;

        let remote = match self.read(job_id, &desired) {
            Ok(view) => Some(drift_fingerprint(&view.settings)?),
            Err(JobError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        Ok(Plan {
            job_id,
            exists: remote.is_some(),
            in_sync: remote.as_deref() == Some(desired_fingerprint.as_str()),
            desired_fingerprint,
            remote_fingerprint: remote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poll::PollConfig;
    use crate::transport::MockTransport;
    use jobctl_protocol::{CronSchedule, NotebookTask, TaskDependency, TaskDescriptor};
    use serde_json::json;

    fn notebook_task(key: &str) -> JobTaskSettings {
        JobTaskSettings::new(
            key,
            TaskDescriptor::Notebook(NotebookTask {
                notebook_path: format!("/{key}"),
                base_parameters: Default::default(),
            }),
        )
    }

    fn cluster(value: serde_json::Value) -> ClusterSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_url_joins_host_once() {
        let transport = Arc::new(MockTransport::new());
        for host in ["https://ws.example.com", "https://ws.example.com/"] {
            let poller = RunStatePoller::new(PollConfig::default());
            let resource = JobResource::new(transport.clone(), poller).with_host(host);
            assert_eq!(resource.url(JobId(12)), "https://ws.example.com/#job/12");
        }
    }

    #[test]
    fn test_defaults_applied() {
        let settings = JobResourceSpec::default().desired_settings();
        assert_eq!(settings.name, DEFAULT_JOB_NAME);
        assert_eq!(settings.max_concurrent_runs, Some(1));
    }

    #[test]
    fn test_concurrency_limit_must_be_positive() {
        let spec = JobResourceSpec::new(JobSettings {
            max_concurrent_runs: Some(0),
            ..Default::default()
        });
        let err = validate(&spec).unwrap_err();
        assert!(matches!(err, JobError::InvalidSettings(_)));
        assert!(err.to_string().contains("max_concurrent_runs"));

        let spec = JobResourceSpec::new(JobSettings {
            max_concurrent_runs: Some(1),
            ..Default::default()
        });
        assert!(validate(&spec).is_ok());
    }

    #[test]
    fn test_job_level_task_cannot_mix_with_tasks() {
        let spec = JobResourceSpec::new(JobSettings {
            task: TaskDescriptor::Notebook(NotebookTask {
                notebook_path: "/legacy".to_string(),
                base_parameters: Default::default(),
            })
            .into(),
            tasks: vec![notebook_task("a")],
            ..Default::default()
        });
        let err = validate(&spec).unwrap_err();
        assert!(matches!(err, JobError::InvalidSettings(_)));
        assert!(err.to_string().contains("cannot be combined"));
    }

    #[test]
    fn test_always_running_needs_single_concurrency() {
        let spec = JobResourceSpec::new(JobSettings {
            max_concurrent_runs: Some(2),
            ..Default::default()
        })
        .always_running();
        assert!(matches!(validate(&spec), Err(JobError::PreconditionViolation(_))));

        let spec = JobResourceSpec::new(JobSettings {
            max_concurrent_runs: Some(2),
            ..Default::default()
        });
        assert!(validate(&spec).is_ok());
    }

    #[test]
    fn test_invalid_cluster_is_precondition_violation() {
        let mut task = notebook_task("a");
        task.new_cluster = Some(cluster(json!({"spark_version": "13.3.x"})));
        let spec = JobResourceSpec::new(JobSettings {
            tasks: vec![task],
            ..Default::default()
        });
        let err = validate(&spec).unwrap_err();
        assert!(matches!(err, JobError::PreconditionViolation(_)));
        assert!(err.to_string().contains("task \"a\""));
    }

    #[test]
    fn test_compute_targets_exclusive() {
        let spec = JobResourceSpec::new(JobSettings {
            existing_cluster_id: Some("c-1".to_string()),
            new_cluster: Some(cluster(json!({"num_workers": 1}))),
            ..Default::default()
        });
        assert!(matches!(validate(&spec), Err(JobError::InvalidSettings(_))));
    }

    #[test]
    fn test_pause_status_values() {
        let mut settings = JobSettings {
            schedule: Some(CronSchedule {
                quartz_cron_expression: "0 0 * * * ?".to_string(),
                timezone_id: "UTC".to_string(),
                pause_status: Some("PAUSED".to_string()),
            }),
            ..Default::default()
        };
        assert!(validate(&JobResourceSpec::new(settings.clone())).is_ok());

        if let Some(schedule) = settings.schedule.as_mut() {
            schedule.pause_status = Some("SLEEPING".to_string());
        }
        assert!(validate(&JobResourceSpec::new(settings)).is_err());
    }

    #[test]
    fn test_task_keys_unique_and_dependencies_known() {
        let spec = JobResourceSpec::new(JobSettings {
            tasks: vec![notebook_task("a"), notebook_task("a")],
            ..Default::default()
        });
        assert!(validate(&spec).is_err());

        let mut load = notebook_task("load");
        load.depends_on.push(TaskDependency {
            task_key: "extract".to_string(),
        });
        let spec = JobResourceSpec::new(JobSettings {
            tasks: vec![load.clone()],
            ..Default::default()
        });
        assert!(validate(&spec).unwrap_err().to_string().contains("extract"));

        let spec = JobResourceSpec::new(JobSettings {
            tasks: vec![load, notebook_task("extract")],
            ..Default::default()
        });
        assert!(validate(&spec).is_ok());
    }

    #[test]
    fn test_resource_file_shape() {
        let spec: JobResourceSpec = serde_json::from_value(json!({
            "always_running": true,
            "settings": {"name": "stream", "spark_jar_task": {"main_class_name": "Main"}}
        }))
        .unwrap();
        assert!(spec.always_running);
        assert_eq!(spec.settings.name, "stream");
    }
}
