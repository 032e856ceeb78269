//! Job and task settings.
//!
//! [`JobSettings`] carries both shapes: the legacy single-task fields
//! (compute target, task descriptor, libraries, retry policy at job level)
//! and the multi-task `tasks` list with its `format` marker.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::task::{TaskDescriptor, TaskSlot};
use crate::FORMAT_MULTI_TASK;

/// Inline cluster specification.
///
/// Opaque to this crate apart from the few keys [`ClusterSpec::validate`]
/// inspects; everything else is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterSpec(pub Map<String, Value>);

/// Reasons an inline cluster spec is refused before it is sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClusterSpecError {
    #[error("num_workers could be 0 only for single-node clusters (spark_conf profile singleNode, local spark.master, ResourceClass SingleNode)")]
    ZeroWorkers,

    #[error("num_workers must not be negative, got {0}")]
    NegativeWorkers(i64),
}

impl ClusterSpec {
    pub fn num_workers(&self) -> i64 {
        self.0.get("num_workers").and_then(Value::as_i64).unwrap_or(0)
    }

    fn nested_str(&self, block: &str, key: &str) -> Option<&str> {
        self.0.get(block)?.get(key)?.as_str()
    }

    /// Check the worker count against the single-node rules.
    pub fn validate(&self) -> Result<(), ClusterSpecError> {
        let workers = self.num_workers();
        if workers < 0 {
            return Err(ClusterSpecError::NegativeWorkers(workers));
        }
        if workers > 0 || self.0.contains_key("autoscale") {
            return Ok(());
        }

        let profile = self.nested_str("spark_conf", "spark.databricks.cluster.profile");
        let master = self.nested_str("spark_conf", "spark.master").unwrap_or("");
        let resource_class = self.nested_str("custom_tags", "ResourceClass");
        if profile == Some("singleNode")
            && master.starts_with("local")
            && resource_class == Some("SingleNode")
        {
            return Ok(());
        }
        Err(ClusterSpecError::ZeroWorkers)
    }
}

/// Library attached to a job or task (passed through as-is).
pub type Library = Value;

/// Who gets emailed about run lifecycle events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailNotifications {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_start: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_success: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_failure: Vec<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub no_alert_for_skipped_runs: bool,
}

/// Quartz cron schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CronSchedule {
    pub quartz_cron_expression: String,
    pub timezone_id: String,
    /// `PAUSED` or `UNPAUSED`; filled in by the service when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pause_status: Option<String>,
}

/// Accepted values of [`CronSchedule::pause_status`].
pub const PAUSE_STATUSES: &[&str] = &["PAUSED", "UNPAUSED"];

/// Edge in the task graph of a multi-task job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDependency {
    pub task_key: String,
}

/// One entry of a multi-task job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobTaskSettings {
    /// Unique key of the task within its job; tasks are ordered by it.
    #[serde(default)]
    pub task_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<TaskDependency>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_cluster_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_cluster: Option<ClusterSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<Library>,

    #[serde(flatten)]
    pub task: TaskSlot,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_notifications: Option<EmailNotifications>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_retry_interval_millis: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retry_on_timeout: bool,
}

impl JobTaskSettings {
    /// A task with a key and a workload and nothing else.
    pub fn new(task_key: impl Into<String>, task: TaskDescriptor) -> Self {
        Self {
            task_key: task_key.into(),
            task: task.into(),
            ..Default::default()
        }
    }
}

/// Desired configuration of a job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    // Legacy (2.0) single-task fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_cluster_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_cluster: Option<ClusterSpec>,
    #[serde(flatten)]
    pub task: TaskSlot,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<Library>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_retry_interval_millis: Option<i32>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub retry_on_timeout: bool,

    // Multi-task (2.1) fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<JobTaskSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<CronSchedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_runs: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email_notifications: Option<EmailNotifications>,
}

impl JobSettings {
    /// Whether the settings use the multi-task shape.
    pub fn is_multi_task(&self) -> bool {
        self.format.as_deref() == Some(FORMAT_MULTI_TASK) || !self.tasks.is_empty()
    }

    /// Effective concurrency limit (the service defaults to 1).
    pub fn concurrency_limit(&self) -> i32 {
        self.max_concurrent_runs.unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{NotebookTask, SparkPythonTask};
    use serde_json::json;

    fn cluster(value: Value) -> ClusterSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_cluster_with_workers_is_valid() {
        assert!(cluster(json!({"num_workers": 2, "spark_version": "13.3.x"}))
            .validate()
            .is_ok());
        assert!(cluster(json!({"autoscale": {"min_workers": 1, "max_workers": 4}}))
            .validate()
            .is_ok());
    }

    #[test]
    fn test_cluster_zero_workers_needs_single_node() {
        assert_eq!(
            cluster(json!({"spark_version": "13.3.x"})).validate(),
            Err(ClusterSpecError::ZeroWorkers)
        );

        let single = cluster(json!({
            "num_workers": 0,
            "spark_conf": {
                "spark.databricks.cluster.profile": "singleNode",
                "spark.master": "local[*]"
            },
            "custom_tags": {"ResourceClass": "SingleNode"}
        }));
        assert!(single.validate().is_ok());
    }

    #[test]
    fn test_cluster_negative_workers() {
        assert_eq!(
            cluster(json!({"num_workers": -1})).validate(),
            Err(ClusterSpecError::NegativeWorkers(-1))
        );
    }

    #[test]
    fn test_legacy_settings_wire_shape() {
        let settings = JobSettings {
            name: "nightly".to_string(),
            existing_cluster_id: Some("abc-123".to_string()),
            task: TaskDescriptor::Notebook(NotebookTask {
                notebook_path: "/Shared/nightly".to_string(),
                base_parameters: Default::default(),
            })
            .into(),
            max_concurrent_runs: Some(1),
            ..Default::default()
        };

        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "nightly",
                "existing_cluster_id": "abc-123",
                "notebook_task": {"notebook_path": "/Shared/nightly"},
                "max_concurrent_runs": 1
            })
        );
        assert!(!settings.is_multi_task());
    }

    #[test]
    fn test_multi_task_settings_decode() {
        let settings: JobSettings = serde_json::from_value(json!({
            "name": "etl",
            "format": "MULTI_TASK",
            "tasks": [
                {
                    "task_key": "extract",
                    "existing_cluster_id": "c-1",
                    "spark_python_task": {"python_file": "dbfs:/extract.py"}
                },
                {
                    "task_key": "load",
                    "depends_on": [{"task_key": "extract"}],
                    "existing_cluster_id": "c-1",
                    "notebook_task": {"notebook_path": "/load"}
                }
            ]
        }))
        .unwrap();

        assert!(settings.is_multi_task());
        assert!(settings.task.is_empty());
        assert_eq!(settings.tasks.len(), 2);
        assert_eq!(
            settings.tasks[0].task.get(),
            Some(&TaskDescriptor::SparkPython(SparkPythonTask {
                python_file: "dbfs:/extract.py".to_string(),
                parameters: vec![],
            }))
        );
        assert_eq!(settings.tasks[1].depends_on[0].task_key, "extract");
    }

    #[test]
    fn test_format_marker_alone_selects_multi_task() {
        let settings = JobSettings {
            format: Some(FORMAT_MULTI_TASK.to_string()),
            ..Default::default()
        };
        assert!(settings.is_multi_task());
    }

    #[test]
    fn test_task_with_two_workloads_rejected() {
        let result = serde_json::from_value::<JobSettings>(json!({
            "tasks": [{
                "task_key": "a",
                "notebook_task": {"notebook_path": "/a"},
                "pipeline_task": {"pipeline_id": "p"}
            }]
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_concurrency_limit_default() {
        assert_eq!(JobSettings::default().concurrency_limit(), 1);
    }
}
