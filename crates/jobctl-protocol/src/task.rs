//! Task descriptors.
//!
//! A job (legacy shape) or a task (multi-task shape) runs exactly one kind
//! of workload. On the wire each kind is a separate optional object
//! (`notebook_task`, `spark_jar_task`, ...); in Rust it is a single
//! [`TaskDescriptor`] so that two kinds can never be populated together.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Runs a notebook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotebookTask {
    pub notebook_path: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub base_parameters: BTreeMap<String, String>,
}

/// Runs the main class of a JAR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparkJarTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jar_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

/// Runs a Python file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparkPythonTask {
    pub python_file: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

/// Runs spark-submit with raw parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparkSubmitTask {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

/// Runs an entry point of a Python wheel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonWheelTask {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_parameters: BTreeMap<String, String>,
}

/// Triggers an update of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTask {
    pub pipeline_id: String,
}

/// The one workload a job or task runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskDescriptor {
    Notebook(NotebookTask),
    SparkJar(SparkJarTask),
    SparkPython(SparkPythonTask),
    SparkSubmit(SparkSubmitTask),
    PythonWheel(PythonWheelTask),
    Pipeline(PipelineTask),
}

impl TaskDescriptor {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskDescriptor::Notebook(_) => TaskKind::Notebook,
            TaskDescriptor::SparkJar(_) => TaskKind::SparkJar,
            TaskDescriptor::SparkPython(_) => TaskKind::SparkPython,
            TaskDescriptor::SparkSubmit(_) => TaskKind::SparkSubmit,
            TaskDescriptor::PythonWheel(_) => TaskKind::PythonWheel,
            TaskDescriptor::Pipeline(_) => TaskKind::Pipeline,
        }
    }
}

/// Label for a [`TaskDescriptor`] variant, named after its wire field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Notebook,
    SparkJar,
    SparkPython,
    SparkSubmit,
    PythonWheel,
    Pipeline,
}

impl TaskKind {
    pub fn field_name(&self) -> &'static str {
        match self {
            TaskKind::Notebook => "notebook_task",
            TaskKind::SparkJar => "spark_jar_task",
            TaskKind::SparkPython => "spark_python_task",
            TaskKind::SparkSubmit => "spark_submit_task",
            TaskKind::PythonWheel => "python_wheel_task",
            TaskKind::Pipeline => "pipeline_task",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Optional task descriptor as it is flattened into job/task settings.
///
/// Deserialization rejects bodies that populate more than one task field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TaskFields", into = "TaskFields")]
pub struct TaskSlot(Option<TaskDescriptor>);

impl TaskSlot {
    pub fn get(&self) -> Option<&TaskDescriptor> {
        self.0.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

impl From<TaskDescriptor> for TaskSlot {
    fn from(task: TaskDescriptor) -> Self {
        Self(Some(task))
    }
}

impl From<Option<TaskDescriptor>> for TaskSlot {
    fn from(task: Option<TaskDescriptor>) -> Self {
        Self(task)
    }
}

/// Wire form of [`TaskSlot`]: one optional field per task kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notebook_task: Option<NotebookTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spark_jar_task: Option<SparkJarTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spark_python_task: Option<SparkPythonTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spark_submit_task: Option<SparkSubmitTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    python_wheel_task: Option<PythonWheelTask>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pipeline_task: Option<PipelineTask>,
}

/// More than one task kind was populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictingTaskTypes(pub Vec<TaskKind>);

impl fmt::Display for ConflictingTaskTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(TaskKind::field_name).collect();
        write!(f, "only one task type may be set, found: {}", names.join(", "))
    }
}

impl std::error::Error for ConflictingTaskTypes {}

impl TryFrom<TaskFields> for TaskSlot {
    type Error = ConflictingTaskTypes;

    fn try_from(fields: TaskFields) -> Result<Self, Self::Error> {
        let mut found: Vec<TaskDescriptor> = Vec::new();
        if let Some(t) = fields.notebook_task {
            found.push(TaskDescriptor::Notebook(t));
        }
        if let Some(t) = fields.spark_jar_task {
            found.push(TaskDescriptor::SparkJar(t));
        }
        if let Some(t) = fields.spark_python_task {
            found.push(TaskDescriptor::SparkPython(t));
        }
        if let Some(t) = fields.spark_submit_task {
            found.push(TaskDescriptor::SparkSubmit(t));
        }
        if let Some(t) = fields.python_wheel_task {
            found.push(TaskDescriptor::PythonWheel(t));
        }
        if let Some(t) = fields.pipeline_task {
            found.push(TaskDescriptor::Pipeline(t));
        }

        if found.len() > 1 {
            return Err(ConflictingTaskTypes(found.iter().map(TaskDescriptor::kind).collect()));
        }
        Ok(TaskSlot(found.pop()))
    }
}

impl From<TaskSlot> for TaskFields {
    fn from(slot: TaskSlot) -> Self {
        let mut fields = TaskFields::default();
        match slot.0 {
            None => {}
            Some(TaskDescriptor::Notebook(t)) => fields.notebook_task = Some(t),
            Some(TaskDescriptor::SparkJar(t)) => fields.spark_jar_task = Some(t),
            Some(TaskDescriptor::SparkPython(t)) => fields.spark_python_task = Some(t),
            Some(TaskDescriptor::SparkSubmit(t)) => fields.spark_submit_task = Some(t),
            Some(TaskDescriptor::PythonWheel(t)) => fields.python_wheel_task = Some(t),
            Some(TaskDescriptor::Pipeline(t)) => fields.pipeline_task = Some(t),
        }
        fields
    }
}
