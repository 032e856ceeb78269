//! Wire protocol selection.
//!
//! Jobs come in two incompatible shapes and each has its own API version.
//! The version is derived from the settings being sent or read, every time;
//! nothing remembers it per job id.

use jobctl_protocol::{ApiVersion, JobSettings};

/// Pick the API version a configuration must be addressed with.
///
/// Multi-task when the settings carry at least one task or the explicit
/// `MULTI_TASK` format marker, legacy otherwise.
pub fn select_version(settings: &JobSettings) -> ApiVersion {
    if settings.is_multi_task() {
        ApiVersion::MultiTask
    } else {
        ApiVersion::Legacy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobctl_protocol::{JobTaskSettings, PipelineTask, TaskDescriptor, FORMAT_MULTI_TASK, FORMAT_SINGLE_TASK};

    fn pipeline(key: &str) -> JobTaskSettings {
        JobTaskSettings::new(
            key,
            TaskDescriptor::Pipeline(PipelineTask {
                pipeline_id: "p-1".to_string(),
            }),
        )
    }

    #[test]
    fn test_legacy_by_default() {
        assert_eq!(select_version(&JobSettings::default()), ApiVersion::Legacy);
    }

    #[test]
    fn test_one_task_flips_to_multi_task() {
        let mut settings = JobSettings::default();
        assert_eq!(select_version(&settings), ApiVersion::Legacy);

        settings.tasks.push(pipeline("only"));
        assert_eq!(select_version(&settings), ApiVersion::MultiTask);
    }

    #[test]
    fn test_format_marker() {
        let mut settings = JobSettings {
            format: Some(FORMAT_MULTI_TASK.to_string()),
            ..Default::default()
        };
        assert_eq!(select_version(&settings), ApiVersion::MultiTask);

        settings.format = Some(FORMAT_SINGLE_TASK.to_string());
        assert_eq!(select_version(&settings), ApiVersion::Legacy);
    }

    #[test]
    fn test_pure() {
        let settings = JobSettings {
            tasks: vec![pipeline("a"), pipeline("b")],
            ..Default::default()
        };
        let first = select_version(&settings);
        for _ in 0..3 {
            assert_eq!(select_version(&settings), first);
        }
    }
}
