//! Job entities and job-scoped requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::settings::JobSettings;

/// Identifier the service assigns to a job on creation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An identifier string that is not a decimal integer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid identifier {0:?}: expected a decimal integer")]
pub struct ParseIdError(pub String);

impl FromStr for JobId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(JobId)
            .map_err(|_| ParseIdError(s.to_string()))
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        JobId(id)
    }
}

/// A job as returned by get/list/create.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(default)]
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<JobSettings>,
    /// Creation time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
}

/// Response of `/jobs/list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

/// Body of `/jobs/reset`: replaces all settings of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateJobRequest {
    pub job_id: JobId,
    pub new_settings: JobSettings,
}

/// Body or query of requests addressing one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobIdRequest {
    pub job_id: JobId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_job_id_parse() {
        assert_eq!("123".parse::<JobId>(), Ok(JobId(123)));
        assert_eq!(" 42 ".parse::<JobId>(), Ok(JobId(42)));
        assert!("abc".parse::<JobId>().is_err());
        assert!("".parse::<JobId>().is_err());
    }

    #[test]
    fn test_job_decodes_without_settings() {
        let job: Job = serde_json::from_value(json!({"job_id": 9, "created_time": 1700000000000i64}))
            .unwrap();
        assert_eq!(job.job_id, JobId(9));
        assert!(job.settings.is_none());
    }

    #[test]
    fn test_update_request_shape() {
        let request = UpdateJobRequest {
            job_id: JobId(5),
            new_settings: JobSettings {
                name: "x".to_string(),
                ..Default::default()
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({"job_id": 5, "new_settings": {"name": "x"}})
        );
    }
}
