//! Transport Layer for the jobs API
//!
//! Abstracts HTTP access to the jobs service for testability. Provides:
//! - Transport trait: versioned GET/POST returning JSON
//! - MockTransport: in-process fake jobs service for tests
//! - HttpTransport: real HTTP client for production

mod http;

pub use http::{HttpTransport, HttpTransportConfig};

use jobctl_protocol::{ApiError, ApiVersion};
use serde_json::Value;

use crate::mock::MockJobsService;

/// Transport trait for jobs API calls
///
/// The API version is passed on every call; implementations never remember
/// it between calls.
pub trait Transport: Send + Sync {
    /// Issue a GET with query parameters and return the decoded body
    fn get(
        &self,
        version: ApiVersion,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Value, TransportError>;

    /// Issue a POST with a JSON body and return the decoded body
    fn post(&self, version: ApiVersion, path: &str, body: &Value) -> Result<Value, TransportError>;
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("{0}")]
    Api(ApiError),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl TransportError {
    /// The structured backend error, if the service answered with one
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            TransportError::Api(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the service said the addressed entity does not exist
    pub fn is_missing(&self) -> bool {
        self.api().map(ApiError::is_missing).unwrap_or(false)
    }
}

impl From<ApiError> for TransportError {
    fn from(err: ApiError) -> Self {
        TransportError::Api(err)
    }
}

/// Mock transport for testing - connects directly to MockJobsService in-process
#[derive(Clone, Default)]
pub struct MockTransport {
    service: MockJobsService,
}

impl MockTransport {
    /// Create a new mock transport with a fresh service
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the underlying service for test configuration and inspection
    pub fn service(&self) -> &MockJobsService {
        &self.service
    }
}

impl Transport for MockTransport {
    fn get(
        &self,
        version: ApiVersion,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Value, TransportError> {
        Ok(self.service.handle_get(version, path, query)?)
    }

    fn post(&self, version: ApiVersion, path: &str, body: &Value) -> Result<Value, TransportError> {
        Ok(self.service.handle_post(version, path, body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobctl_protocol::paths;
    use serde_json::json;

    #[test]
    fn test_missing_classification() {
        let err = TransportError::from(ApiError::not_found("gone"));
        assert!(err.is_missing());

        let err = TransportError::Http("connection reset".to_string());
        assert!(!err.is_missing());
        assert!(err.api().is_none());
    }

    #[test]
    fn test_mock_transport_round_trip() {
        let transport = MockTransport::new();
        let created = transport
            .post(
                ApiVersion::Legacy,
                paths::JOBS_CREATE,
                &json!({"name": "t", "spark_submit_task": {}}),
            )
            .unwrap();
        let job_id = created["job_id"].as_i64().unwrap();

        let fetched = transport
            .get(
                ApiVersion::Legacy,
                paths::JOBS_GET,
                &[("job_id".to_string(), job_id.to_string())],
            )
            .unwrap();
        assert_eq!(fetched["settings"]["name"], "t");
    }

    #[test]
    fn test_mock_transport_surfaces_api_errors() {
        let transport = MockTransport::new();
        let err = transport
            .get(
                ApiVersion::Legacy,
                paths::RUNS_GET,
                &[("run_id".to_string(), "404".to_string())],
            )
            .unwrap_err();
        assert!(err.api().is_some());
    }
}
