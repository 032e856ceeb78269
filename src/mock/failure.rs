//! Failure Injection for the Mock Jobs Service
//!
//! Supports configurable failure injection for testing error paths.

use std::collections::HashMap;

use jobctl_protocol::{paths, ApiError};

/// Endpoints of the jobs API the mock serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListJobs,
    CreateJob,
    GetJob,
    ResetJob,
    DeleteJob,
    RunNow,
    ListRuns,
    GetRun,
    CancelRun,
}

impl Endpoint {
    /// Resolve a GET path
    pub fn for_get(path: &str) -> Option<Self> {
        match path {
            paths::JOBS_LIST => Some(Endpoint::ListJobs),
            paths::JOBS_GET => Some(Endpoint::GetJob),
            paths::RUNS_LIST => Some(Endpoint::ListRuns),
            paths::RUNS_GET => Some(Endpoint::GetRun),
            _ => None,
        }
    }

    /// Resolve a POST path
    pub fn for_post(path: &str) -> Option<Self> {
        match path {
            paths::JOBS_CREATE => Some(Endpoint::CreateJob),
            paths::JOBS_RESET => Some(Endpoint::ResetJob),
            paths::JOBS_DELETE => Some(Endpoint::DeleteJob),
            paths::RUN_NOW => Some(Endpoint::RunNow),
            paths::RUNS_CANCEL => Some(Endpoint::CancelRun),
            _ => None,
        }
    }
}

/// Failure configuration for an endpoint
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Error to return
    pub error: ApiError,
    /// Number of times to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Create a config that returns an error
    pub fn error(error: ApiError) -> Self {
        Self {
            error,
            fail_count: None,
        }
    }

    /// Create a 503 the transport layer would normally retry
    pub fn unavailable() -> Self {
        Self::error(ApiError::new(503, "TEMPORARILY_UNAVAILABLE", "service unavailable"))
    }

    /// Set the number of times to fail before succeeding
    pub fn with_fail_count(mut self, count: u32) -> Self {
        self.fail_count = Some(count);
        self
    }
}

/// Failure injector for the mock service
#[derive(Debug, Default)]
pub struct FailureInjector {
    /// Per-endpoint failure configs
    configs: HashMap<Endpoint, FailureConfig>,
    /// Call counts per endpoint (for fail_count tracking)
    call_counts: HashMap<Endpoint, u32>,
}

impl FailureInjector {
    /// Create a new failure injector
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure for an endpoint
    pub fn inject(&mut self, endpoint: Endpoint, config: FailureConfig) {
        self.configs.insert(endpoint, config);
        self.call_counts.insert(endpoint, 0);
    }

    /// Check if a failure should occur for an endpoint
    /// Returns the error to answer with, None otherwise
    pub fn check(&mut self, endpoint: Endpoint) -> Option<ApiError> {
        let config = self.configs.get(&endpoint)?;
        let count = self.call_counts.entry(endpoint).or_insert(0);
        *count += 1;

        if let Some(fail_limit) = config.fail_count {
            if *count > fail_limit {
                return None;
            }
        }
        Some(config.error.clone())
    }
}
