//! Typed client for the jobs API.
//!
//! A [`JobsApi`] speaks one API version, fixed when it is built. Lifecycle
//! operations build a fresh client per call from the settings at hand (see
//! [`JobsApi::for_settings`]) so the version is never cached on a job id.

use std::sync::Arc;

use jobctl_protocol::{
    paths, ApiVersion, CancelRunRequest, Job, JobId, JobIdRequest, JobList, JobRun, JobRunsList,
    JobRunsListRequest, JobSettings, RunId, RunParameters, UpdateJobRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{JobError, JobResult};
use crate::normalize::{normalize, normalize_in_place};
use crate::routing::select_version;
use crate::transport::{Transport, TransportError};

/// Jobs API client bound to one API version.
#[derive(Clone)]
pub struct JobsApi {
    transport: Arc<dyn Transport>,
    version: ApiVersion,
}

impl JobsApi {
    /// Client speaking the legacy protocol
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_version(transport, ApiVersion::Legacy)
    }

    pub fn with_version(transport: Arc<dyn Transport>, version: ApiVersion) -> Self {
        Self { transport, version }
    }

    /// Client speaking the version the given settings require
    pub fn for_settings(transport: Arc<dyn Transport>, settings: &JobSettings) -> Self {
        Self::with_version(transport, select_version(settings))
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, TransportError> {
        let value = self.transport.get(self.version, path, query)?;
        Ok(serde_json::from_value(value)?)
    }

    fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let body = serde_json::to_value(body)?;
        let value = self.transport.post(self.version, path, &body)?;
        Ok(serde_json::from_value(value)?)
    }

    fn post_ignoring_body<B: Serialize>(&self, path: &str, body: &B) -> Result<(), TransportError> {
        let body = serde_json::to_value(body)?;
        self.transport.post(self.version, path, &body)?;
        Ok(())
    }

    // === Jobs ===

    /// All jobs visible to the caller
    pub fn list(&self) -> JobResult<Vec<Job>> {
        let list: JobList = self.get(paths::JOBS_LIST, &[])?;
        Ok(list
            .jobs
            .into_iter()
            .map(|mut job| {
                if let Some(settings) = job.settings.as_mut() {
                    normalize_in_place(settings);
                }
                job
            })
            .collect())
    }

    /// Create a job; tasks are normalized before they are sent
    pub fn create(&self, settings: &JobSettings) -> JobResult<JobId> {
        let settings = normalize(settings.clone());
        let job: Job = self.post(paths::JOBS_CREATE, &settings)?;
        tracing::info!(job_id = %job.job_id, api_version = %self.version, "job created");
        Ok(job.job_id)
    }

    /// Replace all settings of a job
    pub fn update(&self, job_id: JobId, settings: &JobSettings) -> JobResult<()> {
        let request = UpdateJobRequest {
            job_id,
            new_settings: normalize(settings.clone()),
        };
        self.post_ignoring_body(paths::JOBS_RESET, &request)
            .map_err(|e| wrap_missing_job(e, job_id))?;
        tracing::info!(%job_id, api_version = %self.version, "job settings replaced");
        Ok(())
    }

    /// Fetch a job; tasks in the returned settings are normalized
    pub fn read(&self, job_id: JobId) -> JobResult<Job> {
        let query = [("job_id".to_string(), job_id.to_string())];
        let mut job: Job = self
            .get(paths::JOBS_GET, &query)
            .map_err(|e| wrap_missing_job(e, job_id))?;
        if let Some(settings) = job.settings.as_mut() {
            normalize_in_place(settings);
        }
        tracing::debug!(%job_id, api_version = %self.version, "job read");
        Ok(job)
    }

    /// Delete a job; a missing job surfaces as [`JobError::NotFound`]
    pub fn delete(&self, job_id: JobId) -> JobResult<()> {
        self.post_ignoring_body(paths::JOBS_DELETE, &JobIdRequest { job_id })
            .map_err(|e| wrap_missing_job(e, job_id))?;
        tracing::info!(%job_id, "job deleted");
        Ok(())
    }

    // === Runs ===

    /// One page of runs
    pub fn runs_list(&self, request: &JobRunsListRequest) -> Result<JobRunsList, TransportError> {
        self.get(paths::RUNS_LIST, &request.to_query())
    }

    /// Every non-terminal run of a job, walking all pages
    pub fn active_runs(&self, job_id: JobId) -> Result<Vec<JobRun>, TransportError> {
        let mut request = JobRunsListRequest::active(job_id);
        let mut runs = Vec::new();
        loop {
            let page = self.runs_list(&request)?;
            let fetched = page.runs.len() as u32;
            runs.extend(page.runs);
            if !page.has_more || fetched == 0 {
                break;
            }
            request.offset += fetched;
        }
        Ok(runs)
    }

    /// Current state of a run
    pub fn runs_get(&self, run_id: RunId) -> Result<JobRun, TransportError> {
        let query = [("run_id".to_string(), run_id.to_string())];
        self.get(paths::RUNS_GET, &query)
    }

    /// Start a run now; the service assigns a new run id
    pub fn run_now(&self, params: &RunParameters) -> Result<RunId, TransportError> {
        let run: JobRun = self.post(paths::RUN_NOW, params)?;
        Ok(run.run_id)
    }

    /// Request cancellation; does not wait for it to take effect
    pub fn runs_cancel(&self, run_id: RunId) -> Result<(), TransportError> {
        self.post_ignoring_body(paths::RUNS_CANCEL, &CancelRunRequest { run_id })
    }
}

/// Classify an error from a job-scoped call.
///
/// Besides proper not-found errors, the service answers some requests for a
/// deleted job with a non-404 error whose message reads
/// `Job {id} does not exist.`; that shape is reclassified to not-found with
/// the status normalized to 404. Everything else stays a transport error.
pub fn wrap_missing_job(err: TransportError, job_id: JobId) -> JobError {
    match err {
        TransportError::Api(mut api) => {
            let marker = format!("Job {job_id} does not exist.");
            if api.is_missing() || api.message.contains(&marker) {
                api.status_code = 404;
                JobError::NotFound { job_id, source: api }
            } else {
                JobError::Transport(TransportError::Api(api))
            }
        }
        other => JobError::Transport(other),
    }
}
