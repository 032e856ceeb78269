//! Mock Jobs Service
//!
//! In-process fake of the remote jobs API used by [`crate::transport::MockTransport`]
//! for unit and integration tests. Supports:
//!
//! - `jobs/list`, `jobs/create`, `jobs/get`, `jobs/reset`, `jobs/delete`
//! - `jobs/run-now`, `jobs/runs/list`, `jobs/runs/get`, `jobs/runs/cancel`
//! - scripted run lifecycle progressions
//! - per-endpoint failure injection
//! - a log of every call for ordering assertions

mod failure;
mod service;
mod state;

pub use failure::{Endpoint, FailureConfig, FailureInjector};
pub use service::MockJobsService;
pub use state::{MockJob, MockRun, MockState, RecordedCall};
