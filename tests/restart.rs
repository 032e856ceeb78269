//! Restart protocol: at most one active run, cancel confirmed before start.

use std::sync::Arc;
use std::time::Duration;

use jobctl::mock::{Endpoint, MockJobsService};
use jobctl::protocol::{ApiError, JobId, JobSettings, LifeCycleState};
use jobctl::{
    FailureKind, FakeClock, JobError, JobsApi, MockTransport, PollConfig, RestartOrchestrator,
    RunController, RunStatePoller,
};

const DEADLINE: Duration = Duration::from_secs(300);

fn setup() -> (RestartOrchestrator, MockJobsService, JobId) {
    let transport = MockTransport::new();
    let service = transport.service().clone();
    let poller = RunStatePoller::new(PollConfig::default()).with_clock(Arc::new(FakeClock::new()));
    let runs = RunController::new(JobsApi::new(Arc::new(transport)), poller);
    let job_id = service.seed_job(JobSettings::default());
    (RestartOrchestrator::new(runs), service, job_id)
}

fn position(calls: &[Endpoint], endpoint: Endpoint) -> Option<usize> {
    calls.iter().position(|e| *e == endpoint)
}

#[test]
fn test_no_active_runs_starts_once() {
    let (restart, service, job_id) = setup();

    let outcome = restart.restart(job_id, DEADLINE).unwrap();

    assert_eq!(outcome.cancelled, None);
    assert_eq!(service.call_count(Endpoint::RunNow), 1);
    assert_eq!(service.call_count(Endpoint::CancelRun), 0);
    assert_eq!(service.active_run_ids(job_id), vec![outcome.started]);
    assert_eq!(
        service.run_state(outcome.started),
        Some(LifeCycleState::Running)
    );
}

#[test]
fn test_one_active_run_cancelled_before_start() {
    let (restart, service, job_id) = setup();
    let old = service.seed_run(job_id, LifeCycleState::Running);

    let outcome = restart.restart(job_id, DEADLINE).unwrap();

    assert_eq!(outcome.cancelled, Some(old));
    assert_ne!(outcome.started, old);
    assert_eq!(service.run_state(old), Some(LifeCycleState::Terminated));

    let calls = service.endpoints_called();
    let cancel = position(&calls, Endpoint::CancelRun).unwrap();
    let start = position(&calls, Endpoint::RunNow).unwrap();
    assert!(cancel < start);
    // Termination was observed between cancel and start
    assert!(calls[cancel..start].contains(&Endpoint::GetRun));
    assert_eq!(service.active_run_ids(job_id), vec![outcome.started]);
}

#[test]
fn test_rejected_cancel_prevents_start() {
    let (restart, service, job_id) = setup();
    let old = service.seed_run(job_id, LifeCycleState::Running);
    service.inject_error(
        Endpoint::CancelRun,
        ApiError::invalid_parameter("Run cannot be cancelled"),
    );

    let err = restart.restart(job_id, DEADLINE).unwrap_err();

    assert!(matches!(err, JobError::CancelFailed { run_id, .. } if run_id == old));
    assert!(err.to_string().contains(&format!("cannot cancel run {old}")));
    assert_eq!(service.call_count(Endpoint::RunNow), 0);
}

#[test]
fn test_cancel_never_lands_times_out_without_start() {
    let (restart, service, job_id) = setup();
    let old = service.seed_run(job_id, LifeCycleState::Running);
    service.hold_on_cancel(old);

    let err = restart.restart(job_id, DEADLINE).unwrap_err();

    assert!(matches!(err, JobError::CancelFailed { .. }));
    assert_eq!(err.failure_kind(), FailureKind::Timeout);
    assert_eq!(service.call_count(Endpoint::CancelRun), 1);
    assert_eq!(service.call_count(Endpoint::RunNow), 0);
}

#[test]
fn test_two_active_runs_is_precondition_violation() {
    let (restart, service, job_id) = setup();
    service.seed_run(job_id, LifeCycleState::Running);
    service.seed_run(job_id, LifeCycleState::Pending);

    let err = restart.restart(job_id, DEADLINE).unwrap_err();

    assert!(matches!(err, JobError::PreconditionViolation(_)));
    assert!(err.to_string().contains("There are 2 active runs"));
    assert_eq!(service.call_count(Endpoint::CancelRun), 0);
    assert_eq!(service.call_count(Endpoint::RunNow), 0);
}

#[test]
fn test_terminated_runs_are_not_active() {
    let (restart, service, job_id) = setup();
    service.seed_run(job_id, LifeCycleState::Terminated);
    service.seed_run(job_id, LifeCycleState::Skipped);

    let outcome = restart.restart(job_id, DEADLINE).unwrap();
    assert_eq!(outcome.cancelled, None);
    assert_eq!(service.call_count(Endpoint::CancelRun), 0);
}

#[test]
fn test_new_run_internal_error() {
    let (restart, service, job_id) = setup();
    service.script_next_run(vec![LifeCycleState::Pending, LifeCycleState::InternalError]);

    let err = restart.restart(job_id, DEADLINE).unwrap_err();
    assert!(matches!(err, JobError::TerminalRunFailure { .. }));
    assert_eq!(err.failure_kind(), FailureKind::RunFailed);
}

#[test]
fn test_rejected_start_is_start_failed() {
    let (restart, service, job_id) = setup();
    service.inject_error(Endpoint::RunNow, ApiError::new(429, "RESOURCE_EXHAUSTED", "too many runs"));

    let err = restart.restart(job_id, DEADLINE).unwrap_err();
    assert!(matches!(err, JobError::StartFailed { job_id: id, .. } if id == job_id));
}
