//! Run state polling against the mock service with a fake clock.

use std::sync::Arc;
use std::time::Duration;

use jobctl::mock::{Endpoint, FailureConfig, MockJobsService};
use jobctl::protocol::{JobSettings, LifeCycleState, RunId};
use jobctl::{CancelFlag, FakeClock, JobError, JobsApi, MockTransport, PollConfig, RunStatePoller};

struct Harness {
    api: JobsApi,
    service: MockJobsService,
    clock: Arc<FakeClock>,
    poller: RunStatePoller,
}

fn harness() -> Harness {
    let transport = MockTransport::new();
    let service = transport.service().clone();
    let clock = Arc::new(FakeClock::new());
    let poller = RunStatePoller::new(PollConfig {
        initial_interval: Duration::from_secs(1),
        max_interval: Duration::from_secs(4),
    })
    .with_clock(clock.clone());

    Harness {
        api: JobsApi::new(Arc::new(transport)),
        service,
        clock,
        poller,
    }
}

fn pending_run(h: &Harness, upcoming: Vec<LifeCycleState>) -> RunId {
    let job_id = h.service.seed_job(JobSettings::default());
    let run_id = h.service.seed_run(job_id, LifeCycleState::Pending);
    h.service.script_run(run_id, upcoming);
    run_id
}

#[test]
fn test_pending_twice_then_running() {
    let h = harness();
    let run_id = pending_run(
        &h,
        vec![
            LifeCycleState::Pending,
            LifeCycleState::Pending,
            LifeCycleState::Running,
        ],
    );

    let run = h
        .poller
        .wait_for_state(&h.api, run_id, LifeCycleState::Running, Duration::from_secs(60))
        .unwrap();

    assert_eq!(run.state.life_cycle_state, LifeCycleState::Running);
    assert_eq!(h.service.call_count(Endpoint::GetRun), 3);
    // Backoff 1s then 2s
    assert_eq!(h.clock.elapsed(), Duration::from_secs(3));
}

#[test]
fn test_pending_for_whole_deadline_times_out() {
    let h = harness();
    let run_id = pending_run(&h, vec![]);

    let err = h
        .poller
        .wait_for_state(&h.api, run_id, LifeCycleState::Running, Duration::from_secs(10))
        .unwrap_err();

    match err {
        JobError::Timeout {
            run_id: failed,
            desired,
            last_state,
            message,
            waited,
        } => {
            assert_eq!(failed, run_id);
            assert_eq!(desired, LifeCycleState::Running);
            assert_eq!(last_state, LifeCycleState::Pending);
            assert_eq!(message, "Waiting for cluster.");
            assert_eq!(waited, Duration::from_secs(10));
        }
        other => panic!("expected Timeout, got {other:?}"),
    }
    // Never sleeps past the deadline
    assert_eq!(h.clock.elapsed(), Duration::from_secs(10));
}

#[test]
fn test_internal_error_fails_immediately() {
    let h = harness();
    let run_id = pending_run(&h, vec![LifeCycleState::InternalError]);

    let err = h
        .poller
        .wait_for_state(&h.api, run_id, LifeCycleState::Running, Duration::from_secs(600))
        .unwrap_err();

    assert!(matches!(err, JobError::TerminalRunFailure { .. }));
    assert!(err.to_string().contains("internal error"));
    assert!(h.clock.sleeps().is_empty());
    assert_eq!(h.service.call_count(Endpoint::GetRun), 1);
}

#[test]
fn test_fetch_failure_is_not_retried() {
    let h = harness();
    let run_id = pending_run(&h, vec![LifeCycleState::Running]);
    h.service
        .inject_failure(Endpoint::GetRun, FailureConfig::unavailable().with_fail_count(1));

    let err = h
        .poller
        .wait_for_state(&h.api, run_id, LifeCycleState::Running, Duration::from_secs(60))
        .unwrap_err();

    assert!(matches!(err, JobError::RunStatusUnavailable { .. }));
    assert!(err.to_string().contains("RUNNING"));
    assert_eq!(h.service.call_count(Endpoint::GetRun), 1);
}

#[test]
fn test_unknown_run_is_unavailable() {
    let h = harness();
    let err = h
        .poller
        .wait_for_state(&h.api, RunId(404), LifeCycleState::Terminated, Duration::from_secs(5))
        .unwrap_err();
    assert!(matches!(err, JobError::RunStatusUnavailable { run_id, .. } if run_id == RunId(404)));
}

#[test]
fn test_terminal_state_other_than_desired_keeps_polling() {
    let h = harness();
    let run_id = pending_run(&h, vec![LifeCycleState::Terminated]);

    let err = h
        .poller
        .wait_for_state(&h.api, run_id, LifeCycleState::Running, Duration::from_secs(5))
        .unwrap_err();
    assert!(matches!(
        err,
        JobError::Timeout {
            last_state: LifeCycleState::Terminated,
            ..
        }
    ));
}

#[test]
fn test_operator_interrupt() {
    let h = harness();
    let run_id = pending_run(&h, vec![]);
    let cancel = CancelFlag::new();
    let poller = h.poller.clone().with_cancel_flag(cancel.clone());

    cancel.cancel();
    let err = poller
        .wait_for_state(&h.api, run_id, LifeCycleState::Running, Duration::from_secs(60))
        .unwrap_err();

    assert!(matches!(err, JobError::Interrupted { .. }));
    assert_eq!(err.exit_code(), 80);
    assert_eq!(h.service.call_count(Endpoint::GetRun), 0);
}
