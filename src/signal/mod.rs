//! Operator interrupts (SIGINT/SIGTERM)
//!
//! The first interrupt raises a shared flag; the poller notices it before
//! its next status fetch or during its sleep and gives up the wait with
//! `Interrupted`. Remote effects already requested (a cancel, a run-now)
//! are not rolled back. A second interrupt exits the process at once.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::error::FailureKind;

/// Signal handler state
#[derive(Debug, Default)]
pub struct SignalState {
    /// First signal received (stop waiting)
    cancel_requested: AtomicBool,
    /// Second signal received (immediate exit requested)
    immediate_exit: AtomicBool,
    /// Signal count (for tracking double-SIGINT)
    signal_count: AtomicU8,
}

/// What a received signal asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: stop the current wait
    StopWaiting,
    /// Second signal: exit now
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

impl SignalState {
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    pub fn is_immediate_exit(&self) -> bool {
        self.immediate_exit.load(Ordering::SeqCst)
    }

    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Handle a signal (SIGINT/SIGTERM)
    pub fn handle_signal(&self) -> SignalAction {
        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);

        if count == 0 {
            self.cancel_requested.store(true, Ordering::SeqCst);
            SignalAction::StopWaiting
        } else if count == 1 {
            self.immediate_exit.store(true, Ordering::SeqCst);
            SignalAction::ImmediateExit
        } else {
            SignalAction::Ignore
        }
    }
}

/// Shared flag checked by long waits
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    state: Arc<SignalState>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the operator asked to stop waiting
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancel_requested()
    }

    /// Raise the flag as if an interrupt arrived
    pub fn cancel(&self) -> SignalAction {
        self.state.handle_signal()
    }

    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the process-wide SIGINT/SIGTERM handler raising this flag.
    ///
    /// Must be called at most once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::StopWaiting => {
                eprintln!("\nReceived interrupt, abandoning the current wait...");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nReceived second interrupt, exiting immediately");
                std::process::exit(FailureKind::Interrupted as i32);
            }
            SignalAction::Ignore => {}
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_initially_clear() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        assert_eq!(flag.state().signal_count(), 0);
    }

    #[test]
    fn test_first_signal_stops_waiting() {
        let flag = CancelFlag::new();
        assert_eq!(flag.cancel(), SignalAction::StopWaiting);
        assert!(flag.is_cancelled());
        assert!(!flag.state().is_immediate_exit());
    }

    #[test]
    fn test_clones_share_state() {
        let flag = CancelFlag::new();
        let seen_by_poller = flag.clone();
        flag.cancel();
        assert!(seen_by_poller.is_cancelled());
    }

    #[test]
    fn test_second_and_third_signal() {
        let state = SignalState::default();
        state.handle_signal();
        assert_eq!(state.handle_signal(), SignalAction::ImmediateExit);
        assert!(state.is_immediate_exit());
        assert_eq!(state.handle_signal(), SignalAction::Ignore);
        assert_eq!(state.signal_count(), 3);
    }
}
