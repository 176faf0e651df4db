//! Cooperative shutdown on Ctrl-C.
//!
//! The first interrupt asks the session loop to stop at its next iteration
//! boundary. A second interrupt aborts the process immediately, skipping all
//! cleanup, so a read blocked on a quiet live interface can still be killed.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const RUNNING: u8 = 0;
const REQUESTED: u8 = 1;
const FORCED: u8 = 2;

/// What an interrupt did to the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// First interrupt: stop after the current iteration.
    Requested,
    /// Repeated interrupt: terminate now.
    Forced,
}

/// Shared cancellation state, cheap to clone into the signal handler.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    state: Arc<AtomicU8>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checked once per loop iteration.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Relaxed) == RUNNING
    }

    pub fn request(&self) -> Escalation {
        match self
            .state
            .compare_exchange(RUNNING, REQUESTED, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) => Escalation::Requested,
            Err(_) => {
                self.state.store(FORCED, Ordering::SeqCst);
                Escalation::Forced
            }
        }
    }

    /// Register the Ctrl-C handler for this token.
    pub fn install(&self, program: &str) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        let program = program.to_string();
        ctrlc::set_handler(move || match token.request() {
            Escalation::Requested => {
                eprintln!("\r{}: got SIGINT, terminating", program);
            }
            Escalation::Forced => {
                eprintln!("\r{}: got SIGINT again, aborting", program);
                std::process::abort();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_token_is_running() {
        assert!(ShutdownToken::new().is_running());
    }

    #[test]
    fn first_request_stops_second_forces() {
        let token = ShutdownToken::new();
        let handler_side = token.clone();

        assert_eq!(handler_side.request(), Escalation::Requested);
        assert!(!token.is_running());

        assert_eq!(handler_side.request(), Escalation::Forced);
        assert!(!token.is_running());
    }
}
