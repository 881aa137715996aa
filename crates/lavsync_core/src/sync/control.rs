//! Cooperative cancellation and wall-clock deadlines.
//!
//! Long-running stages poll a [`Checkpoint`] between algorithms, between DTW
//! scales and between blocks of FFT frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Handle for cancelling a running synchronization from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Why a stage stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Cancelled,
    TimedOut,
}

impl std::fmt::Display for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interrupt::Cancelled => write!(f, "cancelled"),
            Interrupt::TimedOut => write!(f, "deadline exceeded"),
        }
    }
}

/// Cancellation token plus optional deadline, polled at coarse granularity.
#[derive(Debug, Clone, Default)]
pub struct Checkpoint {
    cancel: Option<CancelToken>,
    deadline: Option<Instant>,
}

impl Checkpoint {
    pub fn new(cancel: Option<CancelToken>, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    /// A checkpoint that never interrupts.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Err if the caller cancelled or the deadline passed. Cancellation wins
    /// when both hold.
    pub fn check(&self) -> Result<(), Interrupt> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(Interrupt::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Interrupt::TimedOut);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn cancel_is_visible_through_clones() {
        let token = CancelToken::new();
        let checkpoint = Checkpoint::new(Some(token.clone()), None);
        assert!(checkpoint.check().is_ok());

        token.cancel();
        assert_eq!(checkpoint.check(), Err(Interrupt::Cancelled));
    }

    #[test]
    fn past_deadline_times_out() {
        let past = Instant::now() - Duration::from_millis(1);
        let checkpoint = Checkpoint::new(None, Some(past));
        assert_eq!(checkpoint.check(), Err(Interrupt::TimedOut));

        let future = Instant::now() + Duration::from_secs(3600);
        assert!(Checkpoint::new(None, Some(future)).check().is_ok());
    }

    #[test]
    fn cancellation_takes_precedence() {
        let token = CancelToken::new();
        token.cancel();
        let past = Instant::now() - Duration::from_millis(1);
        let checkpoint = Checkpoint::new(Some(token), Some(past));
        assert_eq!(checkpoint.check(), Err(Interrupt::Cancelled));
    }

    #[test]
    fn unbounded_never_interrupts() {
        assert!(Checkpoint::unbounded().check().is_ok());
    }
}
