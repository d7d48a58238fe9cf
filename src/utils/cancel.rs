//! Cancellation handshake between an async caller and blocking work
//!
//! The caller and the worker race for one transition out of `RUNNING`.
//! Whoever wins decides the outcome: a cancelled worker never commits, and
//! a committed worker can no longer be cancelled.

use std::sync::atomic::{AtomicU8, Ordering};

const RUNNING: u8 = 0;
const CANCELLED: u8 = 1;
const COMMITTED: u8 = 2;

#[derive(Debug, Default)]
pub struct CancelFlag {
    state: AtomicU8,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    ///
    /// Returns `false` when the worker already reached its commit point;
    /// the caller must then wait for its result.
    pub fn cancel(&self) -> bool {
        match self
            .state
            .compare_exchange(RUNNING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(current) => current == CANCELLED,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    /// Claim the commit point. Returns `false` when cancellation won.
    pub fn try_commit(&self) -> bool {
        match self
            .state
            .compare_exchange(RUNNING, COMMITTED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(current) => current == COMMITTED,
        }
    }
}
