// vim: tw=80
//! Cancellation signal raised on the first fatal failure.

use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::{Duration, Instant}
};

#[derive(Debug, Default)]
struct Inner {
    cancelled: Mutex<bool>,
    cvar: Condvar,
}

/// Shared cancellation token.
///
/// Code under test that blocks on work driven by a mock can watch a token
/// associated with the [`Controller`](crate::Controller).  The controller
/// cancels it as soon as it reports a fatal failure, so the blocked code can
/// give up instead of hanging until the test harness times out.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    /// Create a new non-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation and wake every waiter.
    ///
    /// Returns `true` only for the call that actually cancelled the token.
    pub fn cancel(&self) -> bool {
        let mut cancelled = self.inner.cancelled.lock()
            .unwrap_or_else(PoisonError::into_inner);
        let first = !*cancelled;
        *cancelled = true;
        self.inner.cvar.notify_all();
        first
    }

    /// Check if cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Block until the token is cancelled or `timeout` elapses.  Returns
    /// whether the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.inner.cancelled.lock()
            .unwrap_or_else(PoisonError::into_inner);
        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            cancelled = self.inner.cvar.wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        *cancelled
    }
}
