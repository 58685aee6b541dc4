// vim: tw=80
//! Failure sinks.

use std::sync::{Arc, Mutex, PoisonError};

/// Where a [`Controller`](crate::Controller) sends its failures.
///
/// The controller never holds its own lock while calling into a reporter.
pub trait TestReporter: Send + Sync {
    /// Record a failure and keep going.
    fn error(&self, msg: &str);

    /// Record a failure and stop the test.
    fn fatal(&self, msg: &str) -> !;
}

impl<R: TestReporter + ?Sized> TestReporter for Arc<R> {
    fn error(&self, msg: &str) {
        (**self).error(msg)
    }

    fn fatal(&self, msg: &str) -> ! {
        (**self).fatal(msg)
    }
}

/// The default reporter: fails the current test by panicking.
///
/// Messages passed to [`error`](TestReporter::error) are collected and
/// become part of the panic message of the next [`fatal`](TestReporter::fatal).
#[derive(Debug, Default)]
pub struct PanicReporter {
    errors: Mutex<Vec<String>>,
}

impl PanicReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TestReporter for PanicReporter {
    fn error(&self, msg: &str) {
        tracing::error!("{}", msg);
        self.errors.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(msg.to_owned());
    }

    fn fatal(&self, msg: &str) -> ! {
        let mut errors = std::mem::take(&mut *self.errors.lock()
            .unwrap_or_else(PoisonError::into_inner));
        errors.push(msg.to_owned());
        panic!("{}", errors.join("\n"));
    }
}

#[cfg(test)]
mod t {
    use super::*;

    #[test]
    #[should_panic(expected = "first\nsecond\nstop")]
    fn fatal_includes_errors() {
        let r = PanicReporter::new();
        r.error("first");
        r.error("second");
        r.fatal("stop");
    }

    #[test]
    #[should_panic(expected = "only")]
    fn fatal_alone() {
        PanicReporter::new().fatal("only");
    }
}
