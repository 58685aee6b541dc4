// vim: tw=80
//! Helpers shared by the integration tests

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex}
};

use mockctl::TestReporter;

/// A reporter that remembers everything it was told.
///
/// `fatal` still panics, because it must not return.
#[derive(Clone, Debug, Default)]
pub struct RecordingReporter {
    pub errors: Arc<Mutex<Vec<String>>>,
    pub fatals: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    #[allow(dead_code)]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }

    #[allow(dead_code)]
    pub fn fatals(&self) -> Vec<String> {
        self.fatals.lock().unwrap().clone()
    }
}

impl TestReporter for RecordingReporter {
    fn error(&self, msg: &str) {
        self.errors.lock().unwrap().push(msg.to_owned());
    }

    fn fatal(&self, msg: &str) -> ! {
        self.fatals.lock().unwrap().push(msg.to_owned());
        panic!("{}", msg);
    }
}

/// Run `f`, which is expected to fail the test, and return its panic message.
#[allow(dead_code)]
pub fn expect_failure<F: FnOnce()>(f: F) -> String {
    let e = panic::catch_unwind(AssertUnwindSafe(f))
        .expect_err("should've failed");
    if let Some(s) = e.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = e.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else {
        String::new()
    }
}
