// vim: tw=80
//! Failure messages explain why a call was unexpected
#![deny(warnings)]

mod common;

use std::fmt;

use mockctl::*;

use common::{RecordingReporter, expect_failure};

#[derive(Debug)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

pub struct Secret(pub u32);

pub struct Bomb;

/// Formatting an empty `Hollow` panics
#[derive(PartialEq)]
pub struct Hollow(pub Option<u32>);

impl fmt::Debug for Hollow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hollow({})", self.0.expect("nil receiver"))
    }
}

impl fmt::Display for Bomb {
    fn fmt(&self, _f: &mut fmt::Formatter<'_>) -> fmt::Result {
        panic!("Boom!")
    }
}

#[mock]
pub trait Worker {
    fn work(&self, job: u32);
}

#[mock]
pub trait Sink {
    fn text(&self, s: &'static str);
    fn point(&self, p: Point);
    fn secret(&self, s: Secret);
    fn bomb(&self, b: Bomb);
    fn maybe(&self, x: Option<u32>);
    fn worker(&self, w: MockWorker);
    fn pair(&self, a: u32, b: u32);
    fn hollow(&self, h: Hollow);
}

fn failure<F: FnOnce(&MockSink)>(f: F) -> String {
    let ctrl = Controller::with_reporter(RecordingReporter::default(),
                                         Config::default());
    let sink = MockSink::new(&ctrl);
    expect_failure(|| f(&sink))
}

#[test]
fn display_is_preferred() {
    let msg = failure(|sink| sink.text("hello"));
    assert!(msg.starts_with(
            "Unexpected call to diagnostics::MockSink.text(hello) at "),
        "{msg}");
}

#[test]
fn debug_is_the_fallback() {
    let msg = failure(|sink| sink.point(Point { x: 1, y: 2 }));
    assert!(msg.contains(".point(Point { x: 1, y: 2 }) at "), "{msg}");
}

#[test]
fn opaque_renders_its_type() {
    let msg = failure(|sink| sink.secret(Secret(7)));
    assert!(msg.contains(".secret(diagnostics::Secret) at "), "{msg}");
}

#[test]
fn panicking_formatter() {
    let msg = failure(|sink| sink.bomb(Bomb));
    assert!(msg.contains(".bomb(diagnostics::Bomb) at "), "{msg}");
}

#[test]
fn none_is_nil() {
    let msg = failure(|sink| sink.maybe(None));
    assert!(msg.contains(".maybe(nil) at "), "{msg}");
    let msg = failure(|sink| sink.maybe(Some(3)));
    assert!(msg.contains(".maybe(Some(3)) at "), "{msg}");
}

/// A mock argument is never asked to format itself
#[test]
fn mock_renders_its_type() {
    let ctrl = Controller::with_reporter(RecordingReporter::default(),
                                         Config::default());
    let sink = MockSink::new(&ctrl);
    let worker = MockWorker::new(&ctrl);
    let msg = expect_failure(|| sink.worker(worker));
    assert!(msg.contains(".worker(diagnostics::MockWorker) at "), "{msg}");
}

#[test]
fn no_expectations() {
    let msg = failure(|sink| sink.pair(1, 2));
    assert!(msg.ends_with("because: there are no expected calls of the method \
                           \"pair\" for that receiver"),
        "{msg}");
}

/// Every candidate explains itself, in registration order
#[test]
fn every_candidate_explains() {
    let ctrl = Controller::with_reporter(RecordingReporter::default(),
                                         Config::default());
    let sink = MockSink::new(&ctrl);
    sink.expect().pair(eq(1u32), eq(3u32)).any_times();
    sink.expect().pair(eq(2u32), any()).any_times();
    let msg = expect_failure(|| sink.pair(1, 2));
    let (_, reasons) = msg.split_once(" because: ").unwrap();
    let lines = reasons.lines().collect::<Vec<_>>();
    assert!(lines[0].ends_with("doesn't match the argument at index 1."),
        "{}", lines[0]);
    assert_eq!("Got: 2 (u32)", lines[1]);
    assert_eq!("Want: is equal to 3 (u32)", lines[2]);
    assert!(lines[3].ends_with("doesn't match the argument at index 0."),
        "{}", lines[3]);
    assert_eq!("Got: 1 (u32)", lines[4]);
    assert_eq!("Want: is equal to 2 (u32)", lines[5]);
}

/// Exhausted expectations are mentioned, too
#[test]
fn exhausted_candidates_explain() {
    let ctrl = Controller::with_reporter(RecordingReporter::default(),
                                         Config::default());
    let sink = MockSink::new(&ctrl);
    sink.expect().maybe(nil());
    sink.maybe(None);
    let msg = expect_failure(|| sink.maybe(None));
    assert!(msg.ends_with("has already been called the max number of times"),
        "{msg}");
    let msg = expect_failure(|| sink.maybe(Some(1)));
    assert!(msg.contains("doesn't match the argument at index 0.\nGot: Some(1) \
                          (core::option::Option<u32>)\nWant: is nil"),
        "{msg}");
}

#[test]
fn predicates_explain() {
    let ctrl = Controller::with_reporter(RecordingReporter::default(),
                                         Config::default());
    let sink = MockSink::new(&ctrl);
    sink.expect()
        .pair(satisfies::<u32, _>(predicate::gt(5u32)), any())
        .any_times();
    let msg = expect_failure(|| sink.pair(3, 0));
    assert!(msg.contains("Want: var > 5"), "{msg}");
}

/// Matching never formats the matchers
#[test]
fn unprintable_matcher_matches() {
    let ctrl = Controller::new();
    let sink = MockSink::new(&ctrl);
    let call = sink.expect().hollow(eq(Hollow(None)));
    sink.hollow(Hollow(None));
    assert_eq!(1, call.num_calls());
    ctrl.finish();
}

/// A matcher that can't be formatted is described by its type
#[test]
fn unprintable_matcher_explains() {
    let ctrl = Controller::with_reporter(RecordingReporter::default(),
                                         Config::default());
    let sink = MockSink::new(&ctrl);
    let call = sink.expect().hollow(eq(Hollow(None))).any_times();
    assert!(call.to_string().contains(".hollow(mockctl::matcher::Equal<\
                                       diagnostics::Hollow>) at "),
        "{call}");
    let msg = expect_failure(|| sink.hollow(Hollow(Some(1))));
    assert!(msg.contains("Got: Hollow(1) (diagnostics::Hollow)\nWant: \
                          mockctl::matcher::Equal<diagnostics::Hollow>"),
        "{msg}");
}

#[test]
fn call_display() {
    let ctrl = Controller::new();
    let sink = MockSink::new(&ctrl);
    let call = sink.expect().pair(eq(1u32), any()).any_times();
    let s = call.to_string();
    assert!(s.starts_with("diagnostics::MockSink.pair(is equal to 1 (u32), \
                           is anything) at "),
        "{s}");
    assert!(format!("{call:?}").starts_with("Call(\"diagnostics::MockSink"));
}
