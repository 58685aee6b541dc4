// vim: tw=80
//! Typed failures produced while matching and dispatching calls.
//!
//! None of these escape to the user directly.  They are rendered into the
//! messages handed to the controller's [`TestReporter`](crate::TestReporter).

use std::panic::Location;

use thiserror::Error;

/// Why one expectation rejected one call.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MatchError {
    #[error("expected call at {origin} has the wrong number of arguments. \
             Got: {got}, want: {want}")]
    ArgCount {
        origin: &'static Location<'static>,
        got: usize,
        want: usize,
    },
    #[error("expected call at {origin} has the wrong number of matchers. \
             Got: {got}, want: {want}")]
    MatcherCount {
        origin: &'static Location<'static>,
        got: usize,
        want: usize,
    },
    #[error("expected call at {origin} doesn't match the argument at index \
             {index}.\nGot: {got}\nWant: {want}")]
    Argument {
        origin: &'static Location<'static>,
        index: usize,
        got: String,
        want: String,
    },
    #[error("expected call at {origin} doesn't match the variadic \
             arguments starting at index {index}.\nGot: [{got}]\nWant: {want}")]
    Variadic {
        origin: &'static Location<'static>,
        index: usize,
        got: String,
        want: String,
    },
    #[error("expected call at {origin} doesn't have a prerequisite call \
             satisfied:\n{prereq}\nshould be called before:\n{call}")]
    Prerequisite {
        origin: &'static Location<'static>,
        call: String,
        prereq: String,
    },
    #[error("expected call at {origin} has already been called the max \
             number of times")]
    Exhausted {
        origin: &'static Location<'static>,
    },
    #[error("expected call at {origin} was retired by a later call that \
             depends on it")]
    Retired {
        origin: &'static Location<'static>,
    },
}

/// Why a dispatch found no eligible expectation.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum DispatchError {
    #[error("there are no expected calls of the method \"{method}\" for that \
             receiver")]
    NoExpectations {
        method: String,
    },
    #[error("{}", join_reasons(.0))]
    NoMatch(Vec<MatchError>),
}

fn join_reasons(reasons: &[MatchError]) -> String {
    reasons.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// A prerequisite edge that may not be added.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum OrderError {
    #[error("Loop in call order: {call} is a prerequisite to {prereq} \
             (possibly indirectly).")]
    Cycle {
        call: String,
        prereq: String,
    },
    #[error("A call isn't allowed to be its own prerequisite: {call}")]
    OwnPrerequisite {
        call: String,
    },
    #[error("Calls belonging to different controllers can't be ordered: \
             {call} after {prereq}")]
    ForeignController {
        call: String,
        prereq: String,
    },
}

/// Generated code could not turn an action's results into its return type.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ReturnError {
    #[error("{method} returned no value. Set one with return_const, returns \
             or returning")]
    Missing {
        method: String,
    },
    #[error("wrong type of value for {method}: got {got}, want {want}")]
    WrongType {
        method: String,
        got: &'static str,
        want: &'static str,
    },
    #[error("wrong number of values returned by {method}: got {got}, want \
             {want}")]
    WrongCount {
        method: String,
        got: usize,
        want: usize,
    },
}

#[cfg(test)]
mod t {
    use super::*;

    #[test]
    fn argument_mismatch_message() {
        let e = MatchError::Argument {
            origin: Location::caller(),
            index: 1,
            got: "3 (i32)".to_owned(),
            want: "is equal to 4 (i32)".to_owned(),
        };
        let s = e.to_string();
        assert!(s.contains("doesn't match the argument at index 1.\n"));
        assert!(s.ends_with("Got: 3 (i32)\nWant: is equal to 4 (i32)"));
    }

    #[test]
    fn no_match_lists_every_reason() {
        let origin = Location::caller();
        let e = DispatchError::NoMatch(vec![
            MatchError::Exhausted { origin },
            MatchError::ArgCount { origin, got: 1, want: 2 },
        ]);
        let s = e.to_string();
        let lines = s.lines().collect::<Vec<_>>();
        assert_eq!(2, lines.len());
        assert!(lines[0].ends_with("already been called the max number of \
                                    times"));
        assert!(lines[1].ends_with("Got: 1, want: 2"));
    }

    #[test]
    fn retired_is_not_exhausted() {
        let origin = Location::caller();
        let s = MatchError::Retired { origin }.to_string();
        assert!(s.ends_with("was retired by a later call that depends on it"));
        assert!(!s.contains("max number of times"));
    }

    #[test]
    fn cycle_message() {
        let e = OrderError::Cycle {
            call: "X.a()".to_owned(),
            prereq: "X.b()".to_owned()
        };
        assert_eq!(e.to_string(),
            "Loop in call order: X.a() is a prerequisite to X.b() (possibly \
             indirectly).");
    }
}
