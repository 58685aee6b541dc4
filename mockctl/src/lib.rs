// vim: tw=80
//! A controller-driven mock object library for Rust.
//!
//! Mockctl splits mocking in two.  A [`Controller`] owns every expectation of
//! a test, matches incoming calls against them, enforces their cardinality and
//! ordering, and verifies them at the end.  Mock objects are thin: each mocked
//! method boxes its arguments into [`Value`]s and forwards them, together
//! with its receiver's identity and its own name, to
//! [`Controller::call`].  The [`#[mock]`](mock) attribute writes such mocks
//! for traits.
//!
//! # Usage
//!
//! * Create a [`Controller`].  One per test.
//! * Create mocks attached to it.
//! * Register expectations.  Each has one [`Matcher`] per argument, a
//!   cardinality (exactly once, unless changed), optional prerequisites, and
//!   optional actions that produce its return values.
//! * Run the code under test.
//! * Call [`Controller::finish`], or just let the mocks and the controller
//!   drop.  Every expectation that was not called often enough is reported.
//!
//! ```
//! use mockctl::*;
//!
//! #[mock]
//! trait Greeter {
//!     fn greet(&self, name: String) -> String;
//! }
//!
//! let ctrl = Controller::new();
//! let mock = MockGreeter::new(&ctrl);
//! mock.expect()
//!     .greet(eq(String::from("Alice")))
//!     .return_const(String::from("Hello, Alice"));
//! assert_eq!("Hello, Alice", mock.greet(String::from("Alice")));
//! ctrl.finish();
//! ```
//!
//! # Matching
//!
//! When several expectations exist for the same method of the same receiver,
//! the controller's [`OrderingPolicy`] decides which one gets a call:
//!
//! * [`Fifo`](OrderingPolicy::Fifo), the default: the oldest expectation that
//!   matches.  A broad expectation registered after a narrow one is only
//!   reached once the narrow one is exhausted.
//! * [`Overridable`](OrderingPolicy::Overridable): the newest expectation
//!   that matches.  Older ones no longer need to be satisfied.
//! * [`OverridableArgsAware`](OrderingPolicy::OverridableArgsAware):
//!   registering an expectation with the same matchers as an existing one
//!   replaces it in place; otherwise like `Fifo`.  "Same" means structurally
//!   equal: `eq(5)` is the same as `eq(5)`, but `any()` is never the same as
//!   `of_type::<i32>()`.
//!
//! An expectation whose prerequisites (see [`Call::after`]) are not yet
//! satisfied is skipped, as is one that was already called its maximum
//! number of times.  If nothing is left the call is unexpected, and the test
//! fails with a message that explains why each candidate was rejected.
//!
//! # Cardinality
//!
//! Expectations default to exactly one call.  [`Call::times`],
//! [`Call::min_times`], [`Call::max_times`], [`Call::any_times`] and
//! [`Call::never`] change that.  Raising the minimum of a default expectation
//! also lifts its maximum, and lowering the maximum also drops its minimum
//! to zero.
//!
//! # Ordering
//!
//! ```
//! # use mockctl::*;
//! # #[mock]
//! # trait Door {
//! #     fn open(&self);
//! #     fn close(&self);
//! # }
//! let ctrl = Controller::new();
//! let door = MockDoor::new(&ctrl);
//! let open = door.expect().open();
//! door.expect().close().after(&open);
//! door.open();
//! door.close();
//! ```
//!
//! A prerequisite loop fails the test as soon as it is declared.  Once an
//! expectation with prerequisites is matched, its prerequisites are retired:
//! they can't match again.
//!
//! # Variadic methods
//!
//! A method's last parameter may be marked `#[variadic]`.  Its recorder then
//! takes either one matcher per variadic argument, or a single matcher such
//! as [`any`], [`nil`], [`len`] or [`in_any_order`] for all of them.
//!
//! ```
//! # use mockctl::*;
//! #[mock]
//! pub trait Logger {
//!     fn log(&self, level: u8, #[variadic] fields: Vec<String>) -> bool;
//! }
//!
//! let ctrl = Controller::new();
//! let mock = MockLogger::new(&ctrl);
//! mock.expect()
//!     .log(eq(1u8), matchers![any(), any()])
//!     .return_const(true);
//! mock.expect()
//!     .log(eq(2u8), matchers![len::<Vec<String>>(3)])
//!     .return_const(false);
//! assert!(mock.log(1, vec!["a".to_owned(), "b".to_owned()]));
//! assert!(!mock.log(2, vec![String::new(); 3]));
//! ctrl.finish();
//! ```
//!
//! # Diagnostics
//!
//! Arguments are rendered with their `Display` implementation if they have
//! one, otherwise with `Debug`.  `None` renders as `nil`.  Mocks render as
//! their type name, so that rendering never calls back into a controller.
//! A formatter that panics is replaced by the value's type name.
//!
//! # Concurrency
//!
//! A `Controller` may be shared by any number of threads.  Matching a call
//! and counting it happen in one critical section.  Actions run outside of
//! it, so an action may itself call other mocks of the same controller.
//! Mocks owned by an action are verified once the action is released: when
//! the mock it belongs to is dropped, or when the controller finishes.
//! [`Controller::with_context`] returns a [`CancellationToken`] that is
//! cancelled on the first fatal failure, which lets threads blocked on the
//! code under test give up early.

mod call_set;
mod cancel;
mod controller;
pub mod error;
mod expectation;
pub mod matcher;
pub mod model;
mod reporter;
pub mod value;

pub use cancel::CancellationToken;
pub use controller::{Config, Controller, OrderingPolicy};
pub use expectation::{Call, in_order};
pub use matcher::*;
pub use model::{Interface, Method, MethodType, Parameter};
pub use reporter::{PanicReporter, TestReporter};
pub use value::{MockInstance, Receiver, Value};

pub use mockctl_derive::mock;
pub use predicates::prelude::{Predicate, predicate};
