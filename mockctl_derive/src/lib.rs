// vim: tw=80
//! Proc Macros for use with Mockctl
//!
//! You probably don't want to use this crate directly.  Instead, you use
//! its reexports via the [`mockctl`](../mockctl/index.html) crate.

#![cfg_attr(feature = "nightly_derive", feature(proc_macro_diagnostic))]
extern crate proc_macro;

mod mock_trait;
mod types;

use crate::mock_trait::do_mock;

/// Generate a mock struct for a trait.
///
/// For a trait `Foo`, `#[mock]` emits the trait itself, unchanged, plus:
///
/// * `MockFoo`, which implements `Foo` by forwarding every call into the
///   [`Controller`](../mockctl/struct.Controller.html) it was created with.
/// * `MockFoo::expect()`, returning a recorder with one method per trait
///   method.  Each takes one matcher per argument and returns the registered
///   `Call`.
/// * `MockFoo::interface()`, describing the trait.
///
/// A different name for the mock struct may be given as an argument:
/// `#[mock(FakeFoo)]`.
///
/// The last parameter of a method may be marked `#[variadic]`.  It must be a
/// `Vec`, and its elements are passed to the controller as separate
/// arguments.  Its recorder method takes a `Vec<Box<dyn Matcher>>` for them.
///
/// # Restrictions
///
/// Every method needs a receiver.  Arguments and return values must be
/// `'static`.  Generic traits, generic methods, `async` methods, associated
/// types and associated constants are not supported.
///
/// # Examples
///
/// The generated code refers to `mockctl`, so this only builds from a crate
/// that depends on it.
/// ```ignore
/// use mockctl::*;
///
/// #[mock]
/// pub trait Logger {
///     fn log(&self, level: u8, #[variadic] fields: Vec<String>) -> bool;
/// }
///
/// let ctrl = Controller::new();
/// let mock = MockLogger::new(&ctrl);
/// mock.expect()
///     .log(eq(1u8), matchers![any(), any()])
///     .return_const(true);
/// assert!(mock.log(1, vec!["a".to_owned(), "b".to_owned()]));
/// ctrl.finish();
/// ```
#[proc_macro_attribute]
pub fn mock(attrs: proc_macro::TokenStream, input: proc_macro::TokenStream)
    -> proc_macro::TokenStream
{
    do_mock(attrs.into(), input.into()).into()
}
