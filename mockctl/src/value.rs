// vim: tw=80
//! Type-erased argument and return values.
//!
//! Generated mocks box every argument into a [`Value`] before forwarding the
//! call to the [`Controller`](crate::Controller), and unbox their return
//! values the same way.  A `Value` remembers how it may be rendered for
//! diagnostics, which lets failure messages print arguments without ever
//! calling back into a mock.

use std::{
    any::{self, Any, TypeId},
    cell::Cell,
    fmt,
    sync::atomic::{AtomicUsize, Ordering}
};

use cfg_if::cfg_if;

/// Marker trait implemented by every generated mock.
///
/// A value whose type implements `MockInstance` is rendered as its type name
/// in diagnostics.  Its own `Debug` or `Display` implementation is never
/// invoked, because that implementation might itself be mocked and would try
/// to take the lock of the controller that is busy reporting the failure.
pub trait MockInstance: Any {}

/// Identity of the object that receives mocked calls.
///
/// Every mock instance owns exactly one `Receiver`.  Two receivers compare
/// equal only if one is a copy of the other.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Receiver {
    id: usize,
    type_name: &'static str,
}

impl Receiver {
    /// Allocate a fresh identity for a receiver of type `T`.
    pub fn new<T: ?Sized + 'static>() -> Self {
        static NEXT_ID: AtomicUsize = AtomicUsize::new(0);
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Receiver { id, type_name: any::type_name::<T>() }
    }

    /// Name of the receiver's concrete type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

type FmtFn = fn(&dyn Any, &mut fmt::Formatter<'_>) -> fmt::Result;

#[derive(Clone, Copy)]
enum Repr {
    /// A generated mock.  Only its type name may be printed.
    Mock,
    /// An empty pointer-like value, such as `None`.
    Nil,
    Fmt(FmtFn),
    /// Neither `Debug` nor `Display`
    Opaque,
}

fn fmt_debug<T: fmt::Debug + 'static>(v: &dyn Any, f: &mut fmt::Formatter<'_>)
    -> fmt::Result
{
    match v.downcast_ref::<T>() {
        Some(v) => fmt::Debug::fmt(v, f),
        None => f.write_str("?")
    }
}

fn fmt_display<T: fmt::Display + 'static>(v: &dyn Any,
                                          f: &mut fmt::Formatter<'_>)
    -> fmt::Result
{
    match v.downcast_ref::<T>() {
        Some(v) => fmt::Display::fmt(v, f),
        None => f.write_str("?")
    }
}

struct Rendered<'a>(FmtFn, &'a dyn Any);

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.0)(self.1, f)
    }
}

cfg_if! {
    if #[cfg(panic = "unwind")] {
        /// Run a formatting closure, swallowing any panic it raises.
        pub(crate) fn guarded<T, F: FnOnce() -> T>(f: F) -> Option<T> {
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)).ok()
        }
    } else {
        pub(crate) fn guarded<T, F: FnOnce() -> T>(f: F) -> Option<T> {
            Some(f())
        }
    }
}

/// A single boxed argument or return value.
pub struct Value {
    inner: Box<dyn Any>,
    type_name: &'static str,
    repr: Repr,
}

impl Value {
    fn with_repr<T: 'static>(v: T, repr: Repr) -> Self {
        Value {
            inner: Box::new(v),
            type_name: any::type_name::<T>(),
            repr
        }
    }

    /// Box a value that will be rendered with its `Debug` implementation.
    pub fn new<T: fmt::Debug + 'static>(v: T) -> Self {
        Value::with_repr(v, Repr::Fmt(fmt_debug::<T>))
    }

    /// Box a value that will be rendered with its `Display` implementation.
    pub fn display<T: fmt::Display + 'static>(v: T) -> Self {
        Value::with_repr(v, Repr::Fmt(fmt_display::<T>))
    }

    /// Box a generated mock.  It will be rendered as its type name only.
    pub fn mock<T: MockInstance>(v: T) -> Self {
        Value::with_repr(v, Repr::Mock)
    }

    /// Box an optional value.  `None` is considered nil and renders as `nil`.
    pub fn option<T: fmt::Debug + 'static>(v: Option<T>) -> Self {
        let repr = if v.is_none() {
            Repr::Nil
        } else {
            Repr::Fmt(fmt_debug::<Option<T>>)
        };
        Value::with_repr(v, repr)
    }

    /// Box a value that has no formatting capability at all.
    pub fn opaque<T: 'static>(v: T) -> Self {
        Value::with_repr(v, Repr::Opaque)
    }

    /// Borrow the contents as a `T`, if that is what this `Value` holds.
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Unbox the contents.  On a type mismatch the original `Value` is
    /// handed back.
    pub fn downcast<T: 'static>(self) -> Result<T, Value> {
        let Value { inner, type_name, repr } = self;
        inner.downcast::<T>()
            .map(|b| *b)
            .map_err(|inner| Value { inner, type_name, repr })
    }

    /// Does this `Value` hold a `T`?
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }

    /// Is this an empty pointer-like value?
    pub fn is_nil(&self) -> bool {
        matches!(self.repr, Repr::Nil)
    }

    /// Does this `Value` hold a generated mock?
    pub fn is_mock(&self) -> bool {
        matches!(self.repr, Repr::Mock)
    }

    /// `TypeId` of the contents (not of the box).
    pub fn type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    /// Name of the contents' type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Produce a human-readable rendering for failure messages.
    ///
    /// Never calls into a mock, never panics.  If the value's own formatter
    /// panics the type name is used instead.
    pub fn render(&self) -> String {
        match self.repr {
            Repr::Mock | Repr::Opaque => self.type_name.to_owned(),
            Repr::Nil => "nil".to_owned(),
            Repr::Fmt(f) => {
                let inner = &*self.inner;
                guarded(|| Rendered(f, inner).to_string())
                    .unwrap_or_else(|| self.type_name.to_owned())
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Render a sequence of values as `a, b, c`.
pub(crate) fn render_all(values: &[Value]) -> String {
    values.iter()
        .map(Value::render)
        .collect::<Vec<_>>()
        .join(", ")
}

// The following items select the richest rendering available for a value of
// concrete type, using autoref-based method resolution.  They are only meant
// to be used through the `value!` macro.

#[doc(hidden)]
pub struct Wrap<T>(Cell<Option<T>>);

impl<T> Wrap<T> {
    pub fn new(v: T) -> Self {
        Wrap(Cell::new(Some(v)))
    }

    fn take(&self) -> T {
        self.0.take().expect("value! consumed its argument twice")
    }
}

#[doc(hidden)]
pub trait ViaMock {
    fn into_value(&self) -> Value;
}

impl<T: MockInstance> ViaMock for &&&&Wrap<T> {
    fn into_value(&self) -> Value {
        Value::mock(self.take())
    }
}

#[doc(hidden)]
pub trait ViaOption {
    fn into_value(&self) -> Value;
}

impl<T: fmt::Debug + 'static> ViaOption for &&&Wrap<Option<T>> {
    fn into_value(&self) -> Value {
        Value::option(self.take())
    }
}

#[doc(hidden)]
pub trait ViaDisplay {
    fn into_value(&self) -> Value;
}

impl<T: fmt::Display + 'static> ViaDisplay for &&Wrap<T> {
    fn into_value(&self) -> Value {
        Value::display(self.take())
    }
}

#[doc(hidden)]
pub trait ViaDebug {
    fn into_value(&self) -> Value;
}

impl<T: fmt::Debug + 'static> ViaDebug for &Wrap<T> {
    fn into_value(&self) -> Value {
        Value::new(self.take())
    }
}

#[doc(hidden)]
pub trait ViaOpaque {
    fn into_value(&self) -> Value;
}

impl<T: 'static> ViaOpaque for Wrap<T> {
    fn into_value(&self) -> Value {
        Value::opaque(self.take())
    }
}

/// Box an expression of concrete type into a [`Value`], choosing the best
/// available rendering: mocks print their type name, `None` prints `nil`,
/// then `Display`, then `Debug`, and finally just the type name.
///
/// # Examples
/// ```
/// # use mockctl::*;
/// assert_eq!("five", value!("five").render());
/// assert_eq!("nil", value!(None::<u32>).render());
/// assert_eq!("[1, 2]", value!(vec![1, 2]).render());
/// ```
#[macro_export]
macro_rules! value {
    ($e:expr) => {{
        #[allow(unused_imports)]
        use $crate::value::{
            ViaDebug, ViaDisplay, ViaMock, ViaOpaque, ViaOption
        };
        (&&&&&$crate::value::Wrap::new($e)).into_value()
    }};
}

/// Box several expressions with [`value!`].
///
/// # Examples
/// ```
/// # use mockctl::*;
/// let args = values![1u32, "two"];
/// assert_eq!(2, args.len());
/// ```
#[macro_export]
macro_rules! values {
    ($($e:expr),* $(,)?) => {
        ::std::vec![$($crate::value!($e)),*]
    };
}
