// vim: tw=80
//! Argument matchers.
//!
//! A [`Matcher`] decides whether one call argument satisfies one position of
//! an expectation.  Matchers are pure: evaluating one never changes its
//! state, so the same matcher may be evaluated any number of times against
//! any number of calls.

use std::{
    any,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    fmt,
    marker::PhantomData
};

use downcast::{downcast, Any};
use predicates::Predicate;
use predicates_tree::CaseTreeExt;

use crate::value::{Value, guarded};

/// A predicate over a single argument.
pub trait Matcher: Any + Send + Sync + fmt::Display {
    /// Does `arg` satisfy this matcher?
    fn matches(&self, arg: &Value) -> bool;

    /// Match the whole variadic tail of a call at once.
    ///
    /// Used when a method's final parameter is variadic and this matcher sits
    /// in the variadic position.  Most matchers can't say anything about a
    /// group of arguments, and return `None`.
    fn matches_tail(&self, _tail: &[Value]) -> Option<bool> {
        None
    }

    /// Structural equality: same kind of matcher, built from equal
    /// parameters.  Two matchers that merely accept the same values are not
    /// structurally equal.
    fn same_as(&self, _other: &dyn Matcher) -> bool {
        false
    }

    /// Optional, more detailed explanation of why `arg` did not match.
    fn explain(&self, _arg: &Value) -> Option<String> {
        None
    }
}

downcast!(dyn Matcher);

impl fmt::Debug for dyn Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Describe a matcher for a failure message.  A matcher whose description
/// panics is described by its type name instead.
pub(crate) fn describe(m: &dyn Matcher) -> String {
    guarded(|| m.to_string())
        .unwrap_or_else(|| Any::type_name(m).to_owned())
}

/// Describe a list of matchers as `a, b, c`.
pub(crate) fn describe_all(ms: &[Box<dyn Matcher>]) -> String {
    ms.iter()
        .map(|m| describe(m.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compare two matcher lists structurally, position by position.
pub(crate) fn same_matchers(a: &[Box<dyn Matcher>], b: &[Box<dyn Matcher>])
    -> bool
{
    a.len() == b.len() &&
        a.iter().zip(b.iter()).all(|(x, y)| x.same_as(y.as_ref()))
}

/// Build a `Vec<Box<dyn Matcher>>` from a list of matchers.
///
/// # Examples
/// ```
/// # use mockctl::*;
/// let m = matchers![eq(5u32), any()];
/// assert_eq!(2, m.len());
/// ```
#[macro_export]
macro_rules! matchers {
    ($($m:expr),* $(,)?) => {
        ::std::vec![$(
            ::std::boxed::Box::new($m)
                as ::std::boxed::Box<dyn $crate::Matcher>
        ),*]
    };
}

/// Matches anything.  See [`any`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Anything;

impl Matcher for Anything {
    fn matches(&self, _arg: &Value) -> bool {
        true
    }

    fn matches_tail(&self, _tail: &[Value]) -> Option<bool> {
        Some(true)
    }

    fn same_as(&self, other: &dyn Matcher) -> bool {
        other.is::<Anything>()
    }
}

impl fmt::Display for Anything {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("is anything")
    }
}

/// Matches any value at all.
pub fn any() -> Anything {
    Anything
}

/// Matches values equal to the wrapped one.  See [`eq`].
#[derive(Clone, Debug)]
pub struct Equal<T>(T);

impl<T> Equal<T>
    where T: PartialEq + fmt::Debug + Send + Sync + 'static
{
    // A string literal expectation also matches an owned String argument.
    fn matches_str(&self, arg: &Value) -> bool {
        let expected: &dyn any::Any = &self.0;
        match (expected.downcast_ref::<&'static str>(),
               arg.downcast_ref::<String>())
        {
            (Some(e), Some(a)) => e == a,
            _ => false
        }
    }
}

impl<T> Matcher for Equal<T>
    where T: PartialEq + fmt::Debug + Send + Sync + 'static
{
    fn matches(&self, arg: &Value) -> bool {
        match arg.downcast_ref::<T>() {
            Some(a) => *a == self.0,
            None => self.matches_str(arg)
        }
    }

    fn same_as(&self, other: &dyn Matcher) -> bool {
        other.downcast_ref::<Equal<T>>()
            .map_or(false, |o| o.0 == self.0)
    }
}

impl<T: fmt::Debug> fmt::Display for Equal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "is equal to {:?} ({})", self.0, any::type_name::<T>())
    }
}

/// Matches arguments of type `T` equal to `x`.
pub fn eq<T>(x: T) -> Equal<T>
    where T: PartialEq + fmt::Debug + Send + Sync + 'static
{
    Equal(x)
}

/// Matches nil values.  See [`nil`].
#[derive(Clone, Copy, Debug, Default)]
pub struct Nil;

impl Matcher for Nil {
    fn matches(&self, arg: &Value) -> bool {
        arg.is_nil()
    }

    fn matches_tail(&self, tail: &[Value]) -> Option<bool> {
        Some(tail.is_empty())
    }

    fn same_as(&self, other: &dyn Matcher) -> bool {
        other.is::<Nil>()
    }
}

impl fmt::Display for Nil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("is nil")
    }
}

/// Matches `None`, or an empty variadic tail.
pub fn nil() -> Nil {
    Nil
}

/// Inverts another matcher.  See [`not`].
pub struct Not(Box<dyn Matcher>);

impl Matcher for Not {
    fn matches(&self, arg: &Value) -> bool {
        !self.0.matches(arg)
    }

    fn matches_tail(&self, tail: &[Value]) -> Option<bool> {
        self.0.matches_tail(tail).map(|m| !m)
    }

    fn same_as(&self, other: &dyn Matcher) -> bool {
        other.downcast_ref::<Not>()
            .map_or(false, |o| self.0.same_as(o.0.as_ref()))
    }
}

impl fmt::Display for Not {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not({})", self.0)
    }
}

/// Matches anything `m` does not match.
pub fn not<M: Matcher>(m: M) -> Not {
    Not(Box::new(m))
}

/// Types whose size can be checked with [`len`].
pub trait Length {
    fn length(&self) -> usize;
}

impl Length for String {
    fn length(&self) -> usize {
        self.len()
    }
}

impl Length for &'static str {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<T> Length for &'static [T] {
    fn length(&self) -> usize {
        self.len()
    }
}

impl<T, const N: usize> Length for [T; N] {
    fn length(&self) -> usize {
        N
    }
}

macro_rules! length_via_len {
    ($($ty:ty => [$($g:ident),*]),* $(,)?) => {
        $(
            impl<$($g),*> Length for $ty {
                fn length(&self) -> usize {
                    self.len()
                }
            }
        )*
    }
}

length_via_len! {
    Vec<T> => [T],
    VecDeque<T> => [T],
    HashSet<T, S> => [T, S],
    BTreeSet<T> => [T],
    HashMap<K, V, S> => [K, V, S],
    BTreeMap<K, V> => [K, V],
}

/// Matches collections of a given size.  See [`len`].
pub struct Len<T> {
    n: usize,
    _t: PhantomData<fn() -> T>,
}

impl<T: Length + 'static> Matcher for Len<T> {
    fn matches(&self, arg: &Value) -> bool {
        arg.downcast_ref::<T>()
            .map_or(false, |a| a.length() == self.n)
    }

    fn matches_tail(&self, tail: &[Value]) -> Option<bool> {
        Some(tail.len() == self.n)
    }

    fn same_as(&self, other: &dyn Matcher) -> bool {
        other.downcast_ref::<Len<T>>()
            .map_or(false, |o| o.n == self.n)
    }
}

impl<T> fmt::Display for Len<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "has length {}", self.n)
    }
}

/// Matches a `T` whose length is `n`.
///
/// In a variadic position, matches a tail of exactly `n` arguments.
pub fn len<T: Length + 'static>(n: usize) -> Len<T> {
    Len { n, _t: PhantomData }
}

/// Matches any value of one particular type.  See [`of_type`].
pub struct OfType<T>(PhantomData<fn() -> T>);

impl<T: 'static> Matcher for OfType<T> {
    fn matches(&self, arg: &Value) -> bool {
        arg.is::<T>()
    }

    fn same_as(&self, other: &dyn Matcher) -> bool {
        other.is::<OfType<T>>()
    }
}

impl<T> fmt::Display for OfType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "is assignable to {}", any::type_name::<T>())
    }
}

/// Matches any argument whose type is `T`, whatever its value.
pub fn of_type<T: 'static>() -> OfType<T> {
    OfType(PhantomData)
}

/// Conjunction of several matchers.  See [`all`].
pub struct All(Vec<Box<dyn Matcher>>);

impl Matcher for All {
    fn matches(&self, arg: &Value) -> bool {
        self.0.iter().all(|m| m.matches(arg))
    }

    // Only when every part can judge the tail.
    fn matches_tail(&self, tail: &[Value]) -> Option<bool> {
        self.0.iter()
            .map(|m| m.matches_tail(tail))
            .collect::<Option<Vec<_>>>()
            .map(|r| r.into_iter().all(|m| m))
    }

    fn same_as(&self, other: &dyn Matcher) -> bool {
        other.downcast_ref::<All>()
            .map_or(false, |o| same_matchers(&self.0, &o.0))
    }

    fn explain(&self, arg: &Value) -> Option<String> {
        self.0.iter()
            .find(|m| !m.matches(arg))
            .map(|m| m.explain(arg)
                 .unwrap_or_else(|| format!("{} does not {}", arg, m)))
    }
}

impl fmt::Display for All {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = self.0.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        f.write_str(&parts.join("; "))
    }
}

/// Matches if every one of `ms` matches.
///
/// # Examples
/// ```
/// # use mockctl::*;
/// let m = all(matchers![not(eq(3u32)), of_type::<u32>()]);
/// assert!(m.matches(&Value::new(4u32)));
/// assert!(!m.matches(&Value::new(3u32)));
/// ```
pub fn all(ms: Vec<Box<dyn Matcher>>) -> All {
    All(ms)
}

/// Matches values satisfying a closure.  See [`cond`].
pub struct Cond<T, F> {
    f: F,
    _t: PhantomData<fn(&T)>,
}

impl<T, F> Matcher for Cond<T, F>
    where T: 'static, F: Fn(&T) -> bool + Send + Sync + 'static
{
    fn matches(&self, arg: &Value) -> bool {
        arg.downcast_ref::<T>().map_or(false, |a| (self.f)(a))
    }
}

impl<T, F> fmt::Display for Cond<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("adheres to a custom condition")
    }
}

/// Matches any `T` for which `f` returns true.
pub fn cond<T, F>(f: F) -> Cond<T, F>
    where T: 'static, F: Fn(&T) -> bool + Send + Sync + 'static
{
    Cond { f, _t: PhantomData }
}

/// Matches a collection holding the same elements in any order.  See
/// [`in_any_order`].
pub struct InAnyOrder<T>(Vec<T>);

impl<T: PartialEq> InAnyOrder<T> {
    fn same_elements<'a, I>(&self, actual: I) -> bool
        where I: ExactSizeIterator<Item = Option<&'a T>>, T: 'a
    {
        if actual.len() != self.0.len() {
            return false;
        }
        let mut used = vec![false; self.0.len()];
        for a in actual {
            let Some(a) = a else { return false; };
            let slot = self.0.iter()
                .enumerate()
                .position(|(i, e)| !used[i] && e == a);
            match slot {
                Some(i) => used[i] = true,
                None => return false
            }
        }
        true
    }
}

impl<T> Matcher for InAnyOrder<T>
    where T: PartialEq + fmt::Debug + Send + Sync + 'static
{
    fn matches(&self, arg: &Value) -> bool {
        arg.downcast_ref::<Vec<T>>()
            .map_or(false, |v| self.same_elements(v.iter().map(Some)))
    }

    fn matches_tail(&self, tail: &[Value]) -> Option<bool> {
        Some(self.same_elements(tail.iter().map(|v| v.downcast_ref::<T>())))
    }

    fn same_as(&self, other: &dyn Matcher) -> bool {
        other.downcast_ref::<InAnyOrder<T>>()
            .map_or(false, |o| o.0 == self.0)
    }
}

impl<T: fmt::Debug> fmt::Display for InAnyOrder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "has the same elements as {:?}", self.0)
    }
}

/// Matches a `Vec<T>` (or a variadic tail of `T`) that is a permutation of
/// `elements`.
pub fn in_any_order<T>(elements: Vec<T>) -> InAnyOrder<T>
    where T: PartialEq + fmt::Debug + Send + Sync + 'static
{
    InAnyOrder(elements)
}

/// Adapts any [`Predicate`] from the `predicates` crate.  See [`satisfies`].
pub struct Satisfies<T, P> {
    p: P,
    _t: PhantomData<fn(&T)>,
}

impl<T, P> Matcher for Satisfies<T, P>
    where T: 'static, P: Predicate<T> + Send + Sync + 'static
{
    fn matches(&self, arg: &Value) -> bool {
        arg.downcast_ref::<T>().map_or(false, |a| self.p.eval(a))
    }

    fn explain(&self, arg: &Value) -> Option<String> {
        let a = arg.downcast_ref::<T>()?;
        self.p.find_case(false, a)
            .map(|case| case.tree().to_string())
    }
}

impl<T, P: fmt::Display> fmt::Display for Satisfies<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.p, f)
    }
}

/// Matches any `T` accepted by predicate `p`.
///
/// # Examples
/// ```
/// # use mockctl::*;
/// let m = satisfies::<u32, _>(predicate::gt(5u32));
/// assert!(m.matches(&Value::new(6u32)));
/// assert!(!m.matches(&Value::new(5u32)));
/// ```
pub fn satisfies<T, P>(p: P) -> Satisfies<T, P>
    where T: 'static, P: Predicate<T> + Send + Sync + 'static
{
    Satisfies { p, _t: PhantomData }
}

/// Adapts a string [`Predicate`] so it applies to both `String` and
/// `&'static str` arguments.  See [`satisfies_str`].
pub struct SatisfiesStr<P>(P);

impl<P: Predicate<str> + Send + Sync + 'static> SatisfiesStr<P> {
    fn as_str(arg: &Value) -> Option<&str> {
        arg.downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| arg.downcast_ref::<&'static str>().copied())
    }
}

impl<P: Predicate<str> + Send + Sync + 'static> Matcher for SatisfiesStr<P> {
    fn matches(&self, arg: &Value) -> bool {
        Self::as_str(arg).map_or(false, |s| self.0.eval(s))
    }

    fn explain(&self, arg: &Value) -> Option<String> {
        let s = Self::as_str(arg)?;
        self.0.find_case(false, s)
            .map(|case| case.tree().to_string())
    }
}

impl<P: fmt::Display> fmt::Display for SatisfiesStr<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Matches string arguments accepted by predicate `p`.
pub fn satisfies_str<P>(p: P) -> SatisfiesStr<P>
    where P: Predicate<str> + Send + Sync + 'static
{
    SatisfiesStr(p)
}
