// vim: tw=80
//! Expectations: what a single expected call looks like, and the handle used
//! to refine it.

use std::{
    fmt,
    panic::Location,
    sync::{Arc, Mutex, PoisonError}
};

use fragile::Fragile;

use crate::{
    controller::Shared,
    error::{MatchError, OrderError},
    matcher::{Matcher, describe, describe_all},
    model::MethodType,
    value::{Receiver, Value, guarded, render_all}
};

/// Produces the return values of one matched call.
pub(crate) type Action = Arc<dyn Fn(&[Value]) -> Vec<Value> + Send + Sync>;

/// Runs on every matched call, before its [`Action`].
pub(crate) type SideEffect = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Stable identity of an expectation within its controller.  Ids increase in
/// registration order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub(crate) struct CallId(pub(crate) usize);

/// Inclusive bounds on how many times an expectation may be called.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Times {
    pub(crate) min: usize,
    pub(crate) max: usize,
}

impl Times {
    pub(crate) const UNBOUNDED: usize = usize::MAX;

    pub(crate) fn exactly(n: usize) -> Self {
        Times { min: n, max: n }
    }

    pub(crate) fn any() -> Self {
        Times { min: 0, max: Self::UNBOUNDED }
    }

    /// Raise the lower bound.  An upper bound still at its default becomes
    /// unbounded.
    pub(crate) fn at_least(self, n: usize) -> Self {
        let max = if self.max == 1 { Self::UNBOUNDED } else { self.max };
        Times { min: n, max }
    }

    /// Lower the upper bound.  A lower bound still at its default becomes
    /// zero.
    pub(crate) fn at_most(self, n: usize) -> Self {
        let min = if self.min == 1 { 0 } else { self.min };
        Times { min, max: n }
    }
}

impl Default for Times {
    fn default() -> Self {
        Times::exactly(1)
    }
}

/// Where an expectation lives within its call set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Status {
    /// Eligible for matching.
    Expected,
    /// Exhausted, or retired by a later call that named it as a
    /// prerequisite.  Kept only for diagnostics.
    Retired,
    /// Replaced in place by a structurally equal expectation.
    Replaced,
}

/// Everything the controller knows about one expectation.
pub(crate) struct CallState {
    pub(crate) receiver: Receiver,
    pub(crate) method: String,
    pub(crate) method_type: Option<MethodType>,
    pub(crate) matchers: Vec<Box<dyn Matcher>>,
    pub(crate) times: Times,
    pub(crate) num_calls: usize,
    pub(crate) actions: Vec<Action>,
    pub(crate) side_effects: Vec<SideEffect>,
    pub(crate) prereqs: Vec<CallId>,
    pub(crate) origin: &'static Location<'static>,
    pub(crate) status: Status,
    /// Must this expectation be satisfied by the time the controller
    /// finishes?  Cleared when a later registration overrides it.
    pub(crate) required: bool,
}

impl CallState {
    pub(crate) fn new(
        receiver: Receiver,
        method: &str,
        method_type: Option<MethodType>,
        matchers: Vec<Box<dyn Matcher>>,
        origin: &'static Location<'static>) -> Self
    {
        CallState {
            receiver,
            method: method.to_owned(),
            method_type,
            matchers,
            times: Times::default(),
            num_calls: 0,
            actions: Vec::new(),
            side_effects: Vec::new(),
            prereqs: Vec::new(),
            origin,
            status: Status::Expected,
            required: true,
        }
    }

    pub(crate) fn satisfied(&self) -> bool {
        self.num_calls >= self.times.min
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.num_calls >= self.times.max
    }

    /// Human-readable description: receiver, method, matchers and origin.
    pub(crate) fn describe(&self) -> String {
        format!("{}.{}({}) at {}", self.receiver, self.method,
                describe_all(&self.matchers), self.origin)
    }

    fn argument_error(&self, index: usize, m: &dyn Matcher, arg: &Value)
        -> MatchError
    {
        let want = match guarded(|| m.explain(arg)).flatten() {
            Some(why) => format!("{}\n{}", describe(m), why),
            None => describe(m)
        };
        MatchError::Argument {
            origin: self.origin,
            index,
            got: format!("{} ({})", arg, arg.type_name()),
            want
        }
    }

    fn match_positional(&self, matchers: &[Box<dyn Matcher>], args: &[Value],
                        offset: usize)
        -> Result<(), MatchError>
    {
        for (i, (m, arg)) in matchers.iter().zip(args.iter()).enumerate() {
            if !m.matches(arg) {
                return Err(self.argument_error(offset + i, m.as_ref(), arg));
            }
        }
        Ok(())
    }

    /// Check the arguments of a call against this expectation's matchers.
    ///
    /// Prerequisites and cardinality are not considered here.
    pub(crate) fn match_args(&self, args: &[Value]) -> Result<(), MatchError> {
        let mt = match self.method_type {
            Some(mt) if mt.variadic => mt,
            _ => {
                if args.len() != self.matchers.len() {
                    return Err(MatchError::ArgCount {
                        origin: self.origin,
                        got: args.len(),
                        want: self.matchers.len()
                    });
                }
                return self.match_positional(&self.matchers, args, 0);
            }
        };

        let fixed = mt.fixed_params();
        if self.matchers.len() < fixed {
            return Err(MatchError::MatcherCount {
                origin: self.origin,
                got: self.matchers.len(),
                want: fixed
            });
        }
        if args.len() < fixed {
            return Err(MatchError::ArgCount {
                origin: self.origin,
                got: args.len(),
                want: fixed
            });
        }
        self.match_positional(&self.matchers[..fixed], &args[..fixed], 0)?;

        let (tail_m, tail_a) = (&self.matchers[fixed..], &args[fixed..]);
        // Either one matcher per variadic argument, or a single matcher that
        // accepts the whole tail at once.
        let pairwise = tail_m.len() == tail_a.len() &&
            tail_m.iter().zip(tail_a.iter()).all(|(m, a)| m.matches(a));
        let grouped = tail_m.len() == 1 &&
            tail_m[0].matches_tail(tail_a) == Some(true);
        if pairwise || grouped {
            Ok(())
        } else {
            Err(MatchError::Variadic {
                origin: self.origin,
                index: fixed,
                got: render_all(tail_a),
                want: describe_all(tail_m)
            })
        }
    }

    /// Record one matched call, returning what must run for it.
    pub(crate) fn call(&mut self) -> (Option<Action>, Vec<SideEffect>) {
        // Successive calls use successive actions; the last one repeats.
        let action = self.actions.get(self.num_calls)
            .or_else(|| self.actions.last())
            .cloned();
        self.num_calls += 1;
        (action, self.side_effects.clone())
    }
}

/// Handle to one registered expectation.
///
/// Returned by [`Controller::record_expectation`](crate::Controller::record_expectation)
/// and by the recorder methods of generated mocks.  Every method edits the
/// expectation inside its controller, so all clones of a `Call` refer to the
/// same expectation.
///
/// # Examples
/// ```
/// # use mockctl::*;
/// let ctrl = Controller::new();
/// let rx = Receiver::new::<u32>();
/// ctrl.record_expectation(&rx, "get", matchers![eq(1u32)])
///     .times(2)
///     .return_const(42u64);
/// for _ in 0..2 {
///     assert_eq!(42u64, ctrl.call_returning::<u64>(&rx, "get", values![1u32]));
/// }
/// ctrl.finish();
/// ```
#[derive(Clone)]
pub struct Call {
    ctrl: Arc<Shared>,
    id: CallId,
}

impl Call {
    pub(crate) fn new(ctrl: Arc<Shared>, id: CallId) -> Self {
        Call { ctrl, id }
    }

    fn edit<R, F>(&self, f: F) -> R
        where F: FnOnce(&mut CallState) -> R
    {
        self.ctrl.edit_call(self.id, f)
    }

    fn add_action(self, action: Action) -> Self {
        self.edit(|c| c.actions.push(action));
        self
    }

    /// Expect exactly `n` calls.
    pub fn times(self, n: usize) -> Self {
        self.edit(|c| c.times = Times::exactly(n));
        self
    }

    /// Expect at least `n` calls.
    pub fn min_times(self, n: usize) -> Self {
        self.edit(|c| c.times = c.times.at_least(n));
        self
    }

    /// Expect at most `n` calls.
    pub fn max_times(self, n: usize) -> Self {
        self.edit(|c| c.times = c.times.at_most(n));
        self
    }

    /// Allow any number of calls, including none.
    pub fn any_times(self) -> Self {
        self.edit(|c| c.times = Times::any());
        self
    }

    /// Expect exactly one call.  This is the default.
    pub fn once(self) -> Self {
        self.times(1)
    }

    /// Forbid the call altogether.
    pub fn never(self) -> Self {
        self.times(0)
    }

    /// Return a clone of `v` from every call.
    pub fn return_const<T>(self, v: T) -> Self
        where T: Clone + Send + Sync + 'static
    {
        self.add_action(Arc::new(move |_: &[Value]| {
            vec![Value::opaque(v.clone())]
        }))
    }

    /// Return several values, produced afresh by `f` for every call.
    ///
    /// # Examples
    /// ```
    /// # use mockctl::*;
    /// let ctrl = Controller::new();
    /// let rx = Receiver::new::<u32>();
    /// ctrl.record_expectation(&rx, "split", matchers![])
    ///     .returns(|| values![1u8, "two"]);
    /// let r = ctrl.call(&rx, "split", vec![]);
    /// assert_eq!(Some(&1u8), r[0].downcast_ref());
    /// # ctrl.finish();
    /// ```
    pub fn returns<F>(self, f: F) -> Self
        where F: Fn() -> Vec<Value> + Send + Sync + 'static
    {
        self.add_action(Arc::new(move |_: &[Value]| f()))
    }

    /// Return `v`, which need not be `Clone`.  The action can only run once.
    pub fn return_once<T: Send + 'static>(self, v: T) -> Self {
        let slot = Mutex::new(Some(v));
        self.add_action(Arc::new(move |_: &[Value]| {
            let v = slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            match v {
                Some(v) => vec![Value::opaque(v)],
                None => panic!("return_once action called more than once")
            }
        }))
    }

    /// Compute the return values from the call's arguments.
    pub fn returning<F>(self, f: F) -> Self
        where F: Fn(&[Value]) -> Vec<Value> + Send + Sync + 'static
    {
        self.add_action(Arc::new(f))
    }

    /// Like [`returning`](Call::returning), but for closures that are not
    /// `Send`.  The call must then happen on the thread that registered it.
    pub fn returning_st<F>(self, f: F) -> Self
        where F: Fn(&[Value]) -> Vec<Value> + 'static
    {
        let f = Fragile::new(f);
        self.add_action(Arc::new(move |args: &[Value]| (f.get())(args)))
    }

    /// Run `f` with the arguments of every matched call.  Its outcome does
    /// not affect the return values.
    pub fn run<F>(self, f: F) -> Self
        where F: Fn(&[Value]) + Send + Sync + 'static
    {
        let f: SideEffect = Arc::new(f);
        self.edit(|c| c.side_effects.push(f));
        self
    }

    /// Require `prereq` to be satisfied before this call may match.  A loop
    /// among prerequisites fails the test immediately.
    pub fn after(self, prereq: &Call) -> Self {
        if let Err(e) = self.try_after(prereq) {
            self.ctrl.fatal(&e.to_string());
        }
        self
    }

    /// Like [`after`](Call::after), but returns the problem instead of
    /// failing the test.
    pub fn try_after(&self, prereq: &Call) -> Result<(), OrderError> {
        if !Arc::ptr_eq(&self.ctrl, &prereq.ctrl) {
            return Err(OrderError::ForeignController {
                call: self.to_string(),
                prereq: prereq.to_string()
            });
        }
        self.ctrl.add_prereq(self.id, prereq.id)
    }

    /// How many times this expectation has been matched so far.
    pub fn num_calls(&self) -> usize {
        self.edit(|c| c.num_calls)
    }

    /// Has this expectation reached its minimum number of calls?
    pub fn is_satisfied(&self) -> bool {
        self.edit(|c| c.satisfied())
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Call")
            .field(&self.ctrl.describe(self.id))
            .finish()
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ctrl.describe(self.id))
    }
}

/// Declare that `calls` must happen in the given order.
///
/// # Examples
/// ```
/// # use mockctl::*;
/// let ctrl = Controller::new();
/// let rx = Receiver::new::<u32>();
/// let open = ctrl.record_expectation(&rx, "open", matchers![]);
/// let read = ctrl.record_expectation(&rx, "read", matchers![]);
/// let close = ctrl.record_expectation(&rx, "close", matchers![]);
/// in_order(&[&open, &read, &close]);
/// for m in ["open", "read", "close"] {
///     ctrl.call(&rx, m, vec![]);
/// }
/// ctrl.finish();
/// ```
pub fn in_order(calls: &[&Call]) {
    for pair in calls.windows(2) {
        pair[1].clone().after(pair[0]);
    }
}
