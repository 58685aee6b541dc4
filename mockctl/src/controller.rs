// vim: tw=80
//! The [`Controller`]: owner of every expectation of one test, and the single
//! entry point generated mocks forward their calls into.

use std::{
    any::{self, Any},
    fmt,
    mem,
    panic::Location,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    thread
};

use tracing::{debug, trace, warn};

use crate::{
    call_set::CallSet,
    cancel::CancellationToken,
    error::{OrderError, ReturnError},
    expectation::{Call, CallId, CallState},
    matcher::Matcher,
    model::MethodType,
    reporter::{PanicReporter, TestReporter},
    value::{Receiver, Value, render_all}
};

/// How a controller chooses among several expectations for the same
/// (receiver, method).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OrderingPolicy {
    /// The earliest registered expectation that matches wins.  Later ones are
    /// reached only once earlier ones are exhausted.
    #[default]
    Fifo,
    /// The latest registered expectation that matches wins.  Earlier ones no
    /// longer need to be satisfied.
    Overridable,
    /// Registering an expectation whose matchers are structurally equal to
    /// an existing one replaces it in place.  Otherwise like `Fifo`.
    OverridableArgsAware,
}

/// Construction-time options of a [`Controller`].
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub policy: OrderingPolicy,
    /// Cancelled when the controller reports its first fatal failure.
    pub cancellation: Option<CancellationToken>,
}

impl Config {
    pub fn overridable() -> Self {
        Config { policy: OrderingPolicy::Overridable, ..Default::default() }
    }

    pub fn overridable_args_aware() -> Self {
        Config {
            policy: OrderingPolicy::OverridableArgsAware,
            ..Default::default()
        }
    }

    pub fn cancel_on_failure(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

pub(crate) struct State {
    set: CallSet,
    next_id: usize,
    finished: bool,
}

pub(crate) struct Shared {
    state: Mutex<State>,
    reporter: Box<dyn TestReporter>,
    cancellation: Option<CancellationToken>,
    policy: OrderingPolicy,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // An action that panicked on another thread must not wedge us.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail the test.  Never call this with the state lock held.
    pub(crate) fn fatal(&self, msg: &str) -> ! {
        if let Some(token) = &self.cancellation {
            if token.cancel() {
                debug!("cancelled the controller's context");
            }
        }
        self.reporter.fatal(msg)
    }

    fn report_missing(&self, failures: Vec<String>) {
        if failures.is_empty() {
            return;
        }
        for f in failures {
            warn!("missing call(s) to {}", f);
            self.reporter.error(&format!("missing call(s) to {}", f));
        }
        self.fatal("aborting test due to missing call(s)");
    }

    pub(crate) fn edit_call<R, F>(&self, id: CallId, f: F) -> R
        where F: FnOnce(&mut CallState) -> R
    {
        let r = self.lock().set.get_mut(id).map(f);
        match r {
            Some(r) => r,
            None => self.fatal("expectation used after it was cleared by \
                                Controller::checkpoint")
        }
    }

    pub(crate) fn describe(&self, id: CallId) -> String {
        self.lock().set.describe(id)
            .unwrap_or_else(|| "<cleared expectation>".to_owned())
    }

    pub(crate) fn add_prereq(&self, call: CallId, prereq: CallId)
        -> Result<(), OrderError>
    {
        self.lock().set.add_prereq(call, prereq)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if thread::panicking() {
            return;
        }
        let failures = {
            let state = self.state.get_mut()
                .unwrap_or_else(PoisonError::into_inner);
            if state.finished {
                return;
            }
            state.finished = true;
            state.set.failures(None)
        };
        self.report_missing(failures);
    }
}

/// Owns every expectation of one test and dispatches mocked calls to them.
///
/// A `Controller` is cheap to clone; all clones share the same state, and
/// may be used from any number of threads.  Unless
/// [`finish`](Controller::finish) has been called, a generated mock verifies
/// its own expectations when it is dropped, and the last clone (including
/// those held by mocks and [`Call`] handles) verifies whatever remains.
///
/// # Examples
/// ```
/// # use mockctl::*;
/// let ctrl = Controller::new();
/// let rx = Receiver::new::<u32>();
/// ctrl.record_expectation(&rx, "len", matchers![])
///     .return_const(3usize);
/// assert_eq!(3, ctrl.call_returning::<usize>(&rx, "len", vec![]));
/// ctrl.finish();
/// ```
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

impl Controller {
    /// A controller with the default [`OrderingPolicy`] that fails tests by
    /// panicking.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_reporter(PanicReporter::new(), config)
    }

    /// A controller that sends its failures to `reporter`.
    pub fn with_reporter<R>(reporter: R, config: Config) -> Self
        where R: TestReporter + 'static
    {
        let shared = Shared {
            state: Mutex::new(State {
                set: CallSet::new(config.policy),
                next_id: 0,
                finished: false
            }),
            reporter: Box::new(reporter),
            cancellation: config.cancellation,
            policy: config.policy
        };
        Controller { shared: Arc::new(shared) }
    }

    /// A default controller, plus a token that it cancels as soon as it
    /// reports a fatal failure.
    pub fn with_context() -> (Self, CancellationToken) {
        let token = CancellationToken::new();
        let config = Config::default().cancel_on_failure(token.clone());
        (Self::with_config(config), token)
    }

    pub fn policy(&self) -> OrderingPolicy {
        self.shared.policy
    }

    fn register(&self, receiver: &Receiver, method: &str,
                method_type: Option<MethodType>,
                matchers: Vec<Box<dyn Matcher>>,
                origin: &'static Location<'static>) -> Call
    {
        let call = CallState::new(*receiver, method, method_type, matchers,
                                  origin);
        debug!("expecting {}", call.describe());
        let id = {
            let mut state = self.shared.lock();
            let id = CallId(state.next_id);
            state.next_id += 1;
            state.set.add(id, call);
            id
        };
        Call::new(self.shared.clone(), id)
    }

    /// Expect one call of `method` on `receiver`, with one matcher per
    /// argument.
    #[track_caller]
    pub fn record_expectation(&self, receiver: &Receiver, method: &str,
                              matchers: Vec<Box<dyn Matcher>>) -> Call
    {
        self.register(receiver, method, None, matchers, Location::caller())
    }

    /// Like [`record_expectation`](Controller::record_expectation), for a
    /// method whose shape is known.  A variadic `method_type` lets the last
    /// matcher match every trailing argument at once.
    #[track_caller]
    pub fn record_expectation_with_method_type(
        &self,
        receiver: &Receiver,
        method: &str,
        method_type: MethodType,
        matchers: Vec<Box<dyn Matcher>>) -> Call
    {
        self.register(receiver, method, Some(method_type), matchers,
                      Location::caller())
    }

    /// Dispatch a call of `method` on `receiver` and return the results of
    /// the matching expectation's action.
    ///
    /// An unexpected call fails the test.
    #[track_caller]
    pub fn call(&self, receiver: &Receiver, method: &str, args: Vec<Value>)
        -> Vec<Value>
    {
        let at = Location::caller();
        let r = self.shared.lock().set.dispatch(receiver, method, &args);
        let dispatched = match r {
            Ok(d) => d,
            Err(e) => {
                let msg = format!("Unexpected call to {}.{}({}) at {} \
                                   because: {}",
                                  receiver, method, render_all(&args), at, e);
                warn!("{}", msg);
                self.shared.fatal(&msg);
            }
        };
        trace!("{}.{}({}) at {}", receiver, method, render_all(&args), at);

        for effect in dispatched.side_effects.iter() {
            effect(&args);
        }
        let Some(action) = dispatched.action else {
            return Vec::new();
        };
        let rets = action(&args);
        if let Some(mt) = dispatched.method_type {
            if rets.len() != mt.results {
                let e = ReturnError::WrongCount {
                    method: self.shared.describe(dispatched.id),
                    got: rets.len(),
                    want: mt.results
                };
                self.shared.fatal(&e.to_string());
            }
        }
        rets
    }

    /// Dispatch a call whose method returns a single value of type `T`.
    #[track_caller]
    pub fn call_returning<T: 'static>(&self, receiver: &Receiver,
                                      method: &str, args: Vec<Value>) -> T
    {
        let rets = self.call(receiver, method, args);
        let name = || format!("{}.{}", receiver, method);
        let Some(v) = rets.into_iter().next() else {
            let e = ReturnError::Missing { method: name() };
            self.shared.fatal(&e.to_string());
        };
        match coerce::<T>(v) {
            Ok(t) => t,
            Err(v) => {
                let e = ReturnError::WrongType {
                    method: name(),
                    got: v.type_name(),
                    want: any::type_name::<T>()
                };
                self.shared.fatal(&e.to_string());
            }
        }
    }

    /// Is every required expectation satisfied right now?
    pub fn satisfied(&self) -> bool {
        self.shared.lock().set.satisfied()
    }

    /// Verify that every required expectation was satisfied.  Each missing
    /// call is reported, then the test is failed.
    ///
    /// May be called only once.
    pub fn finish(&self) {
        let (failures, released) = {
            let mut state = self.shared.lock();
            if state.finished {
                (None, None)
            } else {
                state.finished = true;
                let failures = state.set.failures(None);
                (Some(failures), Some(state.set.release_all()))
            }
        };
        // Actions that own mocks of this controller would otherwise keep it
        // alive forever.
        drop(released);
        match failures {
            Some(failures) => {
                debug!("finishing with {} missing call(s)", failures.len());
                self.shared.report_missing(failures);
            },
            None => self.shared.fatal("Controller::finish was called more \
                                       than once. It has to be called exactly \
                                       once.")
        }
    }

    /// Verify every expectation registered so far, then forget them all.
    ///
    /// Useful to reuse one controller for several phases of a test.  The
    /// [`Call`] handles of cleared expectations may no longer be used.
    pub fn checkpoint(&self) {
        let (failures, old) = {
            let mut state = self.shared.lock();
            let failures = state.set.failures(None);
            let old = mem::replace(&mut state.set,
                                   CallSet::new(self.shared.policy));
            (failures, old)
        };
        drop(old);
        debug!("checkpoint with {} missing call(s)", failures.len());
        self.shared.report_missing(failures);
    }

    /// Verify the expectations of `receiver`, then release their actions.
    ///
    /// Generated mocks call this when they are dropped.  Missing calls are
    /// reported the way [`finish`](Controller::finish) reports them, unless
    /// the controller has already finished or the thread is panicking.
    pub fn release(&self, receiver: &Receiver) {
        let (failures, released) = {
            let mut state = self.shared.lock();
            let failures = if state.finished || thread::panicking() {
                Vec::new()
            } else {
                state.set.failures(Some(receiver))
            };
            (failures, state.set.release(receiver))
        };
        drop(released);
        if !failures.is_empty() {
            debug!("{} dropped with {} missing call(s)", receiver,
                   failures.len());
        }
        self.shared.report_missing(failures);
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("policy", &self.shared.policy)
            .finish_non_exhaustive()
    }
}

/// Unbox a return value, accepting a string literal where a `String` is
/// wanted.
fn coerce<T: 'static>(v: Value) -> Result<T, Value> {
    let v = match v.downcast::<T>() {
        Ok(t) => return Ok(t),
        Err(v) => v
    };
    match v.downcast_ref::<&'static str>() {
        Some(s) => {
            let owned: Box<dyn Any> = Box::new(String::from(*s));
            owned.downcast::<T>()
                .map(|b| *b)
                .map_err(|_| v)
        },
        None => Err(v)
    }
}
