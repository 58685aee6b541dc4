// vim: tw=80
//! Storage of every expectation registered with one controller, indexed by
//! (receiver, method).

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, trace};

use crate::{
    controller::OrderingPolicy,
    error::{DispatchError, MatchError, OrderError},
    expectation::{Action, CallId, CallState, SideEffect, Status},
    matcher::same_matchers,
    model::MethodType,
    value::{Receiver, Value}
};

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
struct Key {
    receiver: Receiver,
    method: String,
}

impl Key {
    fn new(receiver: &Receiver, method: &str) -> Self {
        Key { receiver: *receiver, method: method.to_owned() }
    }

    fn of(call: &CallState) -> Self {
        Key::new(&call.receiver, &call.method)
    }
}

/// What the controller must do, outside of its lock, for one matched call.
pub(crate) struct Dispatched {
    pub(crate) action: Option<Action>,
    pub(crate) side_effects: Vec<SideEffect>,
    pub(crate) method_type: Option<MethodType>,
    pub(crate) id: CallId,
}

/// Closures taken from expectations that are no longer needed.
#[derive(Default)]
#[must_use = "drop only after releasing the controller's lock"]
pub(crate) struct Released {
    actions: Vec<Action>,
    side_effects: Vec<SideEffect>,
}

impl Released {
    fn take(&mut self, call: &mut CallState) {
        self.actions.append(&mut call.actions);
        self.side_effects.append(&mut call.side_effects);
    }
}

pub(crate) struct CallSet {
    policy: OrderingPolicy,
    /// Every expectation ever registered, in registration order.
    calls: BTreeMap<CallId, CallState>,
    /// Expectations still eligible for matching.
    expected: HashMap<Key, Vec<CallId>>,
    /// Expectations that can no longer match.  Kept so failure messages can
    /// mention them.
    exhausted: HashMap<Key, Vec<CallId>>,
}

impl CallSet {
    pub(crate) fn new(policy: OrderingPolicy) -> Self {
        CallSet {
            policy,
            calls: BTreeMap::new(),
            expected: HashMap::new(),
            exhausted: HashMap::new()
        }
    }

    pub(crate) fn get_mut(&mut self, id: CallId) -> Option<&mut CallState> {
        self.calls.get_mut(&id)
    }

    pub(crate) fn describe(&self, id: CallId) -> Option<String> {
        self.calls.get(&id).map(CallState::describe)
    }

    /// Store a new expectation according to the ordering policy.
    pub(crate) fn add(&mut self, id: CallId, call: CallState) {
        let key = Key::of(&call);
        let ids = self.expected.entry(key).or_default();
        match self.policy {
            OrderingPolicy::Fifo => ids.push(id),
            OrderingPolicy::Overridable => {
                for old in ids.iter() {
                    if let Some(c) = self.calls.get_mut(old) {
                        c.required = false;
                    }
                }
                if !ids.is_empty() {
                    debug!("{} overrides {} earlier expectation(s)",
                           call.describe(), ids.len());
                }
                ids.push(id);
            },
            OrderingPolicy::OverridableArgsAware => {
                let pos = ids.iter()
                    .position(|old| self.calls.get(old)
                        .map_or(false, |c| same_matchers(&c.matchers,
                                                         &call.matchers)));
                match pos {
                    Some(i) => {
                        let old = std::mem::replace(&mut ids[i], id);
                        self.replace(old, id, &call);
                    },
                    None => ids.push(id)
                }
            }
        }
        self.calls.insert(id, call);
    }

    // Retire `old` in favor of `new`, which now holds its position.
    fn replace(&mut self, old: CallId, new: CallId, call: &CallState) {
        if let Some(c) = self.calls.get_mut(&old) {
            debug!("{} replaces {}", call.describe(), c.describe());
            c.status = Status::Replaced;
            c.required = false;
        }
        for c in self.calls.values_mut() {
            for p in c.prereqs.iter_mut().filter(|p| **p == old) {
                *p = new;
            }
        }
    }

    /// Move an expectation to the exhausted list.
    fn retire(&mut self, id: CallId) {
        let Some(call) = self.calls.get_mut(&id) else { return; };
        if call.status != Status::Expected {
            return;
        }
        call.status = Status::Retired;
        let key = Key::of(call);
        if let Some(ids) = self.expected.get_mut(&key) {
            ids.retain(|i| *i != id);
        }
        self.exhausted.entry(key).or_default().push(id);
    }

    /// Can `call` match `args` right now?
    fn check(&self, call: &CallState, args: &[Value])
        -> Result<(), MatchError>
    {
        call.match_args(args)?;
        for p in call.prereqs.iter() {
            let Some(prereq) = self.calls.get(p) else { continue; };
            if !prereq.satisfied() {
                return Err(MatchError::Prerequisite {
                    origin: call.origin,
                    call: call.describe(),
                    prereq: prereq.describe()
                });
            }
        }
        if call.exhausted() {
            return Err(MatchError::Exhausted { origin: call.origin });
        }
        Ok(())
    }

    fn find_match(&self, key: &Key, args: &[Value])
        -> Result<CallId, DispatchError>
    {
        let empty = Vec::new();
        let expected = self.expected.get(key).unwrap_or(&empty);
        let exhausted = self.exhausted.get(key).unwrap_or(&empty);
        if expected.is_empty() && exhausted.is_empty() {
            return Err(DispatchError::NoExpectations {
                method: key.method.clone()
            });
        }

        let scan: Box<dyn Iterator<Item = &CallId>> = match self.policy {
            OrderingPolicy::Overridable => Box::new(expected.iter().rev()),
            _ => Box::new(expected.iter())
        };
        let mut reasons = Vec::new();
        for id in scan {
            let Some(call) = self.calls.get(id) else { continue; };
            match self.check(call, args) {
                Ok(()) => return Ok(*id),
                Err(e) => reasons.push(e)
            }
        }
        // Explain why exhausted expectations didn't match, too.
        for call in exhausted.iter().filter_map(|id| self.calls.get(id)) {
            let origin = call.origin;
            match call.match_args(args) {
                Ok(()) if call.exhausted() => {
                    reasons.push(MatchError::Exhausted { origin })
                },
                Ok(()) => reasons.push(MatchError::Retired { origin }),
                Err(e) => reasons.push(e)
            }
        }
        Err(DispatchError::NoMatch(reasons))
    }

    /// Select the expectation for an incoming call and record the call
    /// against it.
    pub(crate) fn dispatch(&mut self, receiver: &Receiver, method: &str,
                           args: &[Value])
        -> Result<Dispatched, DispatchError>
    {
        let key = Key::new(receiver, method);
        let id = self.find_match(&key, args)?;
        let Some(call) = self.calls.get_mut(&id) else {
            return Err(DispatchError::NoExpectations {
                method: method.to_owned()
            });
        };
        // Once matched, a call's prerequisites are no longer expected.
        let prereqs = std::mem::take(&mut call.prereqs);
        let (action, side_effects) = call.call();
        let dispatched = Dispatched {
            action,
            side_effects,
            method_type: call.method_type,
            id
        };
        let exhausted = call.exhausted();
        trace!("{}.{} matched {} (call #{})", receiver, method,
               call.describe(), call.num_calls);
        for p in prereqs {
            self.retire(p);
        }
        if exhausted {
            self.retire(id);
        }
        Ok(dispatched)
    }

    /// Is `target` a prerequisite of `of`, directly or indirectly?
    fn is_prereq(&self, target: CallId, of: CallId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![of];
        while let Some(id) = stack.pop() {
            let Some(call) = self.calls.get(&id) else { continue; };
            for p in call.prereqs.iter() {
                if *p == target {
                    return true;
                }
                if seen.insert(*p) {
                    stack.push(*p);
                }
            }
        }
        false
    }

    /// Add the edge "`call` must happen after `prereq`".
    pub(crate) fn add_prereq(&mut self, call: CallId, prereq: CallId)
        -> Result<(), OrderError>
    {
        let describe = |id| self.describe(id).unwrap_or_default();
        if call == prereq {
            return Err(OrderError::OwnPrerequisite { call: describe(call) });
        }
        if self.is_prereq(call, prereq) {
            return Err(OrderError::Cycle {
                call: describe(call),
                prereq: describe(prereq)
            });
        }
        if let Some(c) = self.calls.get_mut(&call) {
            if !c.prereqs.contains(&prereq) {
                c.prereqs.push(prereq);
            }
        }
        Ok(())
    }

    /// Descriptions of every required expectation that has not been
    /// satisfied, in registration order.  Only those of `receiver`, if given.
    pub(crate) fn failures(&self, receiver: Option<&Receiver>) -> Vec<String> {
        self.calls.values()
            .filter(|c| receiver.map_or(true, |r| c.receiver == *r))
            .filter(|c| c.required && c.status == Status::Expected)
            .filter(|c| !c.satisfied())
            .map(CallState::describe)
            .collect()
    }

    /// Take the actions and side effects of every expectation of `receiver`,
    /// which need not be satisfied any more.
    ///
    /// Actions may own mocks, and a dropped mock locks its controller.  So
    /// the caller must drop what is returned after releasing the lock.
    pub(crate) fn release(&mut self, receiver: &Receiver) -> Released {
        let mut released = Released::default();
        for c in self.calls.values_mut().filter(|c| c.receiver == *receiver) {
            c.required = false;
            released.take(c);
        }
        released
    }

    /// Take the actions and side effects of every expectation.  See
    /// [`release`](CallSet::release).
    pub(crate) fn release_all(&mut self) -> Released {
        let mut released = Released::default();
        for c in self.calls.values_mut() {
            released.take(c);
        }
        released
    }

    pub(crate) fn satisfied(&self) -> bool {
        self.calls.values()
            .filter(|c| c.required && c.status == Status::Expected)
            .all(CallState::satisfied)
    }

}

#[cfg(test)]
mod t {
    use super::*;
    use std::{panic::Location, sync::Arc};
    use crate::{
        expectation::Times,
        matcher::{any, eq},
        matchers,
        value::Value
    };

    struct Fixture {
        set: CallSet,
        rx: Receiver,
        next: usize,
    }

    impl Fixture {
        fn new(policy: OrderingPolicy) -> Self {
            Fixture {
                set: CallSet::new(policy),
                rx: Receiver::new::<Fixture>(),
                next: 0
            }
        }

        fn add(&mut self, method: &str, ms: Vec<Box<dyn crate::Matcher>>,
               ret: &'static str) -> CallId
        {
            let id = CallId(self.next);
            self.next += 1;
            let mut call = CallState::new(self.rx, method, None, ms,
                                          Location::caller());
            call.actions.push(Arc::new(move |_: &[Value]| {
                vec![Value::new(ret)]
            }));
            self.set.add(id, call);
            id
        }

        fn times(&mut self, id: CallId, times: Times) {
            self.set.get_mut(id).unwrap().times = times;
        }

        fn call(&mut self, method: &str, args: &[Value])
            -> Result<&'static str, DispatchError>
        {
            let d = self.set.dispatch(&self.rx, method, args)?;
            let r = (d.action.unwrap())(args);
            Ok(*r[0].downcast_ref::<&'static str>().unwrap())
        }
    }

    #[test]
    fn no_expectations() {
        let mut f = Fixture::new(OrderingPolicy::Fifo);
        match f.call("foo", &[]) {
            Err(DispatchError::NoExpectations { method }) =>
                assert_eq!("foo", method),
            r => panic!("Unexpected result {:?}", r)
        }
    }

    #[test]
    fn fifo_falls_through_when_exhausted() {
        let mut f = Fixture::new(OrderingPolicy::Fifo);
        f.add("foo", matchers![eq(1u32)], "narrow");
        let broad = f.add("foo", matchers![any()], "broad");
        f.times(broad, Times::any());
        assert_eq!("narrow", f.call("foo", &[Value::new(1u32)]).unwrap());
        assert_eq!("broad", f.call("foo", &[Value::new(1u32)]).unwrap());
        assert_eq!("broad", f.call("foo", &[Value::new(2u32)]).unwrap());
        assert!(f.set.satisfied());
    }

    #[test]
    fn exhausted_calls_explain_themselves() {
        let mut f = Fixture::new(OrderingPolicy::Fifo);
        f.add("foo", matchers![], "x");
        f.call("foo", &[]).unwrap();
        match f.call("foo", &[]) {
            Err(DispatchError::NoMatch(reasons)) => {
                assert_eq!(1, reasons.len());
                assert!(matches!(reasons[0], MatchError::Exhausted { .. }));
            },
            r => panic!("Unexpected result {:?}", r)
        }
    }

    #[test]
    fn overridable_prefers_latest() {
        let mut f = Fixture::new(OrderingPolicy::Overridable);
        f.add("bar", matchers![any()], "foo");
        f.add("bar", matchers![any()], "bar");
        assert_eq!("bar", f.call("bar", &[Value::new("input")]).unwrap());
        assert!(f.set.failures(None).is_empty());
    }

    #[test]
    fn args_aware_replaces_in_place() {
        let mut f = Fixture::new(OrderingPolicy::OverridableArgsAware);
        let old = f.add("bar", matchers![eq("first")], "first initial");
        f.add("bar", matchers![eq("second")], "second initial");
        let new = f.add("bar", matchers![eq("first")], "first changed");
        assert_eq!(Status::Replaced, f.set.calls[&old].status);
        assert_eq!(vec![new, CallId(1)],
                   f.set.expected.values().next().unwrap().clone());
        assert_eq!("first changed",
                   f.call("bar", &[Value::new("first")]).unwrap());
        assert_eq!("second initial",
                   f.call("bar", &[Value::new("second")]).unwrap());
        assert!(f.set.failures(None).is_empty());
    }

    #[test]
    fn args_aware_rewires_prerequisites() {
        let mut f = Fixture::new(OrderingPolicy::OverridableArgsAware);
        let first = f.add("a", matchers![], "a1");
        let second = f.add("b", matchers![], "b");
        f.set.add_prereq(second, first).unwrap();
        let replacement = f.add("a", matchers![], "a2");
        assert_eq!(vec![replacement], f.set.calls[&second].prereqs);
    }

    #[test]
    fn prerequisite_blocks_and_retires() {
        let mut f = Fixture::new(OrderingPolicy::Fifo);
        let a = f.add("a", matchers![], "a");
        f.times(a, Times::default().at_least(1));
        let b = f.add("b", matchers![], "b");
        f.set.add_prereq(b, a).unwrap();
        match f.call("b", &[]) {
            Err(DispatchError::NoMatch(reasons)) =>
                assert!(matches!(reasons[0],
                                 MatchError::Prerequisite { .. })),
            r => panic!("Unexpected result {:?}", r)
        }
        f.call("a", &[]).unwrap();
        f.call("b", &[]).unwrap();
        assert_eq!(Status::Retired, f.set.calls[&a].status);
        match f.call("a", &[]) {
            Err(DispatchError::NoMatch(reasons)) =>
                assert!(matches!(reasons[..], [MatchError::Retired { .. }])),
            r => panic!("Unexpected result {:?}", r)
        }
    }

    #[test]
    fn cycles_rejected() {
        let mut f = Fixture::new(OrderingPolicy::Fifo);
        let a = f.add("a", matchers![], "a");
        let b = f.add("b", matchers![], "b");
        let c = f.add("c", matchers![], "c");
        f.set.add_prereq(b, a).unwrap();
        f.set.add_prereq(c, b).unwrap();
        assert!(matches!(f.set.add_prereq(a, c),
                         Err(OrderError::Cycle { .. })));
        assert!(matches!(f.set.add_prereq(a, a),
                         Err(OrderError::OwnPrerequisite { .. })));
    }

    #[test]
    fn failures_in_registration_order() {
        let mut f = Fixture::new(OrderingPolicy::Fifo);
        f.add("z", matchers![], "z");
        f.add("a", matchers![], "a");
        let failures = f.set.failures(None);
        assert_eq!(2, failures.len());
        assert!(failures[0].contains(".z()"));
        assert!(failures[1].contains(".a()"));
    }

    #[test]
    fn failures_of_one_receiver() {
        let mut f = Fixture::new(OrderingPolicy::Fifo);
        f.add("a", matchers![], "a");
        let other = Receiver::new::<u8>();
        assert_eq!(1, f.set.failures(Some(&f.rx)).len());
        assert!(f.set.failures(Some(&other)).is_empty());
    }

    /// Released expectations keep their state, but lose their closures and
    /// no longer need to be satisfied.
    #[test]
    fn release() {
        let mut f = Fixture::new(OrderingPolicy::Fifo);
        let a = f.add("a", matchers![], "a");
        let rx = f.rx;
        let released = f.set.release(&rx);
        assert_eq!(1, released.actions.len());
        assert!(f.set.calls[&a].actions.is_empty());
        assert!(f.set.failures(None).is_empty());
        assert!(f.set.satisfied());
    }

    #[test]
    fn release_all_keeps_requirements() {
        let mut f = Fixture::new(OrderingPolicy::Fifo);
        f.add("a", matchers![], "a");
        let released = f.set.release_all();
        assert_eq!(1, released.actions.len());
        assert_eq!(1, f.set.failures(None).len());
    }
}
