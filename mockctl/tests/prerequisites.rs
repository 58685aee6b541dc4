// vim: tw=80
//! Calls may be required to happen after other calls
#![deny(warnings)]

mod common;

use mockctl::{*, error::OrderError};

use common::{RecordingReporter, expect_failure};

#[mock]
pub trait Door {
    fn open(&self);
    fn knock(&self, times: u32);
    fn close(&self);
}

#[test]
fn after() {
    let ctrl = Controller::new();
    let door = MockDoor::new(&ctrl);
    let open = door.expect().open();
    door.expect().close().after(&open);
    door.open();
    door.close();
    ctrl.finish();
}

#[test]
#[should_panic(expected = "doesn't have a prerequisite call satisfied")]
fn out_of_order() {
    let ctrl = Controller::new();
    let door = MockDoor::new(&ctrl);
    let open = door.expect().open();
    door.expect().close().after(&open);
    door.close();
}

#[test]
fn in_order_chain() {
    let ctrl = Controller::new();
    let door = MockDoor::new(&ctrl);
    let open = door.expect().open();
    let knock = door.expect().knock(any());
    let close = door.expect().close();
    in_order(&[&open, &knock, &close]);
    door.open();
    door.knock(3);
    door.close();
    ctrl.finish();
}

#[test]
#[should_panic(expected = "Unexpected call to prerequisites::MockDoor.close()")]
fn in_order_skipped() {
    let ctrl = Controller::new();
    let door = MockDoor::new(&ctrl);
    let open = door.expect().open();
    let knock = door.expect().knock(any());
    let close = door.expect().close();
    in_order(&[&open, &knock, &close]);
    door.open();
    door.close();
}

/// Prerequisites that are satisfied, but not yet exhausted, are enough
#[test]
fn satisfied_is_enough() {
    let ctrl = Controller::new();
    let door = MockDoor::new(&ctrl);
    let knock = door.expect().knock(any()).min_times(1);
    door.expect().open().after(&knock);
    door.knock(1);
    door.open();
    ctrl.finish();
}

/// Once a call with prerequisites matches, its prerequisites are retired.
#[test]
#[should_panic(expected = "was retired by a later call that depends on it")]
fn prerequisites_retire() {
    let ctrl = Controller::new();
    let door = MockDoor::new(&ctrl);
    let knock = door.expect().knock(any()).min_times(1);
    door.expect().open().after(&knock);
    door.knock(1);
    door.open();
    door.knock(2);
}

/// Calls across different mocks of one controller may be ordered
#[test]
fn across_mocks() {
    let ctrl = Controller::new();
    let front = MockDoor::new(&ctrl);
    let back = MockDoor::new(&ctrl);
    let first = front.expect().open();
    back.expect().open().after(&first);
    front.open();
    back.open();
    ctrl.finish();
}

#[test]
#[should_panic(expected = "Loop in call order")]
fn cycle() {
    let ctrl = Controller::new();
    let door = MockDoor::new(&ctrl);
    let open = door.expect().open();
    let knock = door.expect().knock(any()).after(&open);
    let close = door.expect().close().after(&knock);
    open.after(&close);
}

#[test]
fn cycle_is_reported_at_declaration() {
    let reporter = RecordingReporter::default();
    let ctrl = Controller::with_reporter(reporter.clone(), Config::default());
    let door = MockDoor::new(&ctrl);
    let open = door.expect().open();
    let close = door.expect().close().after(&open);

    assert!(matches!(open.try_after(&close), Err(OrderError::Cycle { .. })));
    assert!(matches!(open.try_after(&open),
                     Err(OrderError::OwnPrerequisite { .. })));

    let msg = expect_failure(|| { open.clone().after(&close); });
    assert!(msg.starts_with("Loop in call order: "), "{}", msg);
    assert_eq!(vec![msg], reporter.fatals());

    door.open();
    door.close();
    ctrl.finish();
}

#[test]
fn different_controllers() {
    let ctrl1 = Controller::new();
    let ctrl2 = Controller::new();
    let door1 = MockDoor::new(&ctrl1);
    let door2 = MockDoor::new(&ctrl2);
    let open = door1.expect().open().any_times();
    let close = door2.expect().close().any_times();
    assert!(matches!(close.try_after(&open),
                     Err(OrderError::ForeignController { .. })));
}
