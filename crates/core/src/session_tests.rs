// SPDX-License-Identifier: MIT

use super::*;
use crate::clock::FakeClock;

#[test]
fn new_session_is_created_with_zero_turns() {
    let clock = FakeClock::new();
    let s = Session::new(
        TaskId::new(),
        PathBuf::from("/tmp/work"),
        "sonnet",
        PathBuf::from("/tmp/work/stdout.log"),
        PathBuf::from("/tmp/work/stderr.log"),
        &clock,
    );
    assert_eq!(s.status, SessionStatus::Created);
    assert_eq!(s.num_turns, 0);
    assert!(s.pid.is_none());
}

#[test]
fn terminal_statuses() {
    assert!(SessionStatus::Completed.is_terminal());
    assert!(SessionStatus::Failed.is_terminal());
    assert!(SessionStatus::Cancelled.is_terminal());
    assert!(!SessionStatus::Running.is_terminal());
    assert!(!SessionStatus::Created.is_terminal());
}
