// SPDX-License-Identifier: MIT

use super::*;
use std::time::Duration;

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new();
    let t0 = clock.epoch_ms();
    clock.advance(Duration::from_secs(300));
    assert_eq!(clock.epoch_ms(), t0 + 300_000);
}

#[test]
fn fake_clock_now_advances_too() {
    let clock = FakeClock::new();
    let i0 = clock.now();
    clock.advance(Duration::from_secs(1));
    assert!(clock.now() > i0);
}

#[test]
fn system_clock_epoch_ms_is_plausible() {
    let clock = SystemClock;
    // Should be well after this code was written.
    assert!(clock.epoch_ms() > 1_700_000_000_000);
}
