// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{Clock, FakeClock, SystemClock};

#[test]
fn system_clock_is_monotonic_enough() {
    let a = SystemClock.now_ts();
    let b = SystemClock.now_ts();
    assert!(b >= a);
    assert!(a > 1_600_000_000.0);
}

#[test]
fn fake_clock_advances() {
    let clock = FakeClock::new(100.0);
    assert_eq!(clock.now_ts(), 100.0);
    clock.advance(2.5);
    assert_eq!(clock.now_ts(), 102.5);
}

#[test]
fn fake_clock_clones_share_time() {
    let clock = FakeClock::new(1.0);
    let other = clock.clone();
    clock.advance(1.0);
    assert_eq!(other.now_ts(), 2.0);
}
