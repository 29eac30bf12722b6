// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling

use std::time::{SystemTime, UNIX_EPOCH};

/// A clock providing the current wall-clock time as epoch seconds.
///
/// Object-safe so the store can hold `Arc<dyn Clock>`.
pub trait Clock: Send + Sync {
    fn now_ts(&self) -> f64;
}

/// Real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ts(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }
}

/// Fake clock for testing with controllable time
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeClock {
    current: std::sync::Arc<parking_lot::Mutex<f64>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeClock {
    pub fn new(start: f64) -> Self {
        Self {
            current: std::sync::Arc::new(parking_lot::Mutex::new(start)),
        }
    }

    /// Advance the clock by the given number of seconds
    pub fn advance(&self, secs: f64) {
        *self.current.lock() += secs;
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Clock for FakeClock {
    fn now_ts(&self) -> f64 {
        *self.current.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
