// SPDX-License-Identifier: MIT

//! Clock abstraction for testable time handling.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A clock that provides the current time.
///
/// Every timestamp the scheduler produces (heartbeat `last_beat`, session
/// timestamps, rate-limit `reset_at`) goes through this trait so tests can
/// advance time deterministically instead of sleeping.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;
    fn epoch_ms(&self) -> u64;
}

/// Real system clock.
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Fake clock for testing with controllable time.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
    epoch_ms: Arc<Mutex<u64>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { current: Arc::new(Mutex::new(Instant::now())), epoch_ms: Arc::new(Mutex::new(1_700_000_000_000)) }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
        *self.epoch_ms.lock() += duration.as_millis() as u64;
    }

    pub fn set_epoch_ms(&self, ms: u64) {
        *self.epoch_ms.lock() = ms;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn epoch_ms(&self) -> u64 {
        *self.epoch_ms.lock()
    }
}

/// Object-safe sliver of [`Clock`] (just `epoch_ms`), so components that
/// want a `dyn`-shared clock handle (rather than threading a generic `C:
/// Clock` parameter through every type) can hold `Arc<dyn TimeSource>`.
/// [`Clock`] itself can't be made into a trait object because it requires
/// `Clone`.
pub trait TimeSource: Send + Sync {
    fn epoch_ms(&self) -> u64;
}

impl<C: Clock> TimeSource for C {
    fn epoch_ms(&self) -> u64 {
        Clock::epoch_ms(self)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
