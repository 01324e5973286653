// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for job timestamps.
//!
//! Staleness compares completion timestamps of parents and children, so tests
//! need a clock they can step deterministically.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A clock that provides the current wall time
pub trait Clock: Send + Sync {
    fn epoch_ms(&self) -> u64;

    /// Epoch time in fractional seconds, the unit of job timestamps.
    fn epoch_secs(&self) -> f64 {
        self.epoch_ms() as f64 / 1000.0
    }
}

/// Real system clock
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn epoch_ms(&self) -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Fake clock for testing with controllable time.
///
/// Clones share the same time. With `auto_tick` every reading advances the
/// clock by one millisecond, which keeps completion order visible in
/// timestamps without sleeping.
#[derive(Clone, Debug)]
pub struct FakeClock {
    epoch_ms: Arc<Mutex<u64>>,
    auto_tick: bool,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { epoch_ms: Arc::new(Mutex::new(1_000_000)), auto_tick: false }
    }

    /// A clock that moves forward by 1ms on every read.
    pub fn ticking() -> Self {
        Self { auto_tick: true, ..Self::new() }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        *self.epoch_ms.lock() += duration.as_millis() as u64;
    }

    /// Set the epoch milliseconds value
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
    fn epoch_ms(&self) -> u64 {
        let mut ms = self.epoch_ms.lock();
        let now = *ms;
        if self.auto_tick {
            *ms += 1;
        }
        now
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
