// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Time sources consumed by the scheduler.
//!
//! The scheduler never generates time itself. It asks a [`Clock`] for the
//! current time as seconds in an `f64` and only ever compares those values,
//! so any source works as long as it does not run backwards.

use crate::error::SchedulerError;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of the current time, in seconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Returns the current time in seconds.
    fn now(&self) -> f64;

    /// Returns the current time, or an error if this clock cannot produce one.
    ///
    /// Schedulers call this once at construction and refuse to start on error.
    fn try_now(&self) -> Result<f64, SchedulerError> {
        let now = self.now();
        if now.is_finite() {
            Ok(now)
        } else {
            Err(SchedulerError::ClockUnavailable(format!(
                "clock returned non-finite time {now}"
            )))
        }
    }
}

/// Wall-clock time as seconds since the Unix epoch.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    _private: (),
}

impl SystemClock {
    /// Creates a system clock, checking that the platform clock is usable.
    pub fn new() -> Result<Self, SchedulerError> {
        let clock = Self { _private: () };
        clock.try_now()?;
        Ok(clock)
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    fn try_now(&self) -> Result<f64, SchedulerError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .map_err(|e| SchedulerError::ClockUnavailable(e.to_string()))
    }
}

/// Monotonic time as seconds elapsed since the clock was created, plus an offset.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
    offset: f64,
}

impl MonotonicClock {
    /// Creates a clock that reads `0.0` now.
    pub fn new() -> Self {
        Self::with_offset(0.0)
    }

    /// Creates a clock that reads `offset` now.
    pub fn with_offset(offset: f64) -> Self {
        Self {
            origin: Instant::now(),
            offset,
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.offset + self.origin.elapsed().as_secs_f64()
    }
}

/// A clock that only moves when told to.
///
/// Used for offline stepping and tests. The time is stored as raw `f64` bits
/// so it can be shared between threads behind an `Arc`.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock reading `start`.
    pub fn new(start: f64) -> Self {
        Self {
            bits: AtomicU64::new(start.to_bits()),
        }
    }

    /// Sets the current time.
    pub fn set(&self, time: f64) {
        self.bits.store(time.to_bits(), Ordering::SeqCst);
    }

    /// Moves the current time forward by `delta` seconds and returns the new time.
    pub fn advance(&self, delta: f64) -> f64 {
        let mut current = self.bits.load(Ordering::SeqCst);
        loop {
            let next = (f64::from_bits(current) + delta).to_bits();
            match self
                .bits
                .compare_exchange_weak(current, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return f64::from_bits(next),
                Err(actual) => current = actual,
            }
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::SeqCst))
    }
}
