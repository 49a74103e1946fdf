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

//! Elapsed-time measurement on top of a [`Clock`].

use crate::clock::Clock;
use std::sync::Arc;

/// Measures elapsed time against a [`Clock`].
///
/// A stopwatch is either running or stopped. While stopped it keeps
/// reporting the time that had elapsed when it was stopped.
#[derive(Debug, Clone)]
pub struct Stopwatch {
    clock: Arc<dyn Clock>,
    start_time: f64,
    stopped_at: Option<f64>,
}

impl Stopwatch {
    /// Creates a stopwatch started at the clock's current time.
    /// ## Arguments
    /// * `clock` - The time source to measure against.
    /// ## Returns
    /// A running Stopwatch.
    pub fn start(clock: Arc<dyn Clock>) -> Self {
        let start_time = clock.now();
        Self {
            clock,
            start_time,
            stopped_at: None,
        }
    }

    /// Returns `true` until [`stop`](Self::stop) is called.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.stopped_at.is_none()
    }

    /// Stops the stopwatch and returns the seconds elapsed since it was started.
    ///
    /// Returns `0.0` if it was already stopped.
    pub fn stop(&mut self) -> f64 {
        if self.stopped_at.is_some() {
            return 0.0;
        }
        let now = self.clock.now();
        self.stopped_at = Some(now);
        now - self.start_time
    }

    /// Returns the seconds elapsed since the stopwatch was started or last
    /// reset, up to the moment it was stopped.
    #[inline]
    pub fn elapsed_secs(&self) -> f64 {
        self.stopped_at.unwrap_or_else(|| self.clock.now()) - self.start_time
    }

    /// Returns the elapsed seconds and restarts the stopwatch from now.
    pub fn lap(&mut self) -> f64 {
        let elapsed = self.elapsed_secs();
        self.reset();
        elapsed
    }

    /// Restarts the stopwatch from now, running.
    pub fn reset(&mut self) {
        self.start_time = self.clock.now();
        self.stopped_at = None;
    }

    /// The clock time at which the stopwatch was started or last reset.
    #[inline]
    pub fn start_time(&self) -> f64 {
        self.start_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use approx::assert_relative_eq;

    #[test]
    fn stopwatch_tracks_manual_clock() {
        let clock = Arc::new(ManualClock::new(10.0));
        let mut watch = Stopwatch::start(clock.clone());
        assert_relative_eq!(watch.elapsed_secs(), 0.0);

        clock.advance(1.5);
        assert_relative_eq!(watch.elapsed_secs(), 1.5);

        assert_relative_eq!(watch.lap(), 1.5);
        assert_relative_eq!(watch.start_time(), 11.5);
        assert_relative_eq!(watch.elapsed_secs(), 0.0);

        clock.advance(0.5);
        watch.reset();
        assert_relative_eq!(watch.elapsed_secs(), 0.0);
    }

    #[test]
    fn stop_freezes_elapsed_time_and_only_counts_once() {
        let clock = Arc::new(ManualClock::new(0.0));
        let mut watch = Stopwatch::start(clock.clone());
        assert!(watch.is_running());

        clock.advance(2.0);
        assert_relative_eq!(watch.stop(), 2.0);
        assert!(!watch.is_running());

        clock.advance(3.0);
        assert_relative_eq!(watch.elapsed_secs(), 2.0);
        assert_relative_eq!(watch.stop(), 0.0);

        watch.reset();
        assert!(watch.is_running());
        clock.advance(1.0);
        assert_relative_eq!(watch.stop(), 1.0);
    }
}
