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

//! Timed events: a fire time paired with an executable payload.

use crate::clock::Clock;
use std::borrow::Cow;
use std::fmt;

/// An executable effect carried by a [`TimedEvent`].
///
/// Payloads run on worker threads, so they must be `Send`. A returned error
/// is reported by the worker and never stops it from taking further events.
pub trait Payload: Send {
    /// Performs the effect.
    fn execute(&mut self) -> anyhow::Result<()>;
}

impl<F> Payload for F
where
    F: FnMut() -> anyhow::Result<()> + Send,
{
    fn execute(&mut self) -> anyhow::Result<()> {
        self()
    }
}

/// A payload scheduled to fire at a fixed time.
///
/// The fire time is fixed at construction. Events are ordered by fire time;
/// queues break ties by submission order.
pub struct TimedEvent {
    fire_time: f64,
    label: Cow<'static, str>,
    payload: Box<dyn Payload>,
}

impl TimedEvent {
    /// Creates an event firing at the absolute time `fire_time` (seconds).
    pub fn new(fire_time: f64, payload: impl Payload + 'static) -> Self {
        Self {
            fire_time,
            label: Cow::Borrowed(""),
            payload: Box::new(payload),
        }
    }

    /// Creates an event whose payload is a closure.
    pub fn from_fn<F>(fire_time: f64, f: F) -> Self
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        Self::new(fire_time, f)
    }

    /// Creates an event firing `delay` seconds after the clock's current time.
    pub fn after(clock: &dyn Clock, delay: f64, payload: impl Payload + 'static) -> Self {
        Self::new(clock.now() + delay, payload)
    }

    /// Creates an event firing at the clock's current time.
    pub fn now(clock: &dyn Clock, payload: impl Payload + 'static) -> Self {
        Self::new(clock.now(), payload)
    }

    /// Attaches a label used in log messages.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = label.into();
        self
    }

    /// The time this event fires at, in seconds.
    #[inline]
    pub fn fire_time(&self) -> f64 {
        self.fire_time
    }

    /// The label given with [`with_label`](Self::with_label), or `""`.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the payload.
    pub fn execute(&mut self) -> anyhow::Result<()> {
        self.payload.execute()
    }
}

impl fmt::Debug for TimedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedEvent")
            .field("fire_time", &self.fire_time)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TimedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.label.is_empty() {
            write!(f, "event@{:.3}", self.fire_time)
        } else {
            write!(f, "'{}'@{:.3}", self.label, self.fire_time)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn after_adds_delay_to_clock_time() {
        let clock = ManualClock::new(100.0);
        let event = TimedEvent::after(&clock, 2.5, Counter(0));
        assert_relative_eq!(event.fire_time(), 102.5);

        let event = TimedEvent::now(&clock, Counter(0));
        assert_relative_eq!(event.fire_time(), 100.0);
    }

    #[test]
    fn execute_runs_closure_payload() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        let mut event = TimedEvent::from_fn(1.0, move || {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        event.execute().expect("payload should succeed");
        event.execute().expect("payload should succeed");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn execute_surfaces_payload_error() {
        let mut event = TimedEvent::from_fn(1.0, || Err(anyhow::anyhow!("boom")));
        let err = event.execute().expect_err("payload should fail");
        assert_eq!(err.to_string(), "boom");
    }

    struct Counter(u32);

    impl Payload for Counter {
        fn execute(&mut self) -> anyhow::Result<()> {
            self.0 += 1;
            Ok(())
        }
    }

    #[test]
    fn display_uses_label_when_present() {
        let event = TimedEvent::new(3.0, Counter(0)).with_label("spawn-wave");
        assert_eq!(event.label(), "spawn-wave");
        assert_eq!(event.to_string(), "'spawn-wave'@3.000");
        assert_eq!(TimedEvent::new(3.0, Counter(0)).to_string(), "event@3.000");
    }
}
