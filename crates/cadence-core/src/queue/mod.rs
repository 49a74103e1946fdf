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

//! Stores of pending timed events.
//!
//! Every store implements [`EventQueue`] and shares the same watermark rules:
//!
//! - an event is admitted only if its fire time is finite and strictly after
//!   the watermark, otherwise it is dropped and reported as missed;
//! - [`EventQueue::drain_due`] returns every event with `fire_time <= t` in
//!   `(fire_time, submission order)` order and moves the watermark to `t`;
//! - a drain with a time earlier than the watermark is ignored.
//!
//! [`BucketedEventQueue`] is the default. [`HeapEventQueue`] and
//! [`SortedEventQueue`] trade insert cost against drain cost differently.

mod bucketed;
mod heap;
mod sorted;

pub use bucketed::BucketedEventQueue;
pub use heap::HeapEventQueue;
pub use sorted::SortedEventQueue;

use crate::error::ScheduleError;
use crate::event::TimedEvent;
use std::cmp::Ordering;

/// A time-indexed store of pending events.
///
/// Stores are single-owner: all mutation goes through `&mut self`, so a
/// store shared between submitting threads must be wrapped in a lock.
pub trait EventQueue: Send {
    /// Inserts `event`, or explains why it was rejected.
    ///
    /// A rejected event is dropped.
    fn try_submit(&mut self, event: TimedEvent) -> Result<(), ScheduleError>;

    /// Inserts `event`, returning `false` and logging a warning if it was rejected.
    fn submit(&mut self, event: TimedEvent) -> bool {
        match self.try_submit(event) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Warning: {e}");
                false
            }
        }
    }

    /// Removes and returns every event with `fire_time <= current_time`,
    /// earliest first, then advances the watermark to `current_time`.
    ///
    /// Callers must pass non-decreasing times. A time before the watermark
    /// returns nothing and leaves the store untouched.
    fn drain_due(&mut self, current_time: f64) -> Vec<TimedEvent>;

    /// Removes and returns the earliest pending event, due or not.
    ///
    /// The watermark is not moved.
    fn pop_next(&mut self) -> Option<TimedEvent>;

    /// The fire time of the earliest pending event.
    fn next_fire_time(&mut self) -> Option<f64>;

    /// The number of pending events.
    fn len(&self) -> usize;

    /// Returns `true` if no events are pending.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The time up to which events have been drained.
    fn watermark(&self) -> f64;
}

/// Total order over queued events: fire time, then submission sequence.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EventKey {
    pub(crate) fire_time: f64,
    pub(crate) seq: u64,
}

impl PartialEq for EventKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventKey {}

impl PartialOrd for EventKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.fire_time
            .total_cmp(&other.fire_time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// An admitted event together with its ordering key.
#[derive(Debug)]
pub(crate) struct Scheduled {
    pub(crate) key: EventKey,
    pub(crate) event: TimedEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Admission and drain bookkeeping shared by every store.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Watermark {
    time: f64,
    next_seq: u64,
}

impl Watermark {
    pub(crate) fn new(start_time: f64) -> Self {
        Self {
            time: start_time,
            next_seq: 0,
        }
    }

    #[inline]
    pub(crate) fn time(&self) -> f64 {
        self.time
    }

    /// Checks `event` against the watermark and stamps it with the next sequence number.
    pub(crate) fn admit(&mut self, event: TimedEvent) -> Result<Scheduled, ScheduleError> {
        let fire_time = event.fire_time();
        if !fire_time.is_finite() {
            return Err(ScheduleError::NonFiniteFireTime(fire_time));
        }
        if fire_time <= self.time {
            return Err(ScheduleError::MissedEvent {
                fire_time,
                watermark: self.time,
            });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(Scheduled {
            key: EventKey { fire_time, seq },
            event,
        })
    }

    /// Returns `false` (and warns) if `current_time` would move the watermark backwards.
    pub(crate) fn accepts_drain(&self, current_time: f64) -> bool {
        if current_time.is_nan() || current_time < self.time {
            log::warn!(
                "Ignoring drain at {current_time:.6}: time is before the watermark {:.6}",
                self.time
            );
            return false;
        }
        true
    }

    #[inline]
    pub(crate) fn advance(&mut self, current_time: f64) {
        self.time = current_time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(fire_time: f64) -> TimedEvent {
        TimedEvent::from_fn(fire_time, || Ok(()))
    }

    #[test]
    fn keys_order_by_time_then_sequence() {
        let a = EventKey {
            fire_time: 1.0,
            seq: 5,
        };
        let b = EventKey {
            fire_time: 1.0,
            seq: 6,
        };
        let c = EventKey {
            fire_time: 0.5,
            seq: 9,
        };
        assert!(a < b);
        assert!(c < a);
        let mut keys = vec![b, a, c];
        keys.sort();
        assert_eq!(keys, vec![c, a, b]);
    }

    #[test]
    fn watermark_admits_only_future_finite_events() {
        let mut wm = Watermark::new(10.0);

        let first = wm.admit(noop(10.5)).expect("future event is admitted");
        let second = wm.admit(noop(10.5)).expect("future event is admitted");
        assert!(first.key < second.key);

        assert_eq!(
            wm.admit(noop(10.0)).err(),
            Some(ScheduleError::MissedEvent {
                fire_time: 10.0,
                watermark: 10.0
            })
        );
        assert!(matches!(
            wm.admit(noop(f64::INFINITY)),
            Err(ScheduleError::NonFiniteFireTime(_))
        ));
    }

    #[test]
    fn watermark_rejects_backwards_and_nan_drains() {
        let mut wm = Watermark::new(10.0);
        assert!(wm.accepts_drain(10.0));
        assert!(wm.accepts_drain(11.0));
        wm.advance(11.0);
        assert!(!wm.accepts_drain(10.5));
        assert!(!wm.accepts_drain(f64::NAN));
    }
}
