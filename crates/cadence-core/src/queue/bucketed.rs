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

//! The default store: events grouped into one-second buckets.

use super::{EventQueue, Scheduled, Watermark};
use crate::error::ScheduleError;
use crate::event::TimedEvent;
use std::collections::{BTreeMap, VecDeque};

/// Events falling inside one one-second window.
///
/// Appends only mark the bucket dirty; it is sorted the next time it is read.
#[derive(Debug, Default)]
struct Bucket {
    events: VecDeque<Scheduled>,
    dirty: bool,
}

impl Bucket {
    fn push(&mut self, scheduled: Scheduled) {
        self.events.push_back(scheduled);
        self.dirty = true;
    }

    fn sorted(&mut self) -> &mut VecDeque<Scheduled> {
        if self.dirty {
            // Keys are unique, so an unstable sort keeps submission order for ties.
            self.events.make_contiguous().sort_unstable();
            self.dirty = false;
        }
        &mut self.events
    }
}

#[inline]
fn bucket_key(time: f64) -> i64 {
    time.floor() as i64
}

/// An event store keyed by `floor(fire_time)`.
///
/// Draining walks only the buckets between the watermark and the current
/// time, and each bucket is sorted at most once per batch of inserts, so a
/// tick costs O(k log k) in the number of due events rather than in the
/// size of the whole store.
#[derive(Debug)]
pub struct BucketedEventQueue {
    buckets: BTreeMap<i64, Bucket>,
    watermark: Watermark,
    len: usize,
}

impl BucketedEventQueue {
    /// Creates an empty store whose watermark starts at `start_time`.
    pub fn new(start_time: f64) -> Self {
        Self {
            buckets: BTreeMap::new(),
            watermark: Watermark::new(start_time),
            len: 0,
        }
    }

    /// The number of non-empty one-second buckets currently held.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl EventQueue for BucketedEventQueue {
    fn try_submit(&mut self, event: TimedEvent) -> Result<(), ScheduleError> {
        let scheduled = self.watermark.admit(event)?;
        self.buckets
            .entry(bucket_key(scheduled.key.fire_time))
            .or_default()
            .push(scheduled);
        self.len += 1;
        Ok(())
    }

    fn drain_due(&mut self, current_time: f64) -> Vec<TimedEvent> {
        if !self.watermark.accepts_drain(current_time) {
            return Vec::new();
        }

        let current_key = bucket_key(current_time);
        let mut due = Vec::new();

        // Every bucket below the current second has fully elapsed.
        let pending = self.buckets.split_off(&current_key);
        let elapsed = std::mem::replace(&mut self.buckets, pending);
        for (_, mut bucket) in elapsed {
            due.extend(bucket.sorted().drain(..).map(|s| s.event));
        }

        // The current second is only partially due.
        let mut exhausted = false;
        if let Some(bucket) = self.buckets.get_mut(&current_key) {
            let events = bucket.sorted();
            while events
                .front()
                .is_some_and(|s| s.key.fire_time <= current_time)
            {
                if let Some(s) = events.pop_front() {
                    due.push(s.event);
                }
            }
            exhausted = events.is_empty();
        }
        if exhausted {
            self.buckets.remove(&current_key);
        }

        self.len -= due.len();
        self.watermark.advance(current_time);
        if !due.is_empty() {
            log::trace!(
                "Drained {} due event(s) at {current_time:.6}, {} pending.",
                due.len(),
                self.len
            );
        }
        due
    }

    fn pop_next(&mut self) -> Option<TimedEvent> {
        let mut entry = self.buckets.first_entry()?;
        let scheduled = entry.get_mut().sorted().pop_front();
        if entry.get().events.is_empty() {
            entry.remove();
        }
        let scheduled = scheduled?;
        self.len -= 1;
        Some(scheduled.event)
    }

    fn next_fire_time(&mut self) -> Option<f64> {
        let (_, bucket) = self.buckets.iter_mut().next()?;
        bucket.sorted().front().map(|s| s.key.fire_time)
    }

    fn len(&self) -> usize {
        self.len
    }

    fn watermark(&self) -> f64 {
        self.watermark.time()
    }
}
