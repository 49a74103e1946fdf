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

//! Binary min-heap store.

use super::{EventQueue, Scheduled, Watermark};
use crate::error::ScheduleError;
use crate::event::TimedEvent;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// An event store backed by a binary min-heap.
///
/// O(log n) per insert and per drained event. Prefer it over
/// [`BucketedEventQueue`](super::BucketedEventQueue) when fire times are
/// spread thinly over long spans.
#[derive(Debug)]
pub struct HeapEventQueue {
    // BinaryHeap is a max-heap; Reverse makes the earliest key the top.
    heap: BinaryHeap<Reverse<Scheduled>>,
    watermark: Watermark,
}

impl HeapEventQueue {
    /// Creates an empty store whose watermark starts at `start_time`.
    pub fn new(start_time: f64) -> Self {
        Self {
            heap: BinaryHeap::new(),
            watermark: Watermark::new(start_time),
        }
    }
}

impl EventQueue for HeapEventQueue {
    fn try_submit(&mut self, event: TimedEvent) -> Result<(), ScheduleError> {
        let scheduled = self.watermark.admit(event)?;
        self.heap.push(Reverse(scheduled));
        Ok(())
    }

    fn drain_due(&mut self, current_time: f64) -> Vec<TimedEvent> {
        if !self.watermark.accepts_drain(current_time) {
            return Vec::new();
        }
        let mut due = Vec::new();
        while self
            .heap
            .peek()
            .is_some_and(|Reverse(s)| s.key.fire_time <= current_time)
        {
            if let Some(Reverse(s)) = self.heap.pop() {
                due.push(s.event);
            }
        }
        self.watermark.advance(current_time);
        due
    }

    fn pop_next(&mut self) -> Option<TimedEvent> {
        self.heap.pop().map(|Reverse(s)| s.event)
    }

    fn next_fire_time(&mut self) -> Option<f64> {
        self.heap.peek().map(|Reverse(s)| s.key.fire_time)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }

    fn watermark(&self) -> f64 {
        self.watermark.time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_times_come_out_in_submission_order() {
        let mut queue = HeapEventQueue::new(0.0);
        for label in ["a", "b", "c", "d"] {
            queue.submit(TimedEvent::from_fn(2.0, || Ok(())).with_label(label));
        }
        queue.submit(TimedEvent::from_fn(1.0, || Ok(())).with_label("first"));

        let labels: Vec<_> = queue
            .drain_due(2.0)
            .iter()
            .map(|e| e.label().to_owned())
            .collect();
        assert_eq!(labels, vec!["first", "a", "b", "c", "d"]);
    }
}
