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

//! Sorted-vector store.

use super::{EventQueue, Scheduled, Watermark};
use crate::error::ScheduleError;
use crate::event::TimedEvent;

/// An event store kept fully sorted on every insert.
///
/// Inserts binary-search their slot (after any equal keys) and shift the
/// tail, so they cost O(n). Draining is a single prefix split. Suited to
/// small queues that are read far more often than written.
#[derive(Debug)]
pub struct SortedEventQueue {
    events: Vec<Scheduled>,
    watermark: Watermark,
}

impl SortedEventQueue {
    /// Creates an empty store whose watermark starts at `start_time`.
    pub fn new(start_time: f64) -> Self {
        Self {
            events: Vec::new(),
            watermark: Watermark::new(start_time),
        }
    }
}

impl EventQueue for SortedEventQueue {
    fn try_submit(&mut self, event: TimedEvent) -> Result<(), ScheduleError> {
        let scheduled = self.watermark.admit(event)?;
        let index = self.events.partition_point(|s| s.key <= scheduled.key);
        self.events.insert(index, scheduled);
        Ok(())
    }

    fn drain_due(&mut self, current_time: f64) -> Vec<TimedEvent> {
        if !self.watermark.accepts_drain(current_time) {
            return Vec::new();
        }
        let split = self
            .events
            .partition_point(|s| s.key.fire_time <= current_time);
        self.watermark.advance(current_time);
        self.events.drain(..split).map(|s| s.event).collect()
    }

    fn pop_next(&mut self) -> Option<TimedEvent> {
        if self.events.is_empty() {
            return None;
        }
        Some(self.events.remove(0).event)
    }

    fn next_fire_time(&mut self) -> Option<f64> {
        self.events.first().map(|s| s.key.fire_time)
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn watermark(&self) -> f64 {
        self.watermark.time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_stays_sorted_after_each_insert() {
        let mut queue = SortedEventQueue::new(0.0);
        for t in [4.0, 1.0, 3.0, 1.0, 2.0] {
            queue.submit(TimedEvent::from_fn(t, || Ok(())));
            assert!(queue.events.windows(2).all(|w| w[0].key < w[1].key));
        }
        assert_eq!(queue.next_fire_time(), Some(1.0));
        assert_eq!(queue.drain_due(2.5).len(), 3);
        assert_eq!(queue.len(), 2);
    }
}
