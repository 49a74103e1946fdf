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

//! The dispatch loop tying an event queue to an executor pool.

use crate::config::SchedulerConfig;
use crate::pool::ExecutorPool;
use crate::telemetry::DispatchStats;
use cadence_core::{BucketedEventQueue, Clock, EventQueue, SchedulerError, TimedEvent};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// What a single [`Manager::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Events that became due during this tick.
    pub due: usize,
    /// Events handed to a worker, including replayed overflow.
    pub dispatched: usize,
    /// Events left waiting for a free worker.
    pub deferred: usize,
    /// Idle workers reaped.
    pub reaped: usize,
}

/// Owns the pending events and the executor pool, and moves due events
/// from one to the other each time it is ticked.
///
/// A `Manager` is driven from a single thread through `&mut self`. To
/// submit from several threads, put it behind a `Mutex`.
pub struct Manager<Q: EventQueue = BucketedEventQueue> {
    queue: Q,
    pool: ExecutorPool,
    overflow: VecDeque<TimedEvent>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    last_reap: f64,
    overflow_warned: bool,
    stats: DispatchStats,
}

impl Manager<BucketedEventQueue> {
    /// Creates a manager with the default bucketed queue, whose watermark
    /// starts at the clock's current time.
    ///
    /// Fails if the configuration is invalid or the clock cannot be read.
    pub fn new(config: SchedulerConfig, clock: Arc<dyn Clock>) -> Result<Self, SchedulerError> {
        let start = clock.try_now()?;
        Self::with_queue(config, clock, BucketedEventQueue::new(start))
    }
}

impl<Q: EventQueue> Manager<Q> {
    /// Creates a manager around an existing queue.
    pub fn with_queue(
        config: SchedulerConfig,
        clock: Arc<dyn Clock>,
        queue: Q,
    ) -> Result<Self, SchedulerError> {
        let now = clock.try_now()?;
        let pool = ExecutorPool::new(&config, now)?;
        log::info!(
            "Event manager started at {now:.3} (max {} concurrent, idle timeout {:.1}s).",
            config.max_concurrency,
            config.idle_timeout_secs
        );
        Ok(Self {
            queue,
            pool,
            overflow: VecDeque::new(),
            clock,
            config,
            last_reap: now,
            overflow_warned: false,
            stats: DispatchStats::default(),
        })
    }

    /// Submits an event. Returns `false` if it was already overdue and was dropped.
    pub fn add_event(&mut self, event: TimedEvent) -> bool {
        let accepted = self.queue.submit(event);
        if accepted {
            self.stats.submitted += 1;
        } else {
            self.stats.missed += 1;
        }
        accepted
    }

    /// Dispatches every event due at `current_time`.
    ///
    /// Events left over from earlier ticks go first, in fire-time order,
    /// followed by newly due ones. When the pool is full the rest stay in
    /// the overflow buffer until a later tick; this never blocks. Idle
    /// workers are reaped at the end.
    ///
    /// A `current_time` before the previous tick (or NaN) only replays the
    /// overflow: nothing new is drained and no worker is reaped.
    pub fn tick(&mut self, current_time: f64) -> TickReport {
        self.stats.ticks += 1;

        let in_order = current_time >= self.queue.watermark();
        if in_order {
            self.pool.advance_time(current_time);
        }

        // Everything drained is later than the overflow, so appending keeps order.
        let due = self.queue.drain_due(current_time);
        let mut report = TickReport {
            due: due.len(),
            ..Default::default()
        };
        self.overflow.extend(due);

        while let Some(event) = self.overflow.pop_front() {
            match self.pool.try_acquire() {
                Some(executor) => {
                    self.pool.run(executor, event);
                    report.dispatched += 1;
                }
                None => {
                    self.overflow.push_front(event);
                    break;
                }
            }
        }

        report.deferred = self.overflow.len();
        self.record_backpressure(report.deferred);
        self.stats.dispatched += report.dispatched as u64;

        if in_order && self.reap_due(current_time) {
            report.reaped = self.pool.reap_idle(current_time);
            self.last_reap = current_time;
        }

        report
    }

    /// Ticks at the clock's current time.
    pub fn tick_now(&mut self) -> TickReport {
        let now = self.clock.now();
        self.tick(now)
    }

    fn record_backpressure(&mut self, deferred: usize) {
        if deferred == 0 {
            self.overflow_warned = false;
            return;
        }
        self.stats.deferrals += deferred as u64;
        self.stats.peak_overflow = self.stats.peak_overflow.max(deferred as u64);
        log::debug!("Executor pool saturated: {deferred} event(s) deferred.");

        if deferred > self.config.overflow_warn_threshold && !self.overflow_warned {
            log::warn!(
                "{deferred} due events are waiting for a worker (max {} concurrent).",
                self.config.max_concurrency
            );
            self.overflow_warned = true;
            self.stats.backpressure_warnings += 1;
        }
    }

    fn reap_due(&self, current_time: f64) -> bool {
        self.config.reap_interval_secs <= 0.0
            || current_time - self.last_reap >= self.config.reap_interval_secs
    }

    /// The earliest time at which there will be something to dispatch.
    ///
    /// Deferred events are already due, so with a non-empty overflow this is
    /// the current clock time.
    pub fn next_fire_time(&mut self) -> Option<f64> {
        if !self.overflow.is_empty() {
            return Some(self.clock.now());
        }
        self.queue.next_fire_time()
    }

    /// Events not yet handed to a worker, queued or deferred.
    pub fn pending(&self) -> usize {
        self.queue.len() + self.overflow.len()
    }

    /// Due events waiting for a free worker.
    pub fn overflow_len(&self) -> usize {
        self.overflow.len()
    }

    /// The underlying event queue.
    pub fn queue(&self) -> &Q {
        &self.queue
    }

    /// The executor pool.
    pub fn pool(&self) -> &ExecutorPool {
        &self.pool
    }

    /// The clock this manager reads for `tick_now`.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The active configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Dispatch counters, including the pool's.
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            pool: self.pool.stats(),
            ..self.stats
        }
    }

    /// Waits up to `timeout` for running payloads, then stops every worker.
    ///
    /// Pending and deferred events are dropped. Returns `true` if all
    /// payloads finished in time.
    pub fn shutdown(&mut self, timeout: Duration) -> bool {
        let dropped = self.pending();
        if dropped > 0 {
            log::warn!("Shutting down with {dropped} undispatched event(s).");
        }
        while self.queue.pop_next().is_some() {}
        self.overflow.clear();

        let clean = self.pool.shutdown(timeout);
        log::info!("Event manager stopped.");
        clean
    }
}
