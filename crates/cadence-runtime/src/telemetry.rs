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

//! Dispatch counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// How a payload run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RunOutcome {
    Completed,
    Failed,
    Panicked,
}

/// Live counters updated by the pool and its workers.
#[derive(Debug, Default)]
pub(crate) struct PoolStats {
    spawned: AtomicU64,
    reaped: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
}

impl PoolStats {
    pub(crate) fn record_spawn(&self) {
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reaped(&self, count: usize) {
        self.reaped.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_run(&self, outcome: RunOutcome) {
        let counter = match outcome {
            RunOutcome::Completed => &self.completed,
            RunOutcome::Failed => &self.failed,
            RunOutcome::Panicked => &self.panicked,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            workers_spawned: self.spawned.load(Ordering::Relaxed),
            workers_reaped: self.reaped.load(Ordering::Relaxed),
            events_completed: self.completed.load(Ordering::Relaxed),
            events_failed: self.failed.load(Ordering::Relaxed),
            events_panicked: self.panicked.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of the executor pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStatsSnapshot {
    /// Worker threads started.
    pub workers_spawned: u64,
    /// Idle workers removed after their timeout.
    pub workers_reaped: u64,
    /// Payloads that returned `Ok`.
    pub events_completed: u64,
    /// Payloads that returned an error.
    pub events_failed: u64,
    /// Payloads that panicked.
    pub events_panicked: u64,
}

impl PoolStatsSnapshot {
    /// Payload runs that have ended, whatever the outcome.
    pub fn events_finished(&self) -> u64 {
        self.events_completed + self.events_failed + self.events_panicked
    }
}

/// Counters for a [`Manager`](crate::Manager), including its pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStats {
    /// Calls to `tick`.
    pub ticks: u64,
    /// Events accepted into the queue.
    pub submitted: u64,
    /// Events rejected because they were already overdue or malformed.
    pub missed: u64,
    /// Events handed to a worker.
    pub dispatched: u64,
    /// Times an event had to wait for a free worker at the end of a tick.
    pub deferrals: u64,
    /// Largest overflow buffer seen.
    pub peak_overflow: u64,
    /// Saturation episodes in which the overflow passed the warning threshold.
    pub backpressure_warnings: u64,
    /// Executor pool counters.
    pub pool: PoolStatsSnapshot,
}
