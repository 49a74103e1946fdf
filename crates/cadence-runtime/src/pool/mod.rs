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

//! A bounded pool of worker threads that execute due events.
//!
//! Workers are created on demand up to `max_concurrency`, return to
//! [`WorkerState::Idle`] after each event, and are removed by
//! [`ExecutorPool::reap_idle`] once they have been idle longer than the
//! configured timeout.

mod worker;

use crate::config::SchedulerConfig;
use crate::telemetry::{PoolStats, PoolStatsSnapshot};
use cadence_core::{SchedulerError, TimedEvent};
use crossbeam_channel::{SendError, Sender};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Identifies a worker within its pool. Ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for an event.
    Idle,
    /// Acquired for, or running, an event.
    Executing,
    /// Reaped. Never reused.
    Terminated,
}

impl WorkerState {
    /// Returns `true` if a worker may move from `self` to `next`.
    pub fn can_transition_to(self, next: WorkerState) -> bool {
        matches!(
            (self, next),
            (WorkerState::Idle, WorkerState::Executing)
                | (WorkerState::Executing, WorkerState::Idle)
                | (WorkerState::Idle, WorkerState::Terminated)
        )
    }
}

/// A snapshot of one worker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerInfo {
    /// The worker's id.
    pub id: WorkerId,
    /// Its state when the snapshot was taken.
    pub state: WorkerState,
    /// Pool time at which it last finished an event (or was created).
    pub last_active: f64,
}

struct WorkerSlot {
    id: WorkerId,
    state: WorkerState,
    last_active: f64,
    jobs: Sender<TimedEvent>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerSlot {
    fn info(&self) -> WorkerInfo {
        WorkerInfo {
            id: self.id,
            state: self.state,
            last_active: self.last_active,
        }
    }

    /// Closes the worker's channel and waits for its thread to exit.
    fn terminate(mut self) {
        debug_assert!(self.state.can_transition_to(WorkerState::Terminated));
        self.state = WorkerState::Terminated;
        let WorkerSlot {
            id, jobs, thread, ..
        } = self;
        drop(jobs);
        if let Some(thread) = thread {
            if thread.join().is_err() {
                log::error!("Worker {id} thread panicked outside a payload.");
            }
        }
    }
}

#[derive(Default)]
struct PoolState {
    workers: Vec<WorkerSlot>,
    next_id: u64,
}

impl PoolState {
    fn slot_mut(&mut self, id: WorkerId) -> Option<&mut WorkerSlot> {
        self.workers.iter_mut().find(|w| w.id == id)
    }

    fn count(&self, state: WorkerState) -> usize {
        self.workers.iter().filter(|w| w.state == state).count()
    }
}

/// State shared between the pool handle, acquired executors, and worker threads.
struct PoolShared {
    state: Mutex<PoolState>,
    idle_signal: Condvar,
    // f64 bits of the latest tick time; workers are stamped with it.
    time: AtomicU64,
    max_concurrency: usize,
    idle_timeout: f64,
    name_prefix: String,
    stats: PoolStats,
}

impl PoolShared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Payload panics are caught before the lock is taken, so a poisoned
        // lock still guards consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> f64 {
        f64::from_bits(self.time.load(Ordering::Acquire))
    }

    /// Executing -> Idle.
    fn release(&self, id: WorkerId) {
        let now = self.now();
        {
            let mut state = self.lock();
            if let Some(slot) = state.slot_mut(id) {
                debug_assert!(slot.state.can_transition_to(WorkerState::Idle));
                slot.state = WorkerState::Idle;
                slot.last_active = now;
            }
        }
        self.idle_signal.notify_all();
    }

    /// Removes a worker whose thread is gone.
    fn retire(&self, id: WorkerId) {
        {
            let mut state = self.lock();
            state.workers.retain(|w| w.id != id);
        }
        self.idle_signal.notify_all();
    }
}

/// A worker acquired from an [`ExecutorPool`], ready to run one event.
///
/// Dropping an executor without passing it to [`ExecutorPool::run`] returns
/// the worker to the pool.
#[must_use = "an acquired executor holds pool capacity until it runs an event or is dropped"]
pub struct Executor {
    id: WorkerId,
    pool: Arc<PoolShared>,
    armed: bool,
}

impl Executor {
    /// The id of the acquired worker.
    pub fn id(&self) -> WorkerId {
        self.id
    }
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor").field("id", &self.id).finish()
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        if self.armed {
            self.pool.release(self.id);
        }
    }
}

/// A bounded set of worker threads.
///
/// The worker set is behind a mutex, so the pool can be acquired from and
/// reaped on the tick thread while workers return themselves to Idle from
/// their own threads.
pub struct ExecutorPool {
    shared: Arc<PoolShared>,
}

impl ExecutorPool {
    /// Creates an empty pool whose time starts at `start_time`.
    ///
    /// Workers are spawned lazily by [`try_acquire`](Self::try_acquire).
    pub fn new(config: &SchedulerConfig, start_time: f64) -> Result<Self, SchedulerError> {
        config.validate()?;
        Ok(Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState::default()),
                idle_signal: Condvar::new(),
                time: AtomicU64::new(start_time.to_bits()),
                max_concurrency: config.max_concurrency,
                idle_timeout: config.idle_timeout_secs,
                name_prefix: config.worker_name_prefix.clone(),
                stats: PoolStats::default(),
            }),
        })
    }

    /// Takes an Idle worker, or spawns one if the pool is below capacity.
    ///
    /// Returns `None` when every worker is Executing and the pool is full.
    /// Among Idle workers the most recently active one is chosen, so that
    /// rarely used workers age out.
    pub fn try_acquire(&self) -> Option<Executor> {
        let mut state = self.shared.lock();

        let idle = state
            .workers
            .iter_mut()
            .filter(|w| w.state == WorkerState::Idle)
            .max_by(|a, b| a.last_active.total_cmp(&b.last_active));
        if let Some(slot) = idle {
            debug_assert!(slot.state.can_transition_to(WorkerState::Executing));
            slot.state = WorkerState::Executing;
            return Some(self.executor(slot.id));
        }

        if state.workers.len() >= self.shared.max_concurrency {
            return None;
        }

        let id = WorkerId(state.next_id);
        match worker::spawn(&self.shared, id) {
            Ok((jobs, thread)) => {
                state.next_id += 1;
                state.workers.push(WorkerSlot {
                    id,
                    state: WorkerState::Executing,
                    last_active: self.shared.now(),
                    jobs,
                    thread: Some(thread),
                });
                self.shared.stats.record_spawn();
                log::debug!(
                    "Spawned worker {id} ({}/{}).",
                    state.workers.len(),
                    self.shared.max_concurrency
                );
                Some(self.executor(id))
            }
            Err(e) => {
                log::error!("Failed to spawn worker thread: {e}");
                None
            }
        }
    }

    fn executor(&self, id: WorkerId) -> Executor {
        Executor {
            id,
            pool: Arc::clone(&self.shared),
            armed: true,
        }
    }

    /// Hands `event` to the worker behind `executor`.
    ///
    /// Returns immediately; the payload runs on the worker thread. Errors and
    /// panics from the payload are logged there and the worker goes back to Idle.
    pub fn run(&self, mut executor: Executor, event: TimedEvent) {
        debug_assert!(
            Arc::ptr_eq(&executor.pool, &self.shared),
            "executor belongs to a different pool"
        );

        let jobs = self
            .shared
            .lock()
            .slot_mut(executor.id)
            .map(|slot| slot.jobs.clone());
        let Some(jobs) = jobs else {
            log::error!(
                "Worker {} left the pool before dispatch; dropping {event}.",
                executor.id
            );
            return;
        };

        match jobs.send(event) {
            Ok(()) => executor.armed = false,
            Err(SendError(event)) => {
                log::error!(
                    "Worker {} stopped unexpectedly; dropping {event}.",
                    executor.id
                );
                executor.armed = false;
                self.shared.retire(executor.id);
            }
        }
    }

    /// Moves the pool time forward to `now`.
    ///
    /// Workers finishing an event from here on are stamped with this time,
    /// which is what [`reap_idle`](Self::reap_idle) measures idleness against.
    /// Earlier or NaN times are ignored.
    pub fn advance_time(&self, now: f64) {
        let _ = self
            .shared
            .time
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (now > f64::from_bits(bits)).then_some(now.to_bits())
            });
    }

    /// The latest time given to [`advance_time`](Self::advance_time).
    pub fn time(&self) -> f64 {
        self.shared.now()
    }

    /// Terminates every Idle worker whose last activity is more than the idle
    /// timeout before `now`, after advancing the pool time to `now`.
    /// Returns how many were removed.
    pub fn reap_idle(&self, now: f64) -> usize {
        self.advance_time(now);
        let timeout = self.shared.idle_timeout;
        let (expired, remaining) = {
            let mut state = self.shared.lock();
            let (expired, kept): (Vec<WorkerSlot>, Vec<WorkerSlot>) =
                std::mem::take(&mut state.workers)
                    .into_iter()
                    .partition(|w| w.state == WorkerState::Idle && now - w.last_active > timeout);
            state.workers = kept;
            (expired, state.workers.len())
        };

        let count = expired.len();
        for slot in expired {
            slot.terminate();
        }
        if count > 0 {
            self.shared.stats.record_reaped(count);
            log::debug!("Reaped {count} idle worker(s), {remaining} remain.");
        }
        count
    }

    /// Blocks the calling thread until no worker is Executing, or until
    /// `timeout` elapses. Returns `true` if the pool went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();
        while state.count(WorkerState::Executing) > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .shared
                .idle_signal
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Waits up to `timeout` for running payloads, then terminates every worker.
    ///
    /// Workers still executing after the timeout are detached; they exit once
    /// their payload returns. Returns `true` if nothing had to be detached.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        let drained = self.wait_idle(timeout);
        let workers = std::mem::take(&mut self.shared.lock().workers);
        let total = workers.len();

        for slot in workers {
            if slot.state == WorkerState::Executing {
                log::warn!("Detaching worker {} that is still executing.", slot.id);
                continue;
            }
            slot.terminate();
        }
        if total > 0 {
            log::debug!("Executor pool shut down ({total} worker(s)).");
        }
        drained
    }

    /// Number of live workers.
    pub fn size(&self) -> usize {
        self.shared.lock().workers.len()
    }

    /// Number of Idle workers.
    pub fn idle_count(&self) -> usize {
        self.shared.lock().count(WorkerState::Idle)
    }

    /// Number of Executing workers.
    pub fn executing_count(&self) -> usize {
        self.shared.lock().count(WorkerState::Executing)
    }

    /// The capacity of the pool.
    pub fn max_concurrency(&self) -> usize {
        self.shared.max_concurrency
    }

    /// The configured idle timeout, in seconds.
    pub fn idle_timeout(&self) -> f64 {
        self.shared.idle_timeout
    }

    /// A snapshot of every live worker.
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.shared.lock().workers.iter().map(WorkerSlot::info).collect()
    }

    /// Current pool counters.
    pub fn stats(&self) -> PoolStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl fmt::Debug for ExecutorPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorPool")
            .field("max_concurrency", &self.shared.max_concurrency)
            .field("idle_timeout", &self.shared.idle_timeout)
            .field("workers", &self.workers())
            .finish()
    }
}

impl Drop for ExecutorPool {
    fn drop(&mut self) {
        self.shutdown(Duration::ZERO);
    }
}
