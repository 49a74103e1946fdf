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

//! Worker threads and the payload boundary.

use super::{PoolShared, WorkerId};
use crate::telemetry::RunOutcome;
use cadence_core::TimedEvent;
use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

/// Starts a worker thread and returns the channel used to hand it events.
///
/// The thread only holds a weak reference to the pool, so dropping the pool
/// and its senders is enough to make every idle worker exit.
pub(super) fn spawn(
    pool: &Arc<PoolShared>,
    id: WorkerId,
) -> io::Result<(Sender<TimedEvent>, JoinHandle<()>)> {
    // Capacity 1: a worker is only sent an event while it is Executing.
    let (jobs_tx, jobs_rx) = crossbeam_channel::bounded(1);
    let name = format!("{}-{}", pool.name_prefix, id.0);
    let pool = Arc::downgrade(pool);
    let thread = thread::Builder::new()
        .name(name)
        .spawn(move || work(id, jobs_rx, pool))?;
    Ok((jobs_tx, thread))
}

/// Removes the worker's slot when its thread exits, however it exits.
///
/// Slots already removed by reaping or shutdown are left alone.
struct RetireOnExit {
    id: WorkerId,
    pool: Weak<PoolShared>,
}

impl Drop for RetireOnExit {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.upgrade() {
            pool.retire(self.id);
        }
    }
}

fn work(id: WorkerId, jobs: Receiver<TimedEvent>, pool: Weak<PoolShared>) {
    log::debug!("Worker {id} started.");
    let _retire = RetireOnExit {
        id,
        pool: Weak::clone(&pool),
    };

    for event in jobs.iter() {
        let outcome = run_payload(id, event);

        let Some(pool) = pool.upgrade() else {
            break;
        };
        pool.stats.record_run(outcome);
        pool.release(id);
    }

    log::debug!("Worker {id} stopped.");
}

/// Runs one payload and drops it, containing returned errors and panics
/// from either step.
pub(super) fn run_payload(id: WorkerId, mut event: TimedEvent) -> RunOutcome {
    let name = event.to_string();
    log::trace!("Worker {id} executing {name}.");

    let result = panic::catch_unwind(AssertUnwindSafe(move || {
        let result = event.execute();
        drop(event);
        result
    }));
    match result {
        Ok(Ok(())) => RunOutcome::Completed,
        Ok(Err(err)) => {
            log::error!("Worker {id}: payload {name} failed: {err:#}");
            RunOutcome::Failed
        }
        Err(panic) => {
            log::error!(
                "Worker {id}: payload {name} panicked: {}",
                panic_message(&*panic)
            );
            RunOutcome::Panicked
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        msg
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_outcomes_are_classified() {
        let id = WorkerId(0);

        let ok = TimedEvent::from_fn(1.0, || Ok(()));
        assert_eq!(run_payload(id, ok), RunOutcome::Completed);

        let failing = TimedEvent::from_fn(1.0, || anyhow::bail!("no target"));
        assert_eq!(run_payload(id, failing), RunOutcome::Failed);

        let panicking = TimedEvent::from_fn(1.0, || panic!("payload exploded"));
        assert_eq!(run_payload(id, panicking), RunOutcome::Panicked);
    }

    struct PanicsOnDrop;

    impl cadence_core::Payload for PanicsOnDrop {
        fn execute(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    impl Drop for PanicsOnDrop {
        fn drop(&mut self) {
            panic!("cleanup exploded");
        }
    }

    #[test]
    fn panic_in_payload_drop_is_contained() {
        let event = TimedEvent::new(1.0, PanicsOnDrop);
        assert_eq!(run_payload(WorkerId(0), event), RunOutcome::Panicked);
    }

    #[test]
    fn panic_messages_are_extracted() {
        let caught = panic::catch_unwind(|| panic!("static message")).expect_err("should panic");
        assert_eq!(panic_message(&*caught), "static message");

        let caught =
            panic::catch_unwind(|| panic!("formatted {}", 42)).expect_err("should panic");
        assert_eq!(panic_message(&*caught), "formatted 42");
    }
}
