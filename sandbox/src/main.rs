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

//! Drives a Cadence manager the way a game loop would.
//!
//! Usage: `sandbox [scheduler.json]`. Set `RUST_LOG=debug` to watch workers
//! being spawned and reaped.

use anyhow::Context;
use cadence_core::{Clock, Stopwatch, SystemClock, TimedEvent};
use cadence_runtime::{Manager, SchedulerConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const BURST_EVENTS: usize = 500;
const BURST_DELAY_SECS: f64 = 0.25;
const FRAME_SECS: f64 = 1.0 / 240.0;
const MIN_SLEEP_SECS: f64 = 0.001;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => SchedulerConfig::from_file(&path)
            .with_context(|| format!("failed to load scheduler config from '{path}'"))?,
        None => SchedulerConfig::default(),
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new()?);
    let mut manager = Manager::new(config, Arc::clone(&clock))?;

    burst(&mut manager)?;
    mixed_workload(&mut manager)?;

    let stats = manager.stats();
    log::info!("Dispatch stats:\n{}", serde_json::to_string_pretty(&stats)?);

    if !manager.shutdown(Duration::from_secs(2)) {
        log::warn!("Some payloads were still running at shutdown.");
    }
    Ok(())
}

/// Schedules a burst of events for the same instant and times how long the
/// loop takes to get all of them executed.
fn burst(manager: &mut Manager) -> anyhow::Result<()> {
    let executed = Arc::new(AtomicUsize::new(0));
    let fire_time = manager.clock().now() + BURST_DELAY_SECS;

    for _ in 0..BURST_EVENTS {
        let executed = Arc::clone(&executed);
        let event = TimedEvent::from_fn(fire_time, move || {
            executed.fetch_add(1, Ordering::Relaxed);
            Ok(())
        });
        if !manager.add_event(event) {
            anyhow::bail!("burst event was rejected as already missed");
        }
    }

    let mut watch = Stopwatch::start(Arc::clone(manager.clock()));
    let frames = run_until_drained(manager);
    log::info!(
        "Burst: {}/{} events executed in {:.3}s over {frames} frames.",
        executed.load(Ordering::Relaxed),
        BURST_EVENTS,
        watch.stop()
    );
    Ok(())
}

/// Periodic, slow, failing, and overdue events mixed together.
fn mixed_workload(manager: &mut Manager) -> anyhow::Result<()> {
    let clock = Arc::clone(manager.clock());
    let heartbeats = Arc::new(AtomicUsize::new(0));

    for i in 0..20 {
        let heartbeats = Arc::clone(&heartbeats);
        let event = TimedEvent::after(clock.as_ref(), 0.05 * (i + 1) as f64, move || -> anyhow::Result<()> {
            heartbeats.fetch_add(1, Ordering::Relaxed);
            Ok(())
        })
        .with_label("heartbeat");
        manager.add_event(event);
    }

    // Slow payloads overlap so the pool has to defer.
    for i in 0..(manager.config().max_concurrency * 2) {
        let event = TimedEvent::after(clock.as_ref(), 0.3, move || -> anyhow::Result<()> {
            thread::sleep(Duration::from_millis(50));
            log::debug!("Slow payload {i} finished.");
            Ok(())
        })
        .with_label("slow");
        manager.add_event(event);
    }

    manager.add_event(
        TimedEvent::after(clock.as_ref(), 0.4, || -> anyhow::Result<()> {
            anyhow::bail!("target entity no longer exists")
        })
        .with_label("despawned-target"),
    );
    manager.add_event(
        TimedEvent::after(clock.as_ref(), 0.45, || -> anyhow::Result<()> {
            panic!("payload invariant violated")
        })
        .with_label("broken"),
    );

    // Already overdue: reported as missed and dropped.
    manager.add_event(TimedEvent::from_fn(clock.now() - 1.0, || Ok(())).with_label("late"));

    let mut watch = Stopwatch::start(Arc::clone(&clock));
    let frames = run_until_drained(manager);
    log::info!(
        "Mixed workload: {} heartbeats in {:.3}s over {frames} frames.",
        heartbeats.load(Ordering::Relaxed),
        watch.stop()
    );
    Ok(())
}

/// Ticks until nothing is pending, sleeping until the next fire time
/// (bounded by one frame) between ticks.
fn run_until_drained(manager: &mut Manager) -> usize {
    let mut frames = 0;
    while manager.pending() > 0 {
        let report = manager.tick_now();
        if report.deferred > 0 {
            log::trace!("Frame {frames}: {} event(s) deferred.", report.deferred);
        }
        frames += 1;

        let now = manager.clock().now();
        let sleep_secs = manager
            .next_fire_time()
            .map_or(FRAME_SECS, |t| (t - now).clamp(MIN_SLEEP_SECS, FRAME_SECS));
        thread::sleep(Duration::from_secs_f64(sleep_secs));
    }
    if !manager.pool().wait_idle(Duration::from_secs(5)) {
        log::warn!("Payloads still running after the queue drained.");
    }
    frames
}
