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

//! Contract tests run against every `EventQueue` implementation.

use cadence_core::{
    BucketedEventQueue, EventQueue, HeapEventQueue, ScheduleError, SortedEventQueue, TimedEvent,
};

fn noop(fire_time: f64) -> TimedEvent {
    TimedEvent::from_fn(fire_time, || Ok(()))
}

fn times(events: &[TimedEvent]) -> Vec<f64> {
    events.iter().map(TimedEvent::fire_time).collect()
}

/// Deterministic spread of fire times over `(start, start + span]`, in scrambled order.
fn scrambled_times(start: f64, span: f64, count: usize) -> Vec<f64> {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            start + span * (1.0 - unit)
        })
        .collect()
}

fn drains_exactly_the_due_subset_in_order<Q: EventQueue>(make: impl Fn(f64) -> Q) {
    let mut queue = make(100.0);
    let submitted = scrambled_times(100.0, 20.0, 300);
    for &t in &submitted {
        assert!(queue.submit(noop(t)));
    }

    let cutoff = 111.37;
    let due = queue.drain_due(cutoff);
    let got = times(&due);

    let mut expected: Vec<f64> = submitted.iter().copied().filter(|&t| t <= cutoff).collect();
    expected.sort_by(f64::total_cmp);

    assert_eq!(got, expected);
    assert_eq!(queue.len(), submitted.len() - due.len());
    assert_eq!(queue.watermark(), cutoff);
}

fn second_drain_at_same_time_is_empty<Q: EventQueue>(make: impl Fn(f64) -> Q) {
    let mut queue = make(0.0);
    for t in [0.5, 1.5, 2.5] {
        queue.submit(noop(t));
    }
    assert_eq!(queue.drain_due(2.0).len(), 2);
    assert!(queue.drain_due(2.0).is_empty());
    assert_eq!(queue.len(), 1);
}

fn split_drains_match_single_drain<Q: EventQueue>(make: impl Fn(f64) -> Q) {
    let submitted = scrambled_times(50.0, 10.0, 200);

    let mut split = make(50.0);
    let mut single = make(50.0);
    for &t in &submitted {
        split.submit(noop(t));
        single.submit(noop(t));
    }

    let mut union = times(&split.drain_due(53.4));
    union.extend(times(&split.drain_due(57.9)));
    let whole = times(&single.drain_due(57.9));

    assert_eq!(union, whole);
    assert_eq!(split.len(), single.len());
}

fn missed_events_leave_count_unchanged<Q: EventQueue>(make: impl Fn(f64) -> Q) {
    let mut queue = make(10.0);
    queue.submit(noop(12.0));

    assert!(!queue.submit(noop(10.0)));
    assert!(!queue.submit(noop(3.0)));
    assert_eq!(queue.len(), 1);

    queue.drain_due(11.0);
    assert_eq!(
        queue.try_submit(noop(10.5)),
        Err(ScheduleError::MissedEvent {
            fire_time: 10.5,
            watermark: 11.0
        })
    );
    assert!(matches!(
        queue.try_submit(noop(f64::NAN)),
        Err(ScheduleError::NonFiniteFireTime(_))
    ));
    assert_eq!(queue.len(), 1);
}

fn burst_of_identical_times_drains_at_once<Q: EventQueue>(make: impl Fn(f64) -> Q) {
    let mut queue = make(1000.0);
    for _ in 0..500 {
        assert!(queue.submit(noop(1005.25)));
    }
    assert!(queue.drain_due(1005.0).is_empty());
    assert_eq!(queue.drain_due(1005.25).len(), 500);
    assert_eq!(queue.len(), 0);
}

fn out_of_order_submissions_come_back_sorted<Q: EventQueue>(make: impl Fn(f64) -> Q) {
    let mut queue = make(1000.0);
    for t in [1001.0, 1002.5, 1001.5] {
        queue.submit(noop(t));
    }
    assert_eq!(times(&queue.drain_due(1003.0)), vec![1001.0, 1001.5, 1002.5]);
}

fn ties_keep_submission_order<Q: EventQueue>(make: impl Fn(f64) -> Q) {
    let mut queue = make(0.0);
    queue.submit(noop(3.0).with_label("late"));
    for label in ["a", "b", "c"] {
        queue.submit(noop(2.0).with_label(label));
    }
    let labels: Vec<String> = queue
        .drain_due(5.0)
        .iter()
        .map(|e| e.label().to_owned())
        .collect();
    assert_eq!(labels, ["a", "b", "c", "late"]);
}

fn backwards_drain_is_ignored<Q: EventQueue>(make: impl Fn(f64) -> Q) {
    let mut queue = make(0.0);
    queue.submit(noop(4.5));
    queue.submit(noop(8.5));
    assert_eq!(queue.drain_due(5.0).len(), 1);

    assert!(queue.drain_due(4.0).is_empty());
    assert_eq!(queue.watermark(), 5.0);
    assert_eq!(queue.len(), 1);

    // An event between the rejected time and the watermark is still missed.
    assert!(!queue.submit(noop(4.8)));
    assert_eq!(times(&queue.drain_due(9.0)), vec![8.5]);
}

fn next_fire_time_tracks_the_earliest_event<Q: EventQueue>(make: impl Fn(f64) -> Q) {
    let mut queue = make(0.0);
    assert_eq!(queue.next_fire_time(), None);
    queue.submit(noop(7.25));
    queue.submit(noop(3.75));
    assert_eq!(queue.next_fire_time(), Some(3.75));
    assert_eq!(queue.pop_next().map(|e| e.fire_time()), Some(3.75));
    assert_eq!(queue.next_fire_time(), Some(7.25));
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.watermark(), 0.0);
}

macro_rules! queue_contract {
    ($module:ident, $make:expr) => {
        mod $module {
            use super::*;

            #[test]
            fn drains_exactly_the_due_subset() {
                drains_exactly_the_due_subset_in_order($make);
            }

            #[test]
            fn drain_is_idempotent() {
                second_drain_at_same_time_is_empty($make);
            }

            #[test]
            fn advancing_watermark_loses_nothing() {
                split_drains_match_single_drain($make);
            }

            #[test]
            fn missed_event_rejection() {
                missed_events_leave_count_unchanged($make);
            }

            #[test]
            fn five_hundred_event_burst() {
                burst_of_identical_times_drains_at_once($make);
            }

            #[test]
            fn chronological_drain_order() {
                out_of_order_submissions_come_back_sorted($make);
            }

            #[test]
            fn stable_ties() {
                ties_keep_submission_order($make);
            }

            #[test]
            fn backwards_time() {
                backwards_drain_is_ignored($make);
            }

            #[test]
            fn peek_and_pop() {
                next_fire_time_tracks_the_earliest_event($make);
            }
        }
    };
}

queue_contract!(bucketed, BucketedEventQueue::new);
queue_contract!(heap, HeapEventQueue::new);
queue_contract!(sorted, SortedEventQueue::new);

#[test]
fn drained_windows_release_their_buckets() {
    let mut queue = BucketedEventQueue::new(0.0);
    for t in scrambled_times(0.0, 30.0, 120) {
        queue.submit(noop(t));
    }
    assert!(queue.bucket_count() > 20);

    queue.drain_due(15.0);
    assert!(queue.bucket_count() <= 16);

    queue.drain_due(30.0);
    assert_eq!(queue.bucket_count(), 0);
    assert!(queue.is_empty());
}
