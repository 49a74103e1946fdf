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

//! # Cadence Core
//!
//! Foundational crate for the Cadence scheduler: clocks, timed events, and
//! the stores that answer "which events are due as of time T".
//!
//! Nothing in this crate spawns threads. Dispatching due events to workers
//! lives in `cadence-runtime`.

#![warn(missing_docs)]

pub mod clock;
pub mod error;
pub mod event;
pub mod queue;
pub mod timer;

pub use clock::{Clock, ManualClock, MonotonicClock, SystemClock};
pub use error::{ScheduleError, SchedulerError};
pub use event::{Payload, TimedEvent};
pub use queue::{BucketedEventQueue, EventQueue, HeapEventQueue, SortedEventQueue};
pub use timer::Stopwatch;
