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

//! # Cadence Runtime
//!
//! Runs due [`TimedEvent`](cadence_core::TimedEvent)s on a bounded pool of
//! worker threads. A [`Manager`] owns the event queue and the pool; an
//! outer loop calls [`Manager::tick`] once per frame.

#![warn(missing_docs)]

pub mod config;
pub mod manager;
pub mod pool;
pub mod telemetry;

pub use config::{ConfigError, SchedulerConfig};
pub use manager::{Manager, TickReport};
pub use pool::{Executor, ExecutorPool, WorkerId, WorkerInfo, WorkerState};
pub use telemetry::{DispatchStats, PoolStatsSnapshot};
